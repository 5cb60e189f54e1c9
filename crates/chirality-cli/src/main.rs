use anyhow::{Context, Result};
use chirality_algebra::{Algebra, OperationContext};
use chirality_core::{GridKind, OperationKind, ThreadId};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;
use std::path::PathBuf;

mod commands;
mod config;
mod logging;

use commands::RecordKind;
use config::{AppConfig, ResolverKind};

fn cli() -> Command {
    let thread_arg = Arg::new("thread")
        .long("thread")
        .required(true)
        .value_parser(value_parser!(ThreadId))
        .help("Thread id namespacing the produced grids");
    let timestamp_arg = Arg::new("timestamp")
        .long("timestamp")
        .help("RFC 3339 timestamp for outputs (defaults to now)");

    Command::new("chirality")
        .version(chirality_core::VERSION)
        .about("Deterministic, content-addressed semantic grid algebra")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON on stderr"),
        )
        .arg(
            Arg::new("resolver")
                .long("resolver")
                .global(true)
                .value_parser(value_parser!(ResolverKind))
                .help("Override the configured resolver (synthetic or remote)"),
        )
        .arg(
            Arg::new("no-cache")
                .long("no-cache")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Disable the resolver cache"),
        )
        .subcommand(
            Command::new("thread")
                .about("Derive a thread id")
                .arg(Arg::new("user").long("user").required(true))
                .arg(Arg::new("session").long("session").required(true))
                .arg(
                    Arg::new("timestamp")
                        .long("timestamp")
                        .help("Explicit timestamp; omitted means now"),
                ),
        )
        .subcommand(
            Command::new("apply")
                .about("Apply one operation to grid files")
                .arg(
                    Arg::new("op")
                        .long("op")
                        .required(true)
                        .value_parser(["combine", "merge", "elementwise", "interpret", "expand"])
                        .help("Operation to apply"),
                )
                .arg(
                    Arg::new("left")
                        .long("left")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON 2-D string array"),
                )
                .arg(
                    Arg::new("right")
                        .long("right")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON 2-D string array (binary operations)"),
                )
                .arg(thread_arg.clone())
                .arg(timestamp_arg.clone())
                .arg(
                    Arg::new("left-kind")
                        .long("left-kind")
                        .value_parser(value_parser!(GridKind))
                        .help("Kind of the left grid"),
                )
                .arg(
                    Arg::new("right-kind")
                        .long("right-kind")
                        .value_parser(value_parser!(GridKind))
                        .default_value("B")
                        .help("Kind of the right grid"),
                ),
        )
        .subcommand(
            Command::new("pipeline")
                .about("Run the standard stations over axiom grids A and B")
                .arg(
                    Arg::new("a")
                        .long("a")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("b")
                        .long("b")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(thread_arg)
                .arg(timestamp_arg),
        )
        .subcommand(
            Command::new("verify")
                .about("Check the integrity of a record file")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("record")
                        .long("record")
                        .value_parser(["grid", "tensor", "operation"])
                        .default_value("grid")
                        .help("Record type stored in the file"),
                ),
        )
}

fn print(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn timestamp(args: &ArgMatches) -> Result<chrono::DateTime<chrono::Utc>> {
    match args.get_one::<String>("timestamp") {
        Some(value) => commands::parse_timestamp(value),
        None => Ok(chrono::Utc::now()),
    }
}

fn path<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a PathBuf> {
    args.get_one::<PathBuf>(name)
        .with_context(|| format!("missing --{name}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let mut config = AppConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    if matches.get_flag("json-logs") {
        config = config.with_json_logs(true);
    }
    if matches.get_flag("no-cache") {
        config = config.with_cache(false);
    }
    if let Some(kind) = matches.get_one::<ResolverKind>("resolver") {
        config = config.with_resolver(*kind);
    }
    logging::init(&config.logging);

    match matches.subcommand() {
        Some(("thread", args)) => {
            let user = args.get_one::<String>("user").context("missing --user")?;
            let session = args.get_one::<String>("session").context("missing --session")?;
            let stamp = args.get_one::<String>("timestamp").map(String::as_str);
            print(&commands::thread(user, session, stamp))
        }
        Some(("apply", args)) => {
            let op: OperationKind = args
                .get_one::<String>("op")
                .context("missing --op")?
                .parse()?;
            let thread = args
                .get_one::<ThreadId>("thread")
                .context("missing --thread")?
                .clone();
            let timestamp = timestamp(args)?;
            let left_kind = args
                .get_one::<GridKind>("left-kind")
                .copied()
                .unwrap_or_else(|| commands::default_left_kind(op));
            let left = commands::input_grid(
                left_kind,
                &thread,
                timestamp,
                commands::read_rows(path(args, "left")?)?,
            )?;
            let right = match args.get_one::<PathBuf>("right") {
                Some(file) => {
                    let kind = args
                        .get_one::<GridKind>("right-kind")
                        .copied()
                        .context("missing --right-kind")?;
                    Some(commands::input_grid(
                        kind,
                        &thread,
                        timestamp,
                        commands::read_rows(file)?,
                    )?)
                }
                None => None,
            };

            let algebra = Algebra::new(commands::resolver_from_config(&config)?);
            let ctx = OperationContext::new(thread, timestamp);
            print(&commands::apply(&algebra, op, &left, right.as_ref(), &ctx).await?)
        }
        Some(("pipeline", args)) => {
            let thread = args
                .get_one::<ThreadId>("thread")
                .context("missing --thread")?
                .clone();
            let timestamp = timestamp(args)?;
            let a = commands::input_grid(
                GridKind::A,
                &thread,
                timestamp,
                commands::read_rows(path(args, "a")?)?,
            )?;
            let b = commands::input_grid(
                GridKind::B,
                &thread,
                timestamp,
                commands::read_rows(path(args, "b")?)?,
            )?;

            let algebra = Algebra::new(commands::resolver_from_config(&config)?);
            print(&commands::pipeline(algebra, &a, &b, &thread, timestamp).await?)
        }
        Some(("verify", args)) => {
            let kind: RecordKind = args
                .get_one::<String>("record")
                .context("missing --record")?
                .parse()?;
            print(&commands::verify_file(path(args, "file")?, kind)?)
        }
        _ => anyhow::bail!("no subcommand given"),
    }
}
