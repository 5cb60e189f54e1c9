//! Subcommand implementations

use crate::config::{AppConfig, CacheSection, ResolverKind};
use anyhow::{bail, Context, Result};
use chirality_algebra::{Algebra, CachedResolver, OperationContext, Pipeline, Resolver, SyntheticResolver};
use chirality_core::{ids, Grid, GridKind, Operation, OperationKind, Tensor, ThreadId};
use chirality_remote::{HttpChatTransport, RemoteResolver};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Resolver selected by configuration, cached when enabled
///
/// # Errors
/// Fails if the HTTP client cannot be constructed
pub(crate) fn resolver_from_config(config: &AppConfig) -> Result<Arc<dyn Resolver>> {
    match config.resolver.kind {
        ResolverKind::Synthetic => Ok(with_cache(SyntheticResolver, &config.cache)),
        ResolverKind::Remote => {
            let remote = &config.remote;
            if remote.api_key.is_none() {
                warn!(base_url = %remote.base_url, "remote resolver configured without an API key");
            }
            let transport =
                HttpChatTransport::new(&remote.base_url, remote.api_key.clone(), remote.timeout())
                    .context("failed to build HTTP transport")?;
            let resolver = RemoteResolver::new(Arc::new(transport), remote.model.clone())
                .with_max_tokens(remote.max_tokens)
                .with_policy(remote.retry_policy());
            Ok(with_cache(resolver, &config.cache))
        }
    }
}

fn with_cache<R: Resolver + 'static>(resolver: R, cache: &CacheSection) -> Arc<dyn Resolver> {
    if cache.enabled {
        Arc::new(CachedResolver::new(resolver, cache.capacity))
    } else {
        Arc::new(resolver)
    }
}

/// Parse an RFC 3339 timestamp
///
/// # Errors
/// Fails on malformed input
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("invalid RFC 3339 timestamp {value:?}"))?
        .with_timezone(&Utc))
}

/// `thread`: id for a user/session pair
pub(crate) fn thread(user: &str, session: &str, timestamp: Option<&str>) -> Value {
    match timestamp {
        Some(timestamp) => json!({
            "thread": ids::thread_id(user, session, timestamp),
            "timestamp": timestamp,
        }),
        None => {
            let (thread, timestamp) = ids::thread_id_now(user, session);
            json!({ "thread": thread, "timestamp": timestamp })
        }
    }
}

/// Read a JSON file holding a 2-D array of strings
///
/// # Errors
/// Fails if the file cannot be read or is not a 2-D string array
pub(crate) fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a JSON array of string arrays", path.display()))
}

/// Grid of `kind` from raw rows under `thread`
///
/// # Errors
/// Fails on ragged rows
pub(crate) fn input_grid(
    kind: GridKind,
    thread: &ThreadId,
    timestamp: DateTime<Utc>,
    rows: Vec<Vec<String>>,
) -> Result<Grid> {
    Grid::builder(kind)
        .thread(thread.clone())
        .timestamp(timestamp)
        .rows(rows)
        .build()
        .with_context(|| format!("invalid {kind} grid"))
}

/// Input kind used when `--left-kind` is not given
#[must_use]
pub(crate) fn default_left_kind(op: OperationKind) -> GridKind {
    match op {
        OperationKind::Interpret => GridKind::B,
        _ => GridKind::A,
    }
}

/// `apply`: run one operation, returning `{"grid", "operation"}`
///
/// # Errors
/// Propagates arity, validation and resolution failures
pub(crate) async fn apply(
    algebra: &Algebra,
    op: OperationKind,
    left: &Grid,
    right: Option<&Grid>,
    ctx: &OperationContext,
) -> Result<Value> {
    let inputs: Vec<&Grid> = std::iter::once(left).chain(right).collect();
    if inputs.len() != op.arity() {
        bail!(
            "{} takes {} input grid(s), got {}",
            op.name(),
            op.arity(),
            inputs.len()
        );
    }

    let (grid, operation) = algebra.apply(op, &inputs, ctx).await?;
    info!(op = %op, grid = %grid.id(), "applied");
    Ok(json!({
        "grid": grid.to_record()?,
        "operation": operation.to_record()?,
    }))
}

/// `pipeline`: the full station run as JSON
///
/// # Errors
/// Propagates the first failing step
pub(crate) async fn pipeline(
    algebra: Algebra,
    a: &Grid,
    b: &Grid,
    thread: &ThreadId,
    timestamp: DateTime<Utc>,
) -> Result<Value> {
    let run = Pipeline::new(algebra).run(a, b, thread, timestamp).await?;
    Ok(serde_json::to_value(&run)?)
}

/// Record types accepted by `verify`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordKind {
    Grid,
    Tensor,
    Operation,
}

impl std::str::FromStr for RecordKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "grid" => Ok(Self::Grid),
            "tensor" => Ok(Self::Tensor),
            "operation" => Ok(Self::Operation),
            other => bail!("unknown record kind {other:?}"),
        }
    }
}

/// `verify`: parse a record and recheck every integrity invariant
///
/// # Errors
/// Fails with the first violated invariant
pub(crate) fn verify(record: &Value, kind: RecordKind) -> Result<Value> {
    let summary = match kind {
        RecordKind::Grid => {
            let grid = Grid::parse(record)?;
            json!({
                "id": grid.id(),
                "kind": grid.kind(),
                "dimensions": grid.dimensions().to_string(),
                "content_hash": grid.content_hash(),
            })
        }
        RecordKind::Tensor => {
            let tensor = Tensor::parse(record)?;
            json!({
                "id": tensor.id(),
                "depth": tensor.depth(),
                "content_hash": tensor.content_hash(),
            })
        }
        RecordKind::Operation => {
            let operation = Operation::parse(record)?;
            json!({
                "id": operation.id(),
                "kind": operation.kind(),
                "output": operation.output(),
            })
        }
    };
    Ok(json!({ "valid": true, "record": summary }))
}

/// Read and verify a record file
///
/// # Errors
/// I/O, JSON or integrity failures
pub(crate) fn verify_file(path: &Path, kind: RecordKind) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let record: Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not JSON", path.display()))?;
    verify(&record, kind).with_context(|| format!("{} failed verification", path.display()))
}
