//! Subscriber setup

use crate::config::LoggingSection;
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to the configured level
pub(crate) fn filter(logging: &LoggingSection) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
}

/// Install the global subscriber; events go to stderr
pub(crate) fn init(logging: &LoggingSection) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(logging))
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
