use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

/// Installs the stderr subscriber. `RUST_LOG` wins over `level`; without either the
/// default is `info`, or `debug` when the config enables debug mode.
pub(crate) fn init(level: Option<LogLevel>, debug: bool) {
    let fallback = match level {
        Some(level) => level.as_filter(),
        None if debug => "debug",
        None => "info",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
