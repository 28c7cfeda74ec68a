//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

use crate::{LogConfig, LogFormat};

/// Initialize tracing/logging for the process.
///
/// `RUST_LOG` wins over the configured filter. An unparsable configured filter
/// falls back to `info`.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_writer(std::io::stderr)
        .with_target(false);

    // Logs go to stderr so command output on stdout stays machine-readable.
    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.compact().try_init(),
    };
}
