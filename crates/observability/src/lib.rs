//! Tracing and logging setup shared by every binary.

use serde::{Deserialize, Serialize};

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Output encoding of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl core::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown log format '{other}' (expected json or text)")),
        }
    }
}

/// `[log]` section of the ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Initialize process-wide tracing/logging.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init(config: &LogConfig) {
    tracing::init(config);
}
