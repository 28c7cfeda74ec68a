//! Configuration loading and representation.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file,
//! then `STOCKLEDGER_*` environment variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_auth::{OperationKind, Permission, Role, RolePolicy};
use stockledger_inventory::{DEFAULT_COST_SCALE, EntryLimits};
use stockledger_observability::{LogConfig, LogFormat};

/// Largest scale `rust_decimal` can represent.
const MAX_COST_SCALE: u32 = 28;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {message}")]
    Env { key: &'static str, message: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// `[journal]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub path: PathBuf,
    /// Defaults to `path` with a `.catalog` extension.
    pub catalog_path: Option<PathBuf>,
    pub fsync: bool,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stockledger.journal"),
            catalog_path: None,
            fsync: true,
        }
    }
}

impl JournalConfig {
    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| self.path.with_extension("catalog"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub limits: EntryLimits,
    pub cost_scale: u32,
    /// Role name → permission strings. Empty means the standard policy.
    pub roles: BTreeMap<String, Vec<String>>,
    pub log: LogConfig,
    pub journal: JournalConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            limits: EntryLimits::default(),
            cost_scale: DEFAULT_COST_SCALE,
            roles: BTreeMap::new(),
            log: LogConfig::default(),
            journal: JournalConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Defaults, then `path` (if any), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `STOCKLEDGER_*` variables read through `lookup`.
    pub fn apply_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = lookup("STOCKLEDGER_JOURNAL") {
            self.journal.path = PathBuf::from(path);
        }
        if let Some(filter) = lookup("STOCKLEDGER_LOG_FILTER") {
            self.log.filter = filter;
        }
        if let Some(format) = lookup("STOCKLEDGER_LOG_FORMAT") {
            self.log.format = format.parse::<LogFormat>().map_err(|message| ConfigError::Env {
                key: "STOCKLEDGER_LOG_FORMAT",
                message,
            })?;
        }
        if let Some(max) = lookup("STOCKLEDGER_MAX_LINES") {
            self.limits.max_lines_per_entry =
                max.trim().parse::<usize>().map_err(|e| ConfigError::Env {
                    key: "STOCKLEDGER_MAX_LINES",
                    message: format!("{e}"),
                })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_lines_per_entry == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_lines_per_entry must be at least 1".to_string(),
            ));
        }
        if self.cost_scale > MAX_COST_SCALE {
            return Err(ConfigError::Invalid(format!(
                "cost_scale must be at most {MAX_COST_SCALE}, got {}",
                self.cost_scale
            )));
        }
        Ok(())
    }

    /// The configured role mapping, or [`RolePolicy::standard`] if none is set.
    pub fn role_policy(&self) -> RolePolicy {
        if self.roles.is_empty() {
            return RolePolicy::standard();
        }
        self.roles
            .iter()
            .fold(RolePolicy::new(), |policy, (role, permissions)| {
                policy.grant(
                    Role::new(role.clone()),
                    permissions.iter().map(|p| Permission::new(p.clone())),
                )
            })
    }

    /// Permission strings that no operation requires; usually typos.
    pub fn unknown_permissions(&self) -> Vec<&str> {
        self.roles
            .values()
            .flatten()
            .map(String::as_str)
            .filter(|p| {
                *p != Permission::WILDCARD.as_str()
                    && !OperationKind::ALL
                        .iter()
                        .any(|op| op.required_permission().as_str() == *p)
            })
            .collect()
    }
}
