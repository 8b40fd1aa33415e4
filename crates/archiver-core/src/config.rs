//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/config-archiver/config.toml)
//! 3. Environment variables (ARCHIVER_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "ARCHIVER";

/// File name of the archive database inside its directory
pub const DATABASE_FILE: &str = "archive.xml";

/// What a bulk rollback does with entries that have no matching revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackPolicy {
    /// Skip them and roll back everything else
    #[default]
    BestEffort,
    /// Abort the whole rollback before changing anything
    Strict,
}

impl FromStr for RollbackPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "best-effort" => Ok(RollbackPolicy::BestEffort),
            "strict" => Ok(RollbackPolicy::Strict),
            other => bail!(
                "Invalid rollback policy '{}'. Use 'best-effort' or 'strict'.",
                other
            ),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the per-user archive
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding the global archive
    #[serde(default = "default_global_dir")]
    pub global_dir: PathBuf,

    /// How long to wait for another process to release the archive
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Bulk rollback behaviour for unresolvable entries
    #[serde(default)]
    pub rollback_policy: RollbackPolicy,

    /// Default log level for the CLI (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            global_dir: default_global_dir(),
            lock_timeout_ms: default_lock_timeout_ms(),
            rollback_policy: RollbackPolicy::default(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (ARCHIVER_DATA_DIR, ARCHIVER_GLOBAL_DIR, ...)
    /// 2. Config file (~/.config/config-archiver/config.toml or ARCHIVER_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_GLOBAL_DIR", ENV_PREFIX)) {
            self.global_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_LOCK_TIMEOUT_MS", ENV_PREFIX)) {
            self.lock_timeout_ms = val
                .parse()
                .with_context(|| format!("Invalid {}_LOCK_TIMEOUT_MS: {:?}", ENV_PREFIX, val))?;
        }

        if let Ok(val) = std::env::var(format!("{}_ROLLBACK_POLICY", ENV_PREFIX)) {
            self.rollback_policy = val.parse()?;
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.log_level = val;
            }
        }

        // Empty string clears it
        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with ARCHIVER_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config-archiver")
            .join("config.toml")
    }

    /// Path of the global or per-user archive database
    pub fn database_path(&self, global: bool) -> PathBuf {
        let dir = if global {
            &self.global_dir
        } else {
            &self.data_dir
        };
        dir.join(DATABASE_FILE)
    }

    /// Advisory lock file guarding [`Config::database_path`]
    pub fn lock_path(&self, global: bool) -> PathBuf {
        crate::storage::lock_path_for(&self.database_path(global))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Get the default per-user data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config-archiver")
}

fn default_global_dir() -> PathBuf {
    PathBuf::from("/var/lib/config-archiver")
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "warn".to_string()
}
