//! Environment Configuration
//!
//! Settings come from process environment variables, optionally seeded from an
//! env file. Lookup order for the file:
//!
//! 1. `$MCP_METRICS_ENV_FILE`
//! 2. `.mcp-metrics.env` in the current directory
//!
//! Variables already present in the environment are never overridden.
//!
//! ```rust,no_run
//! use mcp_metrics::config::{load_environment, MetricsConfig};
//!
//! load_environment();
//! let config = MetricsConfig::from_env();
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Variable naming a custom env file
pub const ENV_FILE_VAR: &str = "MCP_METRICS_ENV_FILE";

/// Fallback env file in the working directory
pub const DEFAULT_ENV_FILE: &str = ".mcp-metrics.env";

pub const HISTORY_LIMIT_VAR: &str = "MCP_METRICS_HISTORY_LIMIT";
pub const STATE_DIR_VAR: &str = "MCP_METRICS_STATE_DIR";
pub const STORAGE_KEY_VAR: &str = "MCP_METRICS_STORAGE_KEY";

/// Completed executions kept in history
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Key of the persisted history blob
pub const DEFAULT_STORAGE_KEY: &str = "mcpToolMetrics";

pub const DEFAULT_STATE_DIR: &str = ".mcp-metrics";

/// Store configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Maximum number of terminal executions retained (default: 100)
    pub history_limit: usize,

    /// Directory used by the file-backed key-value store
    pub state_dir: PathBuf,

    /// Key the history snapshot is stored under
    pub storage_key: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl MetricsConfig {
    /// Build configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Unparseable or zero limits fall back to the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let history_limit = match get(HISTORY_LIMIT_VAR) {
            Some(raw) => match raw.parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    warn!("Ignoring invalid {}={}", HISTORY_LIMIT_VAR, raw);
                    defaults.history_limit
                }
            },
            None => defaults.history_limit,
        };

        Self {
            history_limit,
            state_dir: get(STATE_DIR_VAR).map(PathBuf::from).unwrap_or(defaults.state_dir),
            storage_key: get(STORAGE_KEY_VAR).unwrap_or(defaults.storage_key),
        }
    }

    /// Override the history limit; zero is rejected
    pub fn with_history_limit(mut self, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::config("history limit must be at least 1"));
        }
        self.history_limit = limit;
        Ok(self)
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }
}

/// Load environment variables from the configured env file.
///
/// Returns the path that was loaded, or None if no file was found.
pub fn load_environment() -> Option<String> {
    if let Ok(custom_path) = std::env::var(ENV_FILE_VAR) {
        if let Some(path) = try_load_env_file(&custom_path) {
            return Some(path);
        }
    }

    if let Some(path) = try_load_env_file(DEFAULT_ENV_FILE) {
        return Some(path);
    }

    debug!("No environment file found, using existing environment");
    None
}

fn try_load_env_file(path: &str) -> Option<String> {
    let path_obj = Path::new(path);
    if !path_obj.exists() {
        return None;
    }

    match fs::read_to_string(path_obj) {
        Ok(content) => {
            let mut loaded_count = 0;
            let mut skipped_count = 0;

            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                if let Some((key, value)) = parse_env_line(line) {
                    if std::env::var(&key).is_err() {
                        std::env::set_var(&key, &value);
                        loaded_count += 1;
                        debug!("Loaded: {}={}", key, masked(&key, &value));
                    } else {
                        skipped_count += 1;
                        debug!("Skipped (already set): {}", key);
                    }
                }
            }

            info!(
                "Loaded {} environment variables from {} ({} skipped - already set)",
                loaded_count, path, skipped_count
            );
            Some(path.to_string())
        }
        Err(e) => {
            warn!("Failed to read environment file {}: {}", path, e);
            None
        }
    }
}

/// Hide values of credential-like keys in logs
fn masked<'a>(key: &str, value: &'a str) -> &'a str {
    if key.contains("KEY") || key.contains("TOKEN") || key.contains("SECRET") {
        "***"
    } else {
        value
    }
}

/// Parse `KEY=VALUE`, `KEY="VALUE"` or `KEY='VALUE'`.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}
