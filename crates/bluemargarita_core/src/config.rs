//! Environment-driven configuration for core callers.
//!
//! # Responsibility
//! - Collect database, logging and stock-policy settings in one place.
//! - Provide deterministic defaults when variables are absent.

use crate::logging::default_log_level;
use crate::model::stock::StockPolicy;
use std::collections::HashMap;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "BLUEMARGARITA_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "BLUEMARGARITA_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "BLUEMARGARITA_LOG_DIR";
pub const ENV_ALLOW_NEGATIVE_STOCK: &str = "BLUEMARGARITA_ALLOW_NEGATIVE_STOCK";

const DEFAULT_DB_FILE_NAME: &str = "bluemargarita.sqlite3";

/// Runtime settings for the core crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling logs; logging stays off when `None`.
    pub log_dir: Option<PathBuf>,
    /// Lets REMOVE/SET drive stock below zero.
    pub allow_negative_stock: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
            allow_negative_stock: false,
        }
    }
}

impl CoreConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Self {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Reads configuration from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let value = |key: &str| {
            vars.get(key)
                .map(|raw| raw.trim())
                .filter(|raw| !raw.is_empty())
        };

        Self {
            db_path: value(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            log_level: value(ENV_LOG_LEVEL)
                .map(str::to_string)
                .unwrap_or(defaults.log_level),
            log_dir: value(ENV_LOG_DIR).map(PathBuf::from),
            allow_negative_stock: value(ENV_ALLOW_NEGATIVE_STOCK)
                .map(parse_flag)
                .unwrap_or(defaults.allow_negative_stock),
        }
    }

    /// Stock mutation policy derived from this configuration.
    pub fn stock_policy(&self) -> StockPolicy {
        StockPolicy {
            allow_negative: self.allow_negative_stock,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
