// 🔧 Application Configuration
//
// Lookup order: explicit path → ISSUANCE_LEDGER_CONFIG → built-in defaults.
// ISSUANCE_LEDGER_DB and ISSUANCE_LEDGER_CATALOG override the two paths.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "ISSUANCE_LEDGER_CONFIG";
pub const DB_ENV: &str = "ISSUANCE_LEDGER_DB";
pub const CATALOG_ENV: &str = "ISSUANCE_LEDGER_CATALOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Directory holding the four catalog JSON files
    pub catalog_dir: PathBuf,

    /// tracing-subscriber filter directive, overridden by RUST_LOG
    pub log_filter: String,

    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from("issuance.db"),
            catalog_dir: PathBuf::from("data/catalog"),
            log_filter: "info".to_string(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Resolve configuration for a binary
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);

        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_overrides(
            std::env::var_os(DB_ENV).map(PathBuf::from),
            std::env::var_os(CATALOG_ENV).map(PathBuf::from),
        );

        Ok(config)
    }

    fn apply_overrides(&mut self, database_path: Option<PathBuf>, catalog_dir: Option<PathBuf>) {
        if let Some(path) = database_path {
            self.database_path = path;
        }
        if let Some(dir) = catalog_dir {
            self.catalog_dir = dir;
        }
    }
}
