//! Runtime configuration from the environment.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Path of the SQLite database (overrides the platform data directory).
pub const DATABASE_ENV: &str = "PVER_DATABASE";
/// Standard tracing filter variable.
pub const LOG_ENV: &str = "RUST_LOG";

const DEFAULT_LOG_FILTER: &str = "product_versions=info";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    pub log_filter: String,
}

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_path = match lookup(DATABASE_ENV).filter(|p| !p.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_database_path()?,
        };

        let log_filter = lookup(LOG_ENV)
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            database_path,
            log_filter,
        })
    }

    /// Replace the database path, e.g. from a command-line flag.
    pub fn with_database(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.database_path = path;
        }
        self
    }
}

/// `<data dir>/product-versions.db` in the platform's application data directory.
pub fn default_database_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "product-versions")
        .ok_or_else(|| Error::config("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("product-versions.db"))
}
