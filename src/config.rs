//! Configuration file support.
//!
//! Loads `ttlkv.toml`, which selects a backend and carries the options of
//! each one:
//!
//! ```toml
//! [store]
//! backend = "sqlite"          # redb | sqlite | memory
//!
//! [redb]
//! path = "data/kv.redb"
//! table = "kv"
//! reset = false
//!
//! [sqlite]
//! database = "data/kv.sqlite" # or: connection_uri = "file:kv.sqlite?mode=rwc"
//! table = "kv_store"
//! reset = false
//! gc_interval_ms = 10000
//! busy_timeout_ms = 5000
//!
//! [memory]
//! max_capacity = 1073741824
//! ```
//!
//! Every section is optional. Paths left unset resolve under the data
//! directory (`$TTLKV_HOME`, or `~/.ttlkv/`).

use crate::constants;
use crate::error::{Error, Result};
use crate::storage::is_identifier;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Which backend a store is bound to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Embedded single-file store.
    #[default]
    Redb,
    /// SQLite table with background expiry sweeps.
    Sqlite,
    /// Process-local moka cache.
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Redb => "redb",
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        })
    }
}

/// ttlkv.toml configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub redb: RedbSection,
    #[serde(default)]
    pub sqlite: SqliteSection,
    #[serde(default)]
    pub memory: MemorySection,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: BackendKind,
}

#[derive(Debug, Deserialize)]
pub struct RedbSection {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_redb_table")]
    pub table: String,
    #[serde(default)]
    pub reset: bool,
}

impl Default for RedbSection {
    fn default() -> Self {
        Self {
            path: None,
            table: default_redb_table(),
            reset: false,
        }
    }
}

impl RedbSection {
    /// The configured path, or `kv.redb` in the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is set and the home directory is unknown.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(constants::DEFAULT_REDB_FILE)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SqliteSection {
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub connection_uri: Option<String>,
    #[serde(default = "default_sqlite_table")]
    pub table: String,
    #[serde(default)]
    pub reset: bool,
    #[serde(default = "default_gc_interval_ms")]
    pub gc_interval_ms: u64,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for SqliteSection {
    fn default() -> Self {
        Self {
            database: None,
            connection_uri: None,
            table: default_sqlite_table(),
            reset: false,
            gc_interval_ms: default_gc_interval_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl SqliteSection {
    /// The configured database file, or `kv.sqlite` in the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is set and the home directory is unknown.
    pub fn resolved_database(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(constants::DEFAULT_SQLITE_FILE)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MemorySection {
    #[serde(default = "default_memory_capacity")]
    pub max_capacity: u64,
    #[serde(default)]
    pub initial_capacity: Option<usize>,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            max_capacity: default_memory_capacity(),
            initial_capacity: None,
        }
    }
}

fn default_redb_table() -> String {
    constants::DEFAULT_REDB_TABLE.to_string()
}

fn default_sqlite_table() -> String {
    constants::DEFAULT_SQLITE_TABLE.to_string()
}

fn default_gc_interval_ms() -> u64 {
    constants::DEFAULT_GC_INTERVAL.as_millis() as u64
}

fn default_busy_timeout_ms() -> u64 {
    constants::DEFAULT_BUSY_TIMEOUT.as_millis() as u64
}

fn default_memory_capacity() -> u64 {
    constants::DEFAULT_MEMORY_CAPACITY
}

/// Base directory for data files.
///
/// Resolution order:
/// 1. `TTLKV_HOME` environment variable (if set)
/// 2. `~/.ttlkv/` (default)
///
/// # Errors
///
/// Returns an error if neither is available.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(constants::HOME_ENV)
        && !home.is_empty()
    {
        return Ok(PathBuf::from(home));
    }

    let home = dirs::home_dir().ok_or_else(|| Error::config("failed to get home directory"))?;
    Ok(home.join(".ttlkv"))
}

impl Config {
    /// Load configuration from ttlkv.toml in the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if ttlkv.toml cannot be read or contains invalid TOML.
    pub fn load() -> Result<Self> {
        Self::load_from(constants::CONFIG_FILE)
    }

    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML syntax
    /// - Fields have invalid types or unknown backend names
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading config file {}", path.display()), e))?;

        Self::parse(&content)
            .map_err(|e| Error::config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if parsing fails.
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Validate configuration with comprehensive checks.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] listing every problem found:
    /// - Empty redb table name
    /// - SQLite table name that is not a plain identifier
    /// - Both `database` and `connection_uri` set for SQLite
    /// - Zero GC interval or zero memory capacity
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. redb
        if self.redb.table.is_empty() {
            errors.push("redb.table cannot be empty".to_string());
        }

        // 2. sqlite
        let sqlite = &self.sqlite;
        if !is_identifier(&sqlite.table) {
            errors.push(format!(
                "sqlite.table '{}' must be a plain identifier (letters, digits, underscores)",
                sqlite.table
            ));
        }
        if sqlite.database.is_some() && sqlite.connection_uri.is_some() {
            errors.push(
                "sqlite.database and sqlite.connection_uri are both set\n  \
                 Set exactly one connection method"
                    .to_string(),
            );
        }
        if sqlite.connection_uri.as_deref() == Some("") {
            errors.push("sqlite.connection_uri cannot be empty".to_string());
        }
        if sqlite.gc_interval_ms == 0 {
            errors.push("sqlite.gc_interval_ms cannot be 0".to_string());
        } else if u128::from(sqlite.gc_interval_ms)
            < constants::MIN_RECOMMENDED_GC_INTERVAL.as_millis()
        {
            warnings.push(format!(
                "sqlite.gc_interval_ms {} is very short\n  \
                 Recommendation: sweep every few seconds; reads already hide expired rows",
                sqlite.gc_interval_ms
            ));
        }

        // 3. memory
        if self.memory.max_capacity == 0 {
            errors.push("memory.max_capacity cannot be 0".to_string());
        }

        // 4. reset-on-start for the selected backend
        let reset = match self.store.backend {
            BackendKind::Redb => self.redb.reset,
            BackendKind::Sqlite => self.sqlite.reset,
            BackendKind::Memory => false,
        };
        if reset {
            warnings.push(format!(
                "{}.reset is enabled: existing entries are dropped on every start",
                self.store.backend
            ));
        }

        if !errors.is_empty() {
            return Err(Error::config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )));
        }

        Ok(ValidationResult { warnings })
    }
}
