//! Runtime-selected backend.
//!
//! `AnyStorage` lets callers pick a backend from configuration while still
//! going through the same [`Storage`] contract.

use super::backend::Storage;
use super::memory::{MemoryCache, MemoryConfig, MemoryStorage};
use super::redb::{RedbConfig, RedbHandle, RedbStorage};
use super::sqlite::{SharedConnection, SqliteConfig, SqliteStorage};
use crate::config::{BackendKind, Config};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// One of the built-in backends.
#[derive(Clone)]
pub enum AnyStorage {
    Redb(RedbStorage),
    Sqlite(SqliteStorage),
    Memory(MemoryStorage),
}

/// Native handle of whichever backend is in use.
#[derive(Clone)]
pub enum AnyConn {
    Redb(RedbHandle),
    Sqlite(SharedConnection),
    Memory(MemoryCache),
}

impl AnyStorage {
    /// Opens the backend selected by `config.store.backend`.
    ///
    /// The config is validated first; warnings are logged.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the backend cannot be opened.
    pub fn from_config(config: &Config) -> Result<Self> {
        let report = config.validate()?;
        for warning in &report.warnings {
            tracing::warn!("{warning}");
        }

        match config.store.backend {
            BackendKind::Redb => {
                let redb = &config.redb;
                let storage = RedbStorage::with_config(
                    RedbConfig::new(redb.resolved_path()?)
                        .with_table(redb.table.clone())
                        .with_reset(redb.reset),
                )?;
                Ok(Self::Redb(storage))
            },
            BackendKind::Sqlite => {
                let sqlite = &config.sqlite;
                let mut options = SqliteConfig {
                    connection_uri: sqlite.connection_uri.clone(),
                    ..SqliteConfig::default()
                };
                if sqlite.connection_uri.is_none() {
                    options.database = Some(sqlite.resolved_database()?);
                }
                let options = options
                    .with_table(sqlite.table.clone())
                    .with_reset(sqlite.reset)
                    .with_gc_interval(Duration::from_millis(sqlite.gc_interval_ms))
                    .with_busy_timeout(Duration::from_millis(sqlite.busy_timeout_ms));
                Ok(Self::Sqlite(SqliteStorage::with_config(options)?))
            },
            BackendKind::Memory => Ok(Self::Memory(MemoryStorage::with_config(MemoryConfig {
                max_capacity: config.memory.max_capacity,
                initial_capacity: config.memory.initial_capacity,
            }))),
        }
    }

    /// Which backend this is.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Redb(_) => BackendKind::Redb,
            Self::Sqlite(_) => BackendKind::Sqlite,
            Self::Memory(_) => BackendKind::Memory,
        }
    }
}

impl From<RedbStorage> for AnyStorage {
    fn from(storage: RedbStorage) -> Self {
        Self::Redb(storage)
    }
}

impl From<SqliteStorage> for AnyStorage {
    fn from(storage: SqliteStorage) -> Self {
        Self::Sqlite(storage)
    }
}

impl From<MemoryStorage> for AnyStorage {
    fn from(storage: MemoryStorage) -> Self {
        Self::Memory(storage)
    }
}

#[async_trait]
impl Storage for AnyStorage {
    type Conn = AnyConn;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Redb(s) => s.get(key).await,
            Self::Sqlite(s) => s.get(key).await,
            Self::Memory(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        match self {
            Self::Redb(s) => s.set(key, value, ttl).await,
            Self::Sqlite(s) => s.set(key, value, ttl).await,
            Self::Memory(s) => s.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Self::Redb(s) => s.delete(key).await,
            Self::Sqlite(s) => s.delete(key).await,
            Self::Memory(s) => s.delete(key).await,
        }
    }

    async fn reset(&self) -> Result<()> {
        match self {
            Self::Redb(s) => s.reset().await,
            Self::Sqlite(s) => s.reset().await,
            Self::Memory(s) => s.reset().await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            Self::Redb(s) => s.close().await,
            Self::Sqlite(s) => s.close().await,
            Self::Memory(s) => s.close().await,
        }
    }

    fn conn(&self) -> Self::Conn {
        match self {
            Self::Redb(s) => AnyConn::Redb(s.conn()),
            Self::Sqlite(s) => AnyConn::Sqlite(s.conn()),
            Self::Memory(s) => AnyConn::Memory(s.conn()),
        }
    }
}
