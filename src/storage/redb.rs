//! Redb-backed storage backend.
//!
//! Provides persistent key-value storage using redb with ACID guarantees.
//! Each entry is stored as an 8-byte big-endian expiration header followed
//! by the raw value. Expired entries are skipped on read and left in place;
//! they are overwritten by the next `set` or dropped by `reset`.
//!
//! The database lives in a shared slot. `close` empties the slot, which drops
//! the `Database` and releases the file lock even while clones of the store
//! or of its handle are still around.

use super::backend::{Storage, ensure_key};
use crate::constants;
use crate::error::{Error, Result};
use crate::expiry::{self, Marker};
use async_trait::async_trait;
use parking_lot::RwLock;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Size of the expiration header in front of every stored value.
const HEADER_LEN: usize = 8;

/// Shared native handle of a [`RedbStorage`]; `None` once the store is closed.
pub type RedbHandle = Arc<RwLock<Option<Database>>>;

/// Options for opening a [`RedbStorage`].
#[derive(Debug, Clone)]
pub struct RedbConfig {
    /// Database file; parent directories are created on open.
    pub path: PathBuf,
    /// Table holding the entries.
    pub table: String,
    /// Drop every existing entry when opening.
    pub reset: bool,
}

impl RedbConfig {
    /// Default options for the database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            table: constants::DEFAULT_REDB_TABLE.to_string(),
            reset: false,
        }
    }

    /// Uses a different table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Clears the table on open.
    #[must_use]
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }
}

/// Redb-backed storage backend.
///
/// # Thread Safety
///
/// `RedbStorage` is `Clone` and can be shared across threads. redb itself
/// serializes writers and gives readers snapshot isolation. Operations share
/// a read lock on the database slot; only `close` takes it exclusively, so it
/// waits for in-flight transactions before dropping the database.
#[derive(Clone)]
pub struct RedbStorage {
    db: RedbHandle,
    table: Arc<str>,
}

impl RedbStorage {
    /// Opens or creates a redb database at the given path with default options.
    ///
    /// # Errors
    ///
    /// See [`RedbStorage::with_config`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_config(RedbConfig::new(path))
    }

    /// Opens or creates a redb database.
    ///
    /// The table is created in the initialization transaction so readers
    /// never see it missing. With `reset` set, the old table is dropped in
    /// that same transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The table name is empty
    /// - Parent directory cannot be created
    /// - Database file cannot be opened or created (permissions, already open, etc.)
    /// - Initialization transaction fails to begin or commit
    pub fn with_config(config: RedbConfig) -> Result<Self> {
        if config.table.is_empty() {
            return Err(Error::config("redb table name cannot be empty"));
        }

        let path = config.path.as_path();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::io(format!("creating directory {}", parent.display()), e)
            })?;
        }

        let db = Database::create(path)?;
        let table: Arc<str> = Arc::from(config.table.as_str());

        let write_txn = db.begin_write()?;
        if config.reset {
            write_txn.delete_table(definition(&table))?;
        }
        {
            let _table = write_txn.open_table(definition(&table))?;
        }
        write_txn.commit()?;

        let storage = Self {
            db: Arc::new(RwLock::new(Some(db))),
            table,
        };

        tracing::info!(
            path = %path.display(),
            table = %storage.table,
            reset = config.reset,
            "Opened redb storage"
        );

        Ok(storage)
    }

    fn definition(&self) -> TableDefinition<'_, &'static str, &'static [u8]> {
        definition(&self.table)
    }

    /// Runs `f` against the open database, or fails with [`Error::Closed`].
    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let slot = self.db.read();
        let db = slot.as_ref().ok_or(Error::Closed)?;
        f(db)
    }

    fn get_sync(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_db(|db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(self.definition())?;

            let Some(guard) = table.get(key)? else {
                return Ok(None);
            };
            let (marker, value) = decode_entry(key, guard.value())?;
            if expiry::is_expired(marker, Marker::now()) {
                return Ok(None);
            }
            Ok(Some(value.to_vec()))
        })
    }

    fn set_sync(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.with_db(|db| {
            ensure_key(key)?;

            let entry = encode_entry(expiry::encode(ttl), value);

            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(self.definition())?;
                table.insert(key, entry.as_slice())?;
            }
            write_txn.commit()?;

            Ok(())
        })
    }

    fn delete_sync(&self, key: &str) -> Result<()> {
        self.with_db(|db| {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(self.definition())?;
                table.remove(key)?;
            }
            write_txn.commit()?;

            Ok(())
        })
    }

    fn reset_sync(&self) -> Result<()> {
        self.with_db(|db| {
            // Drop and recreate in one transaction so readers see either the
            // old table or the empty one.
            let write_txn = db.begin_write()?;
            write_txn.delete_table(self.definition())?;
            {
                let _table = write_txn.open_table(self.definition())?;
            }
            write_txn.commit()?;

            tracing::debug!(table = %self.table, "Reset redb table");
            Ok(())
        })
    }

    /// Empties the slot, dropping the database and its file lock.
    fn close_sync(&self) -> Result<()> {
        let db = self.db.write().take().ok_or(Error::Closed)?;
        drop(db);
        tracing::info!(table = %self.table, "Closed redb storage");
        Ok(())
    }
}

fn definition(table: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(table)
}

/// Prefixes `value` with the big-endian expiration header.
fn encode_entry(marker: Option<Marker>, value: &[u8]) -> Vec<u8> {
    let mut entry = Vec::with_capacity(HEADER_LEN + value.len());
    entry.extend_from_slice(&Marker::to_stored(marker).to_be_bytes());
    entry.extend_from_slice(value);
    entry
}

/// Splits a stored entry into its marker and value.
fn decode_entry<'a>(key: &str, entry: &'a [u8]) -> Result<(Option<Marker>, &'a [u8])> {
    let Some((header, value)) = entry.split_first_chunk::<HEADER_LEN>() else {
        return Err(Error::CorruptEntry {
            key: key.to_string(),
            len: entry.len(),
        });
    };
    Ok((Marker::from_stored(i64::from_be_bytes(*header)), value))
}

#[async_trait]
impl Storage for RedbStorage {
    type Conn = RedbHandle;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let backend = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.get_sync(&key)).await?
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let backend = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.set_sync(&key, &value, ttl)).await?
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let backend = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || backend.delete_sync(&key)).await?
    }

    async fn reset(&self) -> Result<()> {
        let backend = self.clone();
        tokio::task::spawn_blocking(move || backend.reset_sync()).await?
    }

    async fn close(&self) -> Result<()> {
        let backend = self.clone();
        tokio::task::spawn_blocking(move || backend.close_sync()).await?
    }

    fn conn(&self) -> Self::Conn {
        Arc::clone(&self.db)
    }
}
