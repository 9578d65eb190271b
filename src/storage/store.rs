//! High-level `Store` wrapper over backend implementations.
//!
//! Provides a convenient API that wraps any `Storage` implementation.

use super::any::AnyStorage;
use super::backend::Storage;
use super::memory::MemoryStorage;
use super::redb::RedbStorage;
use super::sqlite::{SqliteConfig, SqliteStorage};
use crate::config::Config;
use crate::error::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// High-level TTL key-value store.
///
/// Wraps a `Storage` implementation and provides a consistent API
/// regardless of the underlying storage mechanism.
///
/// # Thread Safety
///
/// `Store` is `Clone` and can be shared across threads. Clones share one
/// backend, so closing any clone closes them all.
///
/// # Example
///
/// ```ignore
/// use ttlkv::Store;
/// use std::time::Duration;
///
/// let store = Store::memory();
///
/// // Set a value that lives for an hour
/// store.set("session:123", b"user_data", Duration::from_secs(3600)).await?;
///
/// if let Some(data) = store.get("session:123").await? {
///     println!("Found: {} bytes", data.len());
/// }
/// ```
pub struct Store<B: Storage = AnyStorage> {
    backend: Arc<B>,
}

impl<B: Storage> Clone for Store<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl Store {
    /// Creates a store backed by a redb file, created if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn redb<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::custom(AnyStorage::from(RedbStorage::open(path)?)))
    }

    /// Creates a store backed by a SQLite table.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// See [`SqliteStorage::with_config`].
    pub fn sqlite(config: SqliteConfig) -> Result<Self> {
        Ok(Self::custom(AnyStorage::from(SqliteStorage::with_config(
            config,
        )?)))
    }

    /// Creates a store backed by an in-memory cache with the default budget.
    ///
    /// All data is lost when the process exits.
    pub fn memory() -> Self {
        Self::custom(AnyStorage::from(MemoryStorage::new()))
    }

    /// Creates a store for the backend selected in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the backend fails to open.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::custom(AnyStorage::from_config(config)?))
    }
}

impl<B: Storage> Store<B> {
    /// Creates a store over a specific backend.
    ///
    /// ```ignore
    /// let store = Store::custom(MemoryStorage::new());
    /// ```
    pub fn custom(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Retrieves a value by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist, has expired, or was evicted.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.backend.get(key).await
    }

    /// Stores a key-value pair. A zero `ttl` never expires.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the storage operation fails.
    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.backend.set(key, value.to_vec(), ttl).await
    }

    /// Deletes a key. Absent keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.backend.delete(key).await
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn reset(&self) -> Result<()> {
        self.backend.reset().await
    }

    /// Closes the store and stops any background sweeps.
    ///
    /// # Errors
    ///
    /// Returns an error if the store was already closed.
    pub async fn close(&self) -> Result<()> {
        self.backend.close().await
    }

    /// Checks if a key holds a live value.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.backend.exists(key).await
    }

    /// Native handle of the backend.
    pub fn conn(&self) -> B::Conn {
        self.backend.conn()
    }
}
