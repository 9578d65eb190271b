//! Backend trait for the TTL store.
//!
//! Defines the contract every storage backend must satisfy, whatever its
//! native concurrency or durability model.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Backend trait for TTL-aware key-value storage.
///
/// All backends must be thread-safe (`Send + Sync`) for use with tokio.
/// The observable contract is identical across implementations:
///
/// - A key that was never written, was deleted, has expired or was evicted
///   reads as `Ok(None)`. Absence is never an error.
/// - `set` replaces both value and expiration in one step.
/// - `reset` empties the store in one step.
/// - After `close`, every operation returns [`Error::Closed`].
///
/// # Example
///
/// ```ignore
/// use ttlkv::{MemoryStorage, Storage};
/// use std::time::Duration;
///
/// let backend = MemoryStorage::new();
/// backend.set("key", b"value".to_vec(), Duration::ZERO).await?;
/// let value = backend.get("key").await?;
/// ```
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Native handle exposed by [`Storage::conn`].
    type Conn: Clone + Send + Sync + 'static;

    /// Retrieves a value by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist, has expired, or was
    /// evicted. A stored empty value comes back as `Ok(Some(vec![]))`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores a key-value pair.
    ///
    /// A zero `ttl` means the entry never expires; otherwise it expires
    /// `ttl` after this call. Overwrites any existing value and expiration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyKey`] for an empty key, or an error if the
    /// underlying storage operation fails. A failed set leaves the prior
    /// value intact.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Deletes a key. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn reset(&self) -> Result<()>;

    /// Releases the store's resources and stops background work.
    ///
    /// The store is unusable afterwards even if this returns an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the store was already closed.
    async fn close(&self) -> Result<()>;

    /// Returns the live native connection or handle.
    ///
    /// Operations performed through it bypass this trait's guarantees.
    fn conn(&self) -> Self::Conn;

    /// Checks if a key holds a live value.
    ///
    /// Default implementation uses `get()`, but backends may override
    /// for efficiency.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Rejects keys that can never be stored.
pub(crate) fn ensure_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::EmptyKey);
    }
    Ok(())
}

/// Open/closed state shared by every clone of a backend.
#[derive(Clone, Debug, Default)]
pub(crate) struct Lifecycle {
    closed: Arc<AtomicBool>,
}

impl Lifecycle {
    /// Fails with [`Error::Closed`] once the store has been closed.
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Flips the store to closed. Only the first caller succeeds.
    pub(crate) fn mark_closed(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(Error::Closed);
        }
        Ok(())
    }
}
