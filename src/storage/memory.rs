//! In-memory storage backend.
//!
//! Wraps a moka cache, which already does cost-based eviction, and layers
//! per-entry TTLs on top through a moka [`Expiry`] policy derived from each
//! entry's marker. No sweeping happens here; expiry and eviction are left to
//! moka's own housekeeping.
//!
//! # Visibility
//!
//! `set` returning `Ok` means the entry was handed to the cache, not that a
//! following `get` will see it. moka may reject the entry (for example when
//! it alone exceeds the capacity) or evict it at any time.

use super::backend::{Lifecycle, Storage, ensure_key};
use crate::constants;
use crate::error::Result;
use crate::expiry::{self, Marker};
use async_trait::async_trait;
use bytes::Bytes;
use moka::Expiry;
use moka::notification::RemovalCause;
use moka::sync::Cache as MokaCache;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Native handle of a [`MemoryStorage`].
pub type MemoryCache = MokaCache<String, CacheEntry>;

/// Value stored in the cache together with its expiration marker.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    value: Bytes,
    expires_at: Option<Marker>,
}

impl CacheEntry {
    /// Creates an entry expiring at `expires_at`, or never.
    pub fn new(value: impl Into<Bytes>, expires_at: Option<Marker>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// The stored bytes.
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// The expiration marker, if any.
    pub fn expires_at(&self) -> Option<Marker> {
        self.expires_at
    }

    fn time_to_live(&self) -> Option<Duration> {
        self.expires_at.map(|marker| marker.remaining(Marker::now()))
    }
}

/// Turns entry markers into moka per-entry expirations.
///
/// Updates recompute from the new entry so an overwrite replaces the old
/// TTL instead of inheriting it.
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.time_to_live()
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.time_to_live()
    }
}

/// Options for a [`MemoryStorage`].
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Byte budget; each entry costs its key length plus value length.
    pub max_capacity: u64,
    /// Pre-allocated number of entries.
    pub initial_capacity: Option<usize>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_capacity: constants::DEFAULT_MEMORY_CAPACITY,
            initial_capacity: None,
        }
    }
}

/// In-memory storage backend using moka.
///
/// # Thread Safety
///
/// `MemoryStorage` is `Clone` and shares one cache between clones. moka's
/// concurrent structures need no external locking; concurrent writers to
/// the same key resolve last-applied-wins.
///
/// # Example
///
/// ```ignore
/// use ttlkv::{MemoryStorage, Storage};
///
/// let backend = MemoryStorage::new();
/// backend.set("key", b"value".to_vec(), Duration::from_secs(60)).await?;
/// ```
#[derive(Clone)]
pub struct MemoryStorage {
    cache: MemoryCache,
    lifecycle: Lifecycle,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::with_config(MemoryConfig::default())
    }
}

impl MemoryStorage {
    /// Creates an empty store with the default 1 GiB budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store.
    pub fn with_config(config: MemoryConfig) -> Self {
        let mut builder = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .weigher(|key: &String, entry: &CacheEntry| -> u32 {
                u32::try_from(key.len() + entry.value.len()).unwrap_or(u32::MAX)
            })
            .expire_after(EntryExpiry)
            .eviction_listener(|key: Arc<String>, _entry: CacheEntry, cause: RemovalCause| {
                if cause.was_evicted() {
                    tracing::trace!(key = %key, ?cause, "Cache entry evicted");
                }
            });
        if let Some(initial) = config.initial_capacity {
            builder = builder.initial_capacity(initial);
        }

        tracing::debug!(max_capacity = config.max_capacity, "Created memory storage");

        Self {
            cache: builder.build(),
            lifecycle: Lifecycle::default(),
        }
    }

    /// Number of entries after applying pending cache maintenance.
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Total weight in bytes after applying pending cache maintenance.
    pub fn weighted_size(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.weighted_size()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    type Conn = MemoryCache;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.lifecycle.ensure_open()?;

        // moka's own expiry may lag; the marker is authoritative.
        Ok(self
            .cache
            .get(key)
            .filter(|entry| !expiry::is_expired(entry.expires_at, Marker::now()))
            .map(|entry| entry.value.to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.lifecycle.ensure_open()?;
        ensure_key(key)?;

        let entry = CacheEntry::new(value, expiry::encode(ttl));
        self.cache.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lifecycle.ensure_open()?;
        self.cache.invalidate(key);
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.lifecycle.ensure_open()?;
        self.cache.invalidate_all();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.lifecycle.mark_closed()?;
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
        tracing::debug!("Closed memory storage");
        Ok(())
    }

    fn conn(&self) -> Self::Conn {
        self.cache.clone()
    }
}
