//! TTL-aware key-value storage with pluggable backends.
//!
//! Every backend satisfies the same [`Storage`] contract:
//!
//! - **RedbStorage**: Persistent single-file store; expired entries stay on
//!   disk until overwritten or deleted
//! - **SqliteStorage**: One SQLite table, swept in the background by a GC task
//! - **MemoryStorage**: Cost-bounded moka cache; entries may be evicted early
//!
//! # Example
//!
//! ```ignore
//! use ttlkv::{SqliteConfig, Store};
//! use std::time::Duration;
//!
//! // In-memory (testing/embedding)
//! let store = Store::memory();
//! store.set("key", b"value", Duration::ZERO).await?;
//!
//! // Persistent
//! let store = Store::redb("data/kv.redb")?;
//! store.set("key", b"value", Duration::from_secs(60)).await?;
//!
//! // Relational, with a background sweeper
//! let store = Store::sqlite(SqliteConfig::database("data/kv.sqlite"))?;
//! ```
//!
//! # Custom Backends
//!
//! Implement the `Storage` trait and wrap it with [`Store::custom`].

mod any;
mod backend;
mod gc;
mod memory;
mod redb;
mod sqlite;
mod store;

#[cfg(test)]
mod tests;

// Re-export the public API
pub use any::{AnyConn, AnyStorage};
pub use backend::Storage;
pub use memory::{CacheEntry, MemoryCache, MemoryConfig, MemoryStorage};
pub use redb::{RedbConfig, RedbHandle, RedbStorage};
pub use sqlite::{SharedConnection, SqliteConfig, SqliteStorage};
pub use store::Store;

pub(crate) use sqlite::is_identifier;
