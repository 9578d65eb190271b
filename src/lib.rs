//! TTL-aware key-value storage.
//!
//! `ttlkv` stores byte values under string keys with an optional per-entry
//! time-to-live, behind one async [`Storage`] contract and three
//! interchangeable backends: redb, SQLite and an in-memory moka cache.
//!
//! ```ignore
//! use ttlkv::Store;
//! use std::time::Duration;
//!
//! let store = Store::memory();
//! store.set("session:1", b"alice", Duration::from_secs(3600)).await?;
//! assert_eq!(store.get("session:1").await?, Some(b"alice".to_vec()));
//! store.close().await?;
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod expiry;
pub mod storage;

pub use config::{BackendKind, Config};
pub use error::{Error, Result};
pub use expiry::Marker;
pub use storage::{
    AnyConn, AnyStorage, CacheEntry, MemoryCache, MemoryConfig, MemoryStorage, RedbConfig,
    RedbHandle, RedbStorage, SharedConnection, SqliteConfig, SqliteStorage, Storage, Store,
};
