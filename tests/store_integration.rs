//! End-to-end tests through the public `ttlkv` API.
//!
//! Run with:
//! ```bash
//! cargo test --test store_integration
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use ttlkv::{
    BackendKind, Config, Error, MemoryStorage, RedbConfig, RedbStorage, SqliteConfig,
    SqliteStorage, Storage, Store,
};

/// Exercises a backend purely through the trait.
async fn roundtrip<S: Storage>(backend: &S) {
    backend
        .set("john", b"doe".to_vec(), Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(backend.get("john").await.unwrap(), Some(b"doe".to_vec()));
    assert!(backend.exists("john").await.unwrap());

    backend.delete("john").await.unwrap();
    assert_eq!(backend.get("john").await.unwrap(), None);
}

#[tokio::test]
async fn test_every_backend_through_trait() {
    let tmp = TempDir::new().unwrap();

    let redb = RedbStorage::open(tmp.path().join("kv.redb")).unwrap();
    roundtrip(&redb).await;
    redb.close().await.unwrap();

    let sqlite = SqliteStorage::open(tmp.path().join("kv.sqlite")).unwrap();
    roundtrip(&sqlite).await;
    sqlite.close().await.unwrap();

    let memory = MemoryStorage::new();
    roundtrip(&memory).await;
    memory.close().await.unwrap();
}

#[tokio::test]
async fn test_redb_persists_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested/dir/kv.redb");

    {
        let store = Store::redb(&path).unwrap();
        store.set("forever", b"1", Duration::ZERO).await.unwrap();
        store
            .set("hour", b"2", Duration::from_secs(3600))
            .await
            .unwrap();
        store.close().await.unwrap();
    }

    let store = Store::redb(&path).unwrap();
    assert_eq!(store.get("forever").await.unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.get("hour").await.unwrap(), Some(b"2".to_vec()));
    store.close().await.unwrap();
    drop(store);

    let reset = RedbStorage::with_config(RedbConfig::new(&path).with_reset(true)).unwrap();
    assert_eq!(reset.get("forever").await.unwrap(), None);
}

#[tokio::test]
async fn test_sqlite_persists_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("kv.sqlite");

    let store = Store::sqlite(SqliteConfig::database(&path)).unwrap();
    store.set("john", b"doe", Duration::ZERO).await.unwrap();
    store.close().await.unwrap();
    drop(store);

    let store = Store::sqlite(SqliteConfig::database(&path)).unwrap();
    assert_eq!(store.get("john").await.unwrap(), Some(b"doe".to_vec()));
}

#[tokio::test]
async fn test_store_from_config_file() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("ttlkv.toml");
    std::fs::write(
        &config_path,
        format!(
            "[store]\nbackend = \"redb\"\n\n[redb]\npath = \"{}\"\ntable = \"entries\"\n",
            tmp.path().join("from-config.redb").display()
        ),
    )
    .unwrap();

    let config = Config::load_from(&config_path).unwrap();
    assert_eq!(config.store.backend, BackendKind::Redb);

    let store = Store::from_config(&config).unwrap();
    store.set("john", b"doe", Duration::ZERO).await.unwrap();
    assert_eq!(store.get("john").await.unwrap(), Some(b"doe".to_vec()));
    store.close().await.unwrap();
}

/// Minimal third-party backend, to prove the trait is implementable
/// outside the crate.
#[derive(Clone, Default)]
struct MapStorage {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

#[async_trait]
impl Storage for MapStorage {
    type Conn = Arc<Mutex<HashMap<String, Vec<u8>>>>;

    async fn get(&self, key: &str) -> ttlkv::Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>, _ttl: Duration) -> ttlkv::Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> ttlkv::Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn reset(&self) -> ttlkv::Result<()> {
        self.entries.lock().clear();
        Ok(())
    }

    async fn close(&self) -> ttlkv::Result<()> {
        Ok(())
    }

    fn conn(&self) -> Self::Conn {
        Arc::clone(&self.entries)
    }
}

#[tokio::test]
async fn test_custom_backend_through_store() {
    let store = Store::custom(MapStorage::default());
    store.set("john", b"doe", Duration::ZERO).await.unwrap();
    assert!(store.exists("john").await.unwrap());
    assert_eq!(store.conn().lock().len(), 1);

    store.reset().await.unwrap();
    assert_eq!(store.get("john").await.unwrap(), None);
}
