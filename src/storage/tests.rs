//! Behavior shared by every backend.
//!
//! Each test runs against redb, SQLite and memory stores through the same
//! `Store` API.

use super::*;
use crate::config::{BackendKind, Config};
use crate::error::Error;
use std::time::Duration;
use tempfile::TempDir;

fn stores(tmp: &TempDir) -> Vec<(&'static str, Store)> {
    let redb = Store::redb(tmp.path().join("kv.redb")).unwrap();
    let sqlite = Store::sqlite(SqliteConfig::database(tmp.path().join("kv.sqlite"))).unwrap();
    let memory = Store::memory();
    vec![("redb", redb), ("sqlite", sqlite), ("memory", memory)]
}

#[tokio::test]
async fn test_get_never_written_key() {
    let tmp = TempDir::new().unwrap();
    for (name, store) in stores(&tmp) {
        assert_eq!(store.get("missing").await.unwrap(), None, "{name}");
        assert!(!store.exists("missing").await.unwrap(), "{name}");
    }
}

#[tokio::test]
async fn test_set_and_get_bytes() {
    let tmp = TempDir::new().unwrap();
    let value: Vec<u8> = (0..=255).collect();

    for (name, store) in stores(&tmp) {
        store.set("john", b"doe", Duration::ZERO).await.unwrap();
        store.set("bytes", &value, Duration::ZERO).await.unwrap();

        assert_eq!(store.get("john").await.unwrap(), Some(b"doe".to_vec()), "{name}");
        assert_eq!(store.get("bytes").await.unwrap(), Some(value.clone()), "{name}");
    }
}

#[tokio::test]
async fn test_overwrite_replaces_value() {
    let tmp = TempDir::new().unwrap();
    for (name, store) in stores(&tmp) {
        store.set("john", b"doe", Duration::ZERO).await.unwrap();
        store.set("john", b"smith", Duration::ZERO).await.unwrap();
        assert_eq!(store.get("john").await.unwrap(), Some(b"smith".to_vec()), "{name}");
    }
}

#[tokio::test]
async fn test_overwrite_replaces_expiration() {
    let tmp = TempDir::new().unwrap();
    for (name, store) in stores(&tmp) {
        store.set("short", b"v1", Duration::from_millis(50)).await.unwrap();
        store.set("short", b"v2", Duration::ZERO).await.unwrap();

        store.set("long", b"v1", Duration::ZERO).await.unwrap();
        store.set("long", b"v2", Duration::from_millis(50)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(store.get("short").await.unwrap(), Some(b"v2".to_vec()), "{name}");
        assert_eq!(store.get("long").await.unwrap(), None, "{name}");
    }
}

#[tokio::test]
async fn test_delete() {
    let tmp = TempDir::new().unwrap();
    for (name, store) in stores(&tmp) {
        store.set("john", b"doe", Duration::ZERO).await.unwrap();
        store.delete("john").await.unwrap();
        assert_eq!(store.get("john").await.unwrap(), None, "{name}");

        // Absent keys delete cleanly
        store.delete("john").await.unwrap();
        store.delete("never-written").await.unwrap();
    }
}

#[tokio::test]
async fn test_reset_removes_everything() {
    let tmp = TempDir::new().unwrap();
    for (name, store) in stores(&tmp) {
        store.set("john1", b"doe", Duration::ZERO).await.unwrap();
        store.set("john2", b"doe", Duration::from_secs(3600)).await.unwrap();
        store.reset().await.unwrap();

        assert_eq!(store.get("john1").await.unwrap(), None, "{name}");
        assert_eq!(store.get("john2").await.unwrap(), None, "{name}");

        // Still usable after a reset
        store.set("john3", b"doe", Duration::ZERO).await.unwrap();
        assert_eq!(store.get("john3").await.unwrap(), Some(b"doe".to_vec()), "{name}");
    }
}

#[tokio::test]
async fn test_ttl_expiration() {
    let tmp = TempDir::new().unwrap();
    let stores = stores(&tmp);

    for (_, store) in &stores {
        store.set("john", b"doe", Duration::from_secs(1)).await.unwrap();
        store.set("jane", b"roe", Duration::ZERO).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(1100)).await;

    for (name, store) in &stores {
        assert_eq!(store.get("john").await.unwrap(), None, "{name}");
        assert_eq!(store.get("jane").await.unwrap(), Some(b"roe".to_vec()), "{name}");
    }
}

#[tokio::test]
async fn test_empty_value_is_distinguishable() {
    let tmp = TempDir::new().unwrap();
    for (name, store) in stores(&tmp) {
        store.set("empty", b"", Duration::ZERO).await.unwrap();
        assert_eq!(store.get("empty").await.unwrap(), Some(Vec::new()), "{name}");
        assert!(store.exists("empty").await.unwrap(), "{name}");
        assert_eq!(store.get("absent").await.unwrap(), None, "{name}");
    }
}

#[tokio::test]
async fn test_empty_key_rejected() {
    let tmp = TempDir::new().unwrap();
    for (name, store) in stores(&tmp) {
        let err = store.set("", b"value", Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, Error::EmptyKey), "{name}: {err}");
    }
}

#[tokio::test]
async fn test_concurrent_distinct_keys() {
    let tmp = TempDir::new().unwrap();
    for (name, store) in stores(&tmp) {
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("key-{i}");
                let value = format!("value-{i}");
                for _ in 0..10 {
                    store.set(&key, value.as_bytes(), Duration::ZERO).await.unwrap();
                    let read = store.get(&key).await.unwrap();
                    assert_eq!(read, Some(value.clone().into_bytes()));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..16 {
            let expected = format!("value-{i}").into_bytes();
            assert_eq!(
                store.get(&format!("key-{i}")).await.unwrap(),
                Some(expected),
                "{name}"
            );
        }
    }
}

#[tokio::test]
async fn test_operations_after_close() {
    let tmp = TempDir::new().unwrap();
    for (name, store) in stores(&tmp) {
        store.set("john", b"doe", Duration::ZERO).await.unwrap();
        store.close().await.unwrap();

        assert!(store.get("john").await.unwrap_err().is_closed(), "{name}");
        assert!(
            store.set("john", b"doe", Duration::ZERO).await.unwrap_err().is_closed(),
            "{name}"
        );
        assert!(store.delete("john").await.unwrap_err().is_closed(), "{name}");
        assert!(store.reset().await.unwrap_err().is_closed(), "{name}");
        assert!(store.close().await.unwrap_err().is_closed(), "{name}");
    }
}

#[tokio::test]
async fn test_conn_after_close() {
    let tmp = TempDir::new().unwrap();
    for (name, store) in stores(&tmp) {
        let kind = store.backend().kind();
        store.close().await.unwrap();

        let matches_kind = matches!(
            (kind, store.conn()),
            (BackendKind::Redb, AnyConn::Redb(_))
                | (BackendKind::Sqlite, AnyConn::Sqlite(_))
                | (BackendKind::Memory, AnyConn::Memory(_))
        );
        assert!(matches_kind, "{name}");
    }
}

#[tokio::test]
async fn test_clones_share_state() {
    let tmp = TempDir::new().unwrap();
    for (name, store) in stores(&tmp) {
        let other = store.clone();
        store.set("john", b"doe", Duration::ZERO).await.unwrap();
        assert_eq!(other.get("john").await.unwrap(), Some(b"doe".to_vec()), "{name}");

        other.close().await.unwrap();
        assert!(store.get("john").await.unwrap_err().is_closed(), "{name}");
    }
}

#[tokio::test]
async fn test_from_config_selects_backend() {
    let tmp = TempDir::new().unwrap();
    let toml_str = format!(
        r#"
[store]
backend = "sqlite"

[sqlite]
database = "{}"
table = "sessions"
"#,
        tmp.path().join("cfg.sqlite").display()
    );
    let config = Config::parse(&toml_str).unwrap();

    let store = Store::from_config(&config).unwrap();
    assert_eq!(store.backend().kind(), BackendKind::Sqlite);

    store.set("john", b"doe", Duration::ZERO).await.unwrap();
    let AnyConn::Sqlite(conn) = store.conn() else {
        panic!("expected sqlite connection");
    };
    let count: i64 = conn
        .lock()
        .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_from_config_rejects_invalid() {
    let config = Config::parse("[memory]\nmax_capacity = 0\n").unwrap();
    let err = Store::from_config(&config).err().unwrap();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_custom_backend() {
    let store = Store::custom(MemoryStorage::new());
    store.set("john", b"doe", Duration::ZERO).await.unwrap();
    assert_eq!(store.backend().entry_count(), 1);
}
