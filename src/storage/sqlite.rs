//! SQLite-backed storage backend.
//!
//! Stores entries as rows of a single table:
//!
//! ```sql
//! CREATE TABLE kv_store (
//!     key        TEXT    NOT NULL PRIMARY KEY,
//!     value      BLOB    NOT NULL,
//!     expires_at INTEGER NOT NULL DEFAULT 0  -- epoch nanos, 0 = never
//! );
//! ```
//!
//! Reads check expiration themselves; a background sweeper owned by the
//! store deletes expired rows in bulk to bound table growth.
//!
//! `close` swaps the database connection for a detached in-memory one and
//! closes the original, so [`Storage::conn`] keeps returning a usable handle
//! that no longer refers to the store's database.

use super::backend::{Lifecycle, Storage, ensure_key};
use super::gc::Sweeper;
use crate::constants;
use crate::error::{Error, Result};
use crate::expiry::{self, Marker};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Shared native handle of a [`SqliteStorage`].
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Options for opening a [`SqliteStorage`].
///
/// Exactly one of `database`, `connection_uri` or `connection` must be set;
/// anything else is rejected at construction.
#[derive(Debug)]
pub struct SqliteConfig {
    /// Database file path (structured connection).
    pub database: Option<PathBuf>,
    /// Busy timeout applied to structured connections.
    pub busy_timeout: Duration,
    /// SQLite URI such as `file:data.db?mode=rwc`.
    pub connection_uri: Option<String>,
    /// An already-open connection.
    pub connection: Option<Connection>,
    /// Table holding the entries.
    pub table: String,
    /// Drop and recreate the table on open.
    pub reset: bool,
    /// Interval between expiry sweeps.
    pub gc_interval: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            database: None,
            busy_timeout: constants::DEFAULT_BUSY_TIMEOUT,
            connection_uri: None,
            connection: None,
            table: constants::DEFAULT_SQLITE_TABLE.to_string(),
            reset: false,
            gc_interval: constants::DEFAULT_GC_INTERVAL,
        }
    }
}

impl SqliteConfig {
    /// Connects to the database file at `path`.
    pub fn database<P: AsRef<Path>>(path: P) -> Self {
        Self {
            database: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Connects using a SQLite URI.
    pub fn uri(uri: impl Into<String>) -> Self {
        Self {
            connection_uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Uses an already-open connection.
    pub fn connection(connection: Connection) -> Self {
        Self {
            connection: Some(connection),
            ..Self::default()
        }
    }

    /// Uses a different table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Drops and recreates the table on open.
    #[must_use]
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Changes the sweep interval.
    #[must_use]
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = interval;
        self
    }

    /// Changes the busy timeout of structured connections.
    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Opens the one configured connection.
    fn connect(self) -> Result<Connection> {
        match (self.database, self.connection_uri, self.connection) {
            (Some(path), None, None) => {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        Error::io(format!("creating directory {}", parent.display()), e)
                    })?;
                }
                let conn = Connection::open(&path)?;
                conn.busy_timeout(self.busy_timeout)?;
                Ok(conn)
            },
            (None, Some(uri), None) => Ok(Connection::open_with_flags(
                uri,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?),
            (None, None, Some(conn)) => Ok(conn),
            (None, None, None) => Err(Error::config(
                "no sqlite connection method: set one of database, connection_uri or connection",
            )),
            (database, uri, conn) => {
                let supplied: Vec<&str> = [
                    database.is_some().then_some("database"),
                    uri.is_some().then_some("connection_uri"),
                    conn.is_some().then_some("connection"),
                ]
                .into_iter()
                .flatten()
                .collect();
                Err(Error::config(format!(
                    "ambiguous sqlite connection: {} are all set, expected exactly one",
                    supplied.join(", ")
                )))
            },
        }
    }
}

/// Returns true if `name` is safe to splice into SQL as a table name.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// SQL text for one table, built once per store.
#[derive(Debug)]
struct Statements {
    select: String,
    upsert: String,
    delete: String,
    reset: String,
    gc: String,
}

impl Statements {
    fn new(table: &str) -> Self {
        Self {
            select: format!("SELECT value, expires_at FROM {table} WHERE key = ?1"),
            upsert: format!(
                "INSERT INTO {table} (key, value, expires_at) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at"
            ),
            delete: format!("DELETE FROM {table} WHERE key = ?1"),
            reset: format!("DELETE FROM {table}"),
            gc: format!("DELETE FROM {table} WHERE expires_at <> 0 AND expires_at <= ?1"),
        }
    }
}

fn init_schema(conn: &Connection, table: &str, reset: bool) -> Result<()> {
    let drop = if reset {
        format!("DROP TABLE IF EXISTS {table};")
    } else {
        String::new()
    };
    conn.execute_batch(&format!(
        "BEGIN;
         {drop}
         CREATE TABLE IF NOT EXISTS {table} (
             key TEXT NOT NULL PRIMARY KEY,
             value BLOB NOT NULL,
             expires_at INTEGER NOT NULL DEFAULT 0
         );
         CREATE INDEX IF NOT EXISTS {table}_expires_at ON {table} (expires_at) WHERE expires_at <> 0;
         COMMIT;"
    ))?;
    Ok(())
}

/// Deletes every row whose marker is at or before `now`.
fn sweep(conn: &Mutex<Connection>, sql: &str, now: Marker) -> Result<usize> {
    let conn = conn.lock();
    let deleted = conn.prepare_cached(sql)?.execute(params![now.as_nanos()])?;
    Ok(deleted)
}

/// SQLite-backed storage backend with a background expiry sweeper.
///
/// # Thread Safety
///
/// `SqliteStorage` is `Clone` and can be shared across threads. All
/// statements, sweeps included, run one at a time on the shared connection
/// and hold it only for the duration of a single statement.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: SharedConnection,
    table: Arc<str>,
    sql: Arc<Statements>,
    sweeper: Arc<Sweeper>,
    lifecycle: Lifecycle,
}

impl SqliteStorage {
    /// Opens a store on the database file at `path` with default options.
    ///
    /// # Errors
    ///
    /// See [`SqliteStorage::with_config`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_config(SqliteConfig::database(path))
    }

    /// Connects, provisions the table, and starts the expiry sweeper.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Zero or several connection methods are configured
    /// - The table name is not a plain SQL identifier
    /// - The GC interval is zero
    /// - No tokio runtime is available
    /// - The connection or schema setup fails
    pub fn with_config(config: SqliteConfig) -> Result<Self> {
        if !is_identifier(&config.table) {
            return Err(Error::config(format!(
                "invalid sqlite table name '{}': use letters, digits and underscores",
                config.table
            )));
        }
        if config.gc_interval.is_zero() {
            return Err(Error::config("gc interval must be greater than zero"));
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::NoRuntime);
        }

        let table: Arc<str> = Arc::from(config.table.as_str());
        let reset = config.reset;
        let gc_interval = config.gc_interval;

        let conn = config.connect()?;
        init_schema(&conn, &table, reset)?;

        let conn = Arc::new(Mutex::new(conn));
        let sql = Arc::new(Statements::new(&table));

        let sweeper = {
            let conn = Arc::clone(&conn);
            let sql = Arc::clone(&sql);
            Sweeper::spawn(&table, gc_interval, move |now| sweep(&conn, &sql.gc, now))?
        };

        tracing::info!(
            table = %table,
            reset,
            gc_interval_ms = gc_interval.as_millis() as u64,
            "Opened sqlite storage"
        );

        Ok(Self {
            conn,
            table,
            sql,
            sweeper: Arc::new(sweeper),
            lifecycle: Lifecycle::default(),
        })
    }

    /// Runs one expiry sweep now and returns the number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the delete fails.
    pub async fn gc(&self) -> Result<usize> {
        self.gc_at(Marker::now()).await
    }

    /// Runs one expiry sweep treating `now` as the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the delete fails.
    pub async fn gc_at(&self, now: Marker) -> Result<usize> {
        let backend = self.clone();
        tokio::task::spawn_blocking(move || backend.gc_sync(now)).await?
    }

    fn gc_sync(&self, now: Marker) -> Result<usize> {
        self.lifecycle.ensure_open()?;
        sweep(&self.conn, &self.sql.gc, now)
    }

    fn get_sync(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.lifecycle.ensure_open()?;

        let row = {
            let conn = self.conn.lock();
            conn.prepare_cached(&self.sql.select)?
                .query_row(params![key], |row| {
                    Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?))
                })
                .optional()?
        };

        match row {
            Some((value, raw)) if !expiry::is_expired(Marker::from_stored(raw), Marker::now()) => {
                Ok(Some(value))
            },
            _ => Ok(None),
        }
    }

    fn set_sync(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.lifecycle.ensure_open()?;
        ensure_key(key)?;

        let expires_at = Marker::to_stored(expiry::encode(ttl));

        let conn = self.conn.lock();
        conn.prepare_cached(&self.sql.upsert)?
            .execute(params![key, value, expires_at])?;
        Ok(())
    }

    fn delete_sync(&self, key: &str) -> Result<()> {
        self.lifecycle.ensure_open()?;

        let conn = self.conn.lock();
        conn.prepare_cached(&self.sql.delete)?
            .execute(params![key])?;
        Ok(())
    }

    /// Closes the store's connection, leaving an in-memory one in its place.
    fn release_sync(&self) -> Result<()> {
        let detached = Connection::open_in_memory()?;
        let original = std::mem::replace(&mut *self.conn.lock(), detached);
        original.close().map_err(|(_, e)| Error::Sqlite(e))
    }

    fn reset_sync(&self) -> Result<()> {
        self.lifecycle.ensure_open()?;

        let deleted = {
            let conn = self.conn.lock();
            conn.execute(&self.sql.reset, [])?
        };
        tracing::debug!(table = %self.table, deleted, "Reset sqlite table");
        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    type Conn = SharedConnection;

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
        // Mark first so a failed close still leaves the store unusable.
        self.lifecycle.mark_closed()?;
        self.sweeper.stop().await;

        let backend = self.clone();
        tokio::task::spawn_blocking(move || backend.release_sync()).await??;

        tracing::info!(table = %self.table, "Closed sqlite storage");
        Ok(())
    }

    fn conn(&self) -> Self::Conn {
        Arc::clone(&self.conn)
    }
}
