//! Default values shared by the backends, the config loader and the CLI.

use std::time::Duration;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "ttlkv.toml";

/// Environment variable overriding the base data directory.
pub const HOME_ENV: &str = "TTLKV_HOME";

/// Default redb table name.
pub const DEFAULT_REDB_TABLE: &str = "kv";

/// Default redb database file name inside the data directory.
pub const DEFAULT_REDB_FILE: &str = "kv.redb";

/// Default SQLite table name.
pub const DEFAULT_SQLITE_TABLE: &str = "kv_store";

/// Default SQLite database file name inside the data directory.
pub const DEFAULT_SQLITE_FILE: &str = "kv.sqlite";

/// Default interval between expiry sweeps on the SQLite backend.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(10);

/// GC intervals below this are accepted but flagged as wasteful.
pub const MIN_RECOMMENDED_GC_INTERVAL: Duration = Duration::from_secs(1);

/// Default SQLite busy timeout for structured connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default byte budget of the in-memory cache (1 GiB).
pub const DEFAULT_MEMORY_CAPACITY: u64 = 1 << 30;
