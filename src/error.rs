//! Error types for storage operations.
//!
//! Absence is never an error: missing, expired and evicted keys all come
//! back as `Ok(None)`. Everything here is either a misconfiguration caught
//! at construction time or a failure of the underlying engine.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid construction options (no connection method, bad table name, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// Keys must be non-empty.
    #[error("key must not be empty")]
    EmptyKey,

    /// The store was closed; no further operations are valid.
    #[error("store is closed")]
    Closed,

    /// The SQLite backend needs a tokio runtime to run its GC task.
    #[error("no tokio runtime available to run the expiry sweeper")]
    NoRuntime,

    /// A stored redb entry is too short to carry its expiration header.
    #[error("corrupt entry for key '{key}': {len} bytes, expected at least 8")]
    CorruptEntry { key: String, len: usize },

    /// redb failure (open, transaction, table, storage or commit).
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    /// SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A blocking engine call panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Create a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns true if the error means the store was already closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

// redb splits its failures into one type per phase; all of them fold into
// `redb::Error`.
macro_rules! from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Error {
                fn from(err: $ty) -> Self {
                    Self::Redb(err.into())
                }
            }
        )*
    };
}

from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_is_detectable() {
        assert!(Error::Closed.is_closed());
        assert!(!Error::EmptyKey.is_closed());
    }

    #[test]
    fn test_config_message() {
        let err = Error::config("no connection method supplied");
        assert_eq!(
            err.to_string(),
            "configuration error: no connection method supplied"
        );
    }

    #[test]
    fn test_corrupt_entry_message() {
        let err = Error::CorruptEntry {
            key: "john".to_string(),
            len: 3,
        };
        assert!(err.to_string().contains("'john'"));
        assert!(err.to_string().contains("3 bytes"));
    }
}
