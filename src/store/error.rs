//! Document store error types

use thiserror::Error;

/// Errors that can occur in a document store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite backend failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A document with this key already exists in the collection
    #[error("Duplicate key in {collection}: {key}")]
    DuplicateKey {
        collection: &'static str,
        key: String,
    },

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),

    /// Store handle was released
    #[error("Store is closed")]
    Closed,

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
