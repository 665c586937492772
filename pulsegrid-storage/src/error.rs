//! Error types for the storage layer.

use thiserror::Error;

/// Errors surfaced by storage operations.
///
/// Pool exhaustion and query failures are kept as distinct variants so the
/// API layer can map both onto a retryable 503 while logging the cause.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to acquire a connection from the pool.
    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A query failed at the database.
    #[error("database query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Failed to build the pool at startup.
    #[error("failed to create connection pool: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    /// A stored document failed to (de)serialize.
    #[error("stored document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value violated an internal invariant (e.g. unknown status).
    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    /// The backend refused the operation (shutdown, injected fault).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
