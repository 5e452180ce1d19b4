//! Error types for the store.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert of an entity whose id already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Backend failure, including ambiguous outcomes (e.g. a lost commit
    /// confirmation). Never retried automatically.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
