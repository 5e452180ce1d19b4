//! Error types for blind index search.

use thiserror::Error;

use sealkit_core::CoreError;
use sealkit_document::DocumentError;

/// Errors that can occur during blind index operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The encrypted salt could not be opened by the caller.
    #[error("cannot unlock blind index salt: {0}")]
    SaltUnavailable(String),

    /// Core error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Document-layer error while sealing or opening the salt.
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Result type for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
