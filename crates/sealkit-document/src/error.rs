//! Error types for document operations.

use thiserror::Error;

use sealkit_core::CoreError;

/// Errors that can occur during document operations.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// No access block for the document is reachable from the caller's
    /// identity or group memberships.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// A reachable access block or the document body failed its
    /// integrity check.
    #[error("corrupt data: {0}")]
    CorruptData(String),

    /// The bytes are not an encrypted document (bad magic, truncated, or
    /// unsupported format version).
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// Encryption produced no access block at all.
    #[error("no recipients: a document needs at least one access block")]
    NoRecipients,

    /// Core error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;
