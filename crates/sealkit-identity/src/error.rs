//! Error types for identity operations.

use thiserror::Error;

use sealkit_core::CoreError;

/// Errors that can occur during identity and device operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The caller does not hold the required key material (wrong
    /// passphrase, or a master secret that does not match the user).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A key rotation could not re-encrypt every dependent item; the
    /// previous key remains authoritative.
    #[error("key rotation aborted: {0}")]
    RotationAborted(String),

    /// Core error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;
