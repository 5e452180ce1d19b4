//! Error types for policy evaluation.

use thiserror::Error;

use sealkit_core::CoreError;

/// Errors that can occur during policy evaluation.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Neither the policy nor the explicit lists produced any recipient.
    /// A document must have at least one access block.
    #[error("no recipients: policy resolution and explicit grants are both empty")]
    NoRecipients,

    /// Core error (label validation).
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
