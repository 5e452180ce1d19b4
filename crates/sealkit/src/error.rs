//! Error type for the sealkit façade.

use thiserror::Error;

use sealkit_core::{CoreError, DocumentId, GroupId, UserId};
use sealkit_document::DocumentError;
use sealkit_group::GroupError;
use sealkit_identity::IdentityError;
use sealkit_policy::PolicyError;
use sealkit_search::SearchError;
use sealkit_store::StoreError;

/// Errors surfaced by SDK operations.
///
/// `VersionConflict` is the only variant intended for local recovery: the
/// caller re-reads and retries. Partial failures are not errors at all;
/// batch operations carry per-item results in their success value.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Core error (validation, crypto, envelopes).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Identity error.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Group error.
    #[error(transparent)]
    Group(#[from] GroupError),

    /// Policy error.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Document error.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Search error.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A concurrent mutation committed first. Re-read the entity and
    /// retry.
    #[error("version conflict on {entity}: stored version is {current}")]
    VersionConflict {
        /// Which entity conflicted (e.g. "group eng-team").
        entity: String,
        /// The version currently stored.
        current: u64,
    },

    /// No such user.
    #[error("unknown user {0}")]
    UnknownUser(UserId),

    /// No such group.
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),

    /// No such document.
    #[error("unknown document {0}")]
    UnknownDocument(DocumentId),

    /// A store call exceeded the configured operation timeout. The
    /// outcome is ambiguous; the caller decides whether to re-read, never
    /// the SDK.
    #[error("operation timed out")]
    Timeout,
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;
