//! Error types for group operations.

use thiserror::Error;

use sealkit_core::{CoreError, GroupId, UserId};

/// Errors that can occur during group operations.
#[derive(Debug, Error)]
pub enum GroupError {
    /// The requested change would leave the group in an invalid state
    /// (no admins, deleted group, contradictory create options).
    #[error("invalid group state: {0}")]
    InvalidGroupState(String),

    /// The acting user is not an admin of the group.
    #[error("user {user} is not an admin of group {group}")]
    NotAdmin { user: UserId, group: GroupId },

    /// The acting user is not a member of the group.
    #[error("user {user} is not a member of group {group}")]
    NotMember { user: UserId, group: GroupId },

    /// A referenced user has no known public key.
    #[error("user {0} has no known public key")]
    UnknownUser(UserId),

    /// Core error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for group operations.
pub type Result<T> = std::result::Result<T, GroupError>;
