//! # Sealkit Group
//!
//! Group key management.
//!
//! ## Key Model
//!
//! Every group owns one X25519 encryption key pair. The secret half is
//! never stored directly: each member holds a copy sealed to their own
//! master public key, and by construction every copy opens to the same
//! group secret. Admins are always members, so any admin can recover the
//! group secret in order to seal it for new members.
//!
//! ## Guarantees and non-guarantees
//!
//! - At least one admin exists at all times; removing the last admin is
//!   rejected.
//! - Removing a member deletes their sealed copy and flags the group as
//!   `needs_rotation`. It does NOT rotate the group key: a removed member
//!   who cached the secret retains historical access until an explicit
//!   [`Group::rotate_key`]. This mirrors the weaker guarantee of
//!   re-encryption-based group schemes and is intentional.
//! - Membership edits are batch operations with per-user partial success.

pub mod edit;
pub mod error;
pub mod group;
pub mod rotate;

pub use edit::{GroupAccessEditErr, GroupAccessEditResult};
pub use error::{GroupError, Result};
pub use group::{Group, GroupCreateOpts, GroupLifecycle, GroupMeta, GroupName};
pub use rotate::GroupKeyRotationResult;
