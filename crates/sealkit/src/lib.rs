//! # Sealkit
//!
//! The unified API for sealkit: identity-based, policy-driven end-to-end
//! document encryption with group key management and blind index search.
//!
//! ## Overview
//!
//! - **Identity**: users own X25519 master keys; devices are provisioned
//!   with their own keys plus a sealed copy of the master key.
//! - **Groups**: shared encryption keys with one sealed copy per member;
//!   admins manage membership and rotation.
//! - **Documents**: encrypted once under a random content key, shared via
//!   per-recipient access blocks. Grant/revoke never re-encrypts the
//!   body.
//! - **Policy**: classification tuples resolve to recipient sets through
//!   a declarative rule set.
//! - **Search**: salted keyed-hash blind indexes give equality search
//!   over encrypted fields.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sealkit::{Sdk, SdkConfig};
//! use sealkit::core::{DeviceId, UserId};
//! use sealkit::identity::{DeviceCreateOpts, UserCreateOpts};
//! use sealkit::store::MemoryStore;
//!
//! async fn example() -> sealkit::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!
//!     let alice = UserId::new("alice")?;
//!     Sdk::create_user(&*store, alice.clone(), "passphrase", &UserCreateOpts::default()).await?;
//!     let (device, _) = Sdk::generate_device(
//!         &*store,
//!         &alice,
//!         "passphrase",
//!         DeviceId::new("laptop")?,
//!         &DeviceCreateOpts::default(),
//!     )
//!     .await?;
//!
//!     let sdk = Sdk::initialize(store, device, SdkConfig::default());
//!     let encrypted = sdk.encrypt_document(b"hello", &Default::default()).await?;
//!     let decrypted = sdk.decrypt_document(&encrypted.encrypted_data).await?;
//!     assert_eq!(&decrypted.decrypted_data[..], b"hello");
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! Group and document mutations use optimistic versioning. A losing
//! writer gets [`SdkError::VersionConflict`] and retries from a fresh
//! read; the SDK never retries internally, and never retries
//! ambiguous-outcome store failures at all.

pub mod error;
pub mod sdk;

// Re-export component crates
pub use sealkit_core as core;
pub use sealkit_document as document;
pub use sealkit_group as group;
pub use sealkit_identity as identity;
pub use sealkit_policy as policy;
pub use sealkit_search as search;
pub use sealkit_store as store;

// Re-export main types for convenience
pub use error::{Result, SdkError};
pub use sdk::{Sdk, SdkConfig, UserWithKey};

pub use sealkit_core::{
    DeviceId, DocumentId, EncryptionKeyPair, EncryptionPublicKey, GroupId, Recipient, UserId,
};
pub use sealkit_document::{DocumentEncryptOpts, DocumentName};
pub use sealkit_group::{GroupCreateOpts, GroupName};
pub use sealkit_identity::DeviceContext;
pub use sealkit_policy::{Classification, PolicyGrant, PolicyRule, PolicyRuleSet};
pub use sealkit_search::Tokenization;
pub use sealkit_store::MemoryStore;
