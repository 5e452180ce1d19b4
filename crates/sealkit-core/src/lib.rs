//! # Sealkit Core
//!
//! Pure primitives for sealkit: identifiers, key types, and the envelope
//! formats everything else is built from.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`UserId`] / [`GroupId`] / [`DeviceId`] / [`DocumentId`] - validated identifiers
//! - [`EncryptionKeyPair`] - X25519 key agreement pair (users, groups)
//! - [`SigningKeyPair`] - Ed25519 signing pair (devices)
//! - [`SealedKey`] - a 32-byte secret sealed to a recipient public key
//! - [`EncryptedPayload`] - authenticated symmetric envelope
//! - [`EncryptedMasterKey`] - passphrase-protected private key envelope

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod sealed;
pub mod types;

pub use crypto::{
    random_bytes, EncryptionKeyPair, EncryptionPublicKey, EncryptionSecretKey, EphemeralKeyPair,
    Nonce, SharedKey, Signature, SigningKeyPair, SigningPublicKey, SymmetricKey,
};
pub use envelope::{EncryptedMasterKey, EncryptedPayload, EncryptionFormat};
pub use error::CoreError;
pub use sealed::SealedKey;
pub use types::{validate_label, DeviceId, DocumentId, GroupId, Recipient, UserId};
