//! # Sealkit Identity
//!
//! User master key lifecycle and device provisioning.
//!
//! ## Key Model
//!
//! Every user owns one X25519 master key pair. The secret half exists in
//! exactly two encrypted forms:
//!
//! 1. Wrapped under an Argon2id passphrase-derived key in the user record
//! 2. Sealed to each provisioned device's own encryption key
//!
//! A [`DeviceContext`] is the product of provisioning: it binds the device
//! id, the owning user, the device's encryption secret, an Ed25519 request
//! signing pair, and the sealed master key copy. It is immutable for the
//! lifetime of an authenticated session.
//!
//! Key rotation is all-or-nothing: [`rotate_master_key`] re-seals every
//! dependent sealed key in memory first and aborts without side effects if
//! any single re-seal fails.

pub mod device;
pub mod error;
pub mod rotation;
pub mod user;

pub use device::{provision_device, DeviceAddResult, DeviceContext, DeviceCreateOpts, DeviceName, DeviceRecord};
pub use error::{IdentityError, Result};
pub use rotation::{rotate_master_key, MasterKeyRotation, SealedItem};
pub use user::{
    create_user, unlock_master_key, UserCreateOpts, UserCreateResult, UserRecord,
    UserUpdatePrivateKeyResult,
};
