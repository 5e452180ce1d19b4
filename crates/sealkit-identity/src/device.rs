//! Device provisioning.
//!
//! A device never stores the user's master secret directly. Provisioning
//! generates a device-local X25519 pair plus an Ed25519 signing pair, and
//! seals the master secret to the device's public key. At runtime the
//! device opens its sealed copy on demand.

use serde::{Deserialize, Serialize};
use std::fmt;

use sealkit_core::{
    validate_label, CoreError, DeviceId, EncryptionKeyPair, EncryptionPublicKey,
    EncryptionSecretKey, SealedKey, Signature, SigningKeyPair, SigningPublicKey, UserId,
};

use crate::error::{IdentityError, Result};

/// Human-readable device name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceName(String);

impl DeviceName {
    /// Construct after validating the name.
    pub fn new(s: impl Into<String>) -> std::result::Result<Self, CoreError> {
        let s = s.into();
        validate_label("device name", &s)?;
        Ok(Self(s))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options to specify when provisioning a new device.
#[derive(Debug, Clone, Default)]
pub struct DeviceCreateOpts {
    /// Optional name for the device.
    pub device_name: Option<DeviceName>,
}

/// Stored state for one provisioned device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// The owning user.
    pub user_id: UserId,

    /// The device's id.
    pub device_id: DeviceId,

    /// Optional name.
    pub name: Option<DeviceName>,

    /// The device's encryption public key.
    pub encryption_public: EncryptionPublicKey,

    /// The user master secret, sealed to `encryption_public`.
    pub sealed_master: SealedKey,

    /// The device's request-signing public key.
    pub signing_public: SigningPublicKey,

    /// When the device was provisioned (Unix milliseconds).
    pub created: i64,

    /// When the device was last updated (Unix milliseconds).
    pub last_updated: i64,
}

/// Result of provisioning a device, signed by the device's signing key.
#[derive(Debug)]
pub struct DeviceAddResult {
    /// The owning user.
    pub user_id: UserId,

    /// The new device's id.
    pub device_id: DeviceId,

    /// Optional name.
    pub name: Option<DeviceName>,

    /// The device's request-signing public key.
    pub signing_public: SigningPublicKey,

    /// Signature over the provisioning message (user id, device id, and
    /// the device public keys).
    pub signature: Signature,

    /// When the device was provisioned (Unix milliseconds).
    pub created: i64,
}

/// An authenticated session identity.
///
/// Binds the device id, its keys, the owning user, and the sealed master
/// key copy. Immutable for the lifetime of the session.
pub struct DeviceContext {
    user_id: UserId,
    device_id: DeviceId,
    device_secret: EncryptionSecretKey,
    signing: SigningKeyPair,
    sealed_master: SealedKey,
}

impl DeviceContext {
    /// The owning user's id.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The device's id.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// The device's encryption public key.
    pub fn encryption_public(&self) -> EncryptionPublicKey {
        self.device_secret.public_key()
    }

    /// The device's request-signing public key.
    pub fn signing_public(&self) -> SigningPublicKey {
        self.signing.public_key()
    }

    /// Sign an outgoing request.
    pub fn sign_request(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }

    /// Open the sealed master key copy held by this device.
    pub fn master_secret(&self) -> Result<EncryptionSecretKey> {
        let bytes = self
            .sealed_master
            .open(&self.device_secret, self.user_id.as_bytes())
            .map_err(|e| {
                IdentityError::AuthenticationFailed(format!(
                    "device {} cannot unlock master key: {e}",
                    self.device_id
                ))
            })?;
        Ok(EncryptionSecretKey::from_bytes(bytes))
    }

    /// The same device identity with a replacement sealed master copy.
    /// Used after a master key rotation, which re-seals the new secret
    /// to every device.
    pub fn with_sealed_master(&self, sealed_master: SealedKey) -> Self {
        Self {
            user_id: self.user_id.clone(),
            device_id: self.device_id.clone(),
            device_secret: self.device_secret.clone(),
            signing: self.signing.clone(),
            sealed_master,
        }
    }

    /// Rebuild a context from its stored parts (e.g. a persisted device
    /// record plus locally held secrets).
    pub fn from_parts(
        user_id: UserId,
        device_id: DeviceId,
        device_secret: EncryptionSecretKey,
        signing: SigningKeyPair,
        sealed_master: SealedKey,
    ) -> Self {
        Self {
            user_id,
            device_id,
            device_secret,
            signing,
            sealed_master,
        }
    }
}

impl fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContext")
            .field("user_id", &self.user_id)
            .field("device_id", &self.device_id)
            .field("signing_public", &self.signing.public_key())
            .finish()
    }
}

/// Provision a device for a user.
///
/// The caller must already hold the user's decrypted master secret; a
/// secret that does not match `user_public` is rejected with
/// [`IdentityError::AuthenticationFailed`] before any key material is
/// generated.
pub fn provision_device(
    user_id: &UserId,
    master_secret: &EncryptionSecretKey,
    user_public: &EncryptionPublicKey,
    device_id: DeviceId,
    opts: &DeviceCreateOpts,
    now: i64,
) -> Result<(DeviceContext, DeviceRecord, DeviceAddResult)> {
    if master_secret.public_key() != *user_public {
        return Err(IdentityError::AuthenticationFailed(format!(
            "supplied master key does not match user {user_id}"
        )));
    }

    let device_pair = EncryptionKeyPair::generate()?;
    let signing = SigningKeyPair::generate()?;
    let sealed_master = SealedKey::seal(
        &master_secret.to_bytes(),
        &device_pair.public,
        user_id.as_bytes(),
    )?;

    let mut message = Vec::new();
    message.extend_from_slice(user_id.as_bytes());
    message.extend_from_slice(device_id.as_bytes());
    message.extend_from_slice(device_pair.public.as_bytes());
    message.extend_from_slice(signing.public_key().as_bytes());
    let signature = signing.sign(&message);

    let record = DeviceRecord {
        user_id: user_id.clone(),
        device_id: device_id.clone(),
        name: opts.device_name.clone(),
        encryption_public: device_pair.public,
        sealed_master: sealed_master.clone(),
        signing_public: signing.public_key(),
        created: now,
        last_updated: now,
    };
    let result = DeviceAddResult {
        user_id: user_id.clone(),
        device_id: device_id.clone(),
        name: opts.device_name.clone(),
        signing_public: signing.public_key(),
        signature,
        created: now,
    };
    let context = DeviceContext {
        user_id: user_id.clone(),
        device_id,
        device_secret: device_pair.secret,
        signing,
        sealed_master,
    };

    Ok((context, record, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::{create_user, unlock_master_key, UserCreateOpts};

    fn provisioned() -> (DeviceContext, DeviceRecord, DeviceAddResult) {
        let user_id = UserId::new("alice").unwrap();
        let (record, _) =
            create_user(user_id.clone(), "pw", &UserCreateOpts::default(), 0).unwrap();
        let master = unlock_master_key(&record, "pw").unwrap();

        provision_device(
            &user_id,
            &master,
            &record.public_key,
            DeviceId::new("laptop").unwrap(),
            &DeviceCreateOpts::default(),
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_device_can_unlock_master() {
        let user_id = UserId::new("alice").unwrap();
        let (record, _) =
            create_user(user_id.clone(), "pw", &UserCreateOpts::default(), 0).unwrap();
        let master = unlock_master_key(&record, "pw").unwrap();

        let (ctx, _, _) = provision_device(
            &user_id,
            &master,
            &record.public_key,
            DeviceId::new("laptop").unwrap(),
            &DeviceCreateOpts::default(),
            0,
        )
        .unwrap();

        let recovered = ctx.master_secret().unwrap();
        assert_eq!(recovered.public_key(), record.public_key);
    }

    #[test]
    fn test_wrong_master_rejected() {
        let user_id = UserId::new("alice").unwrap();
        let (record, _) =
            create_user(user_id.clone(), "pw", &UserCreateOpts::default(), 0).unwrap();
        let wrong = EncryptionKeyPair::generate().unwrap();

        let result = provision_device(
            &user_id,
            &wrong.secret,
            &record.public_key,
            DeviceId::new("laptop").unwrap(),
            &DeviceCreateOpts::default(),
            0,
        );
        assert!(matches!(
            result,
            Err(IdentityError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_add_result_signature_verifies() {
        let (ctx, record, result) = provisioned();

        let mut message = Vec::new();
        message.extend_from_slice(result.user_id.as_bytes());
        message.extend_from_slice(result.device_id.as_bytes());
        message.extend_from_slice(record.encryption_public.as_bytes());
        message.extend_from_slice(result.signing_public.as_bytes());

        result
            .signing_public
            .verify(&message, &result.signature)
            .unwrap();
        assert_eq!(ctx.signing_public(), result.signing_public);
    }

    #[test]
    fn test_device_name_validation() {
        assert!(DeviceName::new("Work Laptop").is_ok());
        assert!(DeviceName::new("").is_err());
    }
}
