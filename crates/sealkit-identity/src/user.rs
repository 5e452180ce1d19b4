//! User accounts and master key material.

use serde::{Deserialize, Serialize};

use sealkit_core::{
    CoreError, EncryptedMasterKey, EncryptionKeyPair, EncryptionPublicKey, EncryptionSecretKey,
    UserId,
};

use crate::error::{IdentityError, Result};

/// Options that can be specified when creating a user.
#[derive(Debug, Clone, Default)]
pub struct UserCreateOpts {
    /// Whether the new user's key should be flagged for rotation on first
    /// use (set when an administrator pre-creates the account).
    pub needs_rotation: bool,
}

/// Stored state for one user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// The user's id.
    pub id: UserId,

    /// The user's master public key.
    pub public_key: EncryptionPublicKey,

    /// The master secret, wrapped under the user's passphrase.
    pub encrypted_master: EncryptedMasterKey,

    /// Whether the master key is flagged for rotation.
    pub needs_rotation: bool,

    /// When the account was created (Unix milliseconds).
    pub created: i64,

    /// When the account was last updated (Unix milliseconds).
    pub last_updated: i64,
}

/// Key material for a newly created user.
#[derive(Debug)]
pub struct UserCreateResult {
    /// The user's id.
    pub user_id: UserId,

    /// The user's master public key.
    pub user_public_key: EncryptionPublicKey,

    /// Whether the key is flagged for rotation.
    pub needs_rotation: bool,
}

/// Result of rotating a user's master private key.
#[derive(Debug)]
pub struct UserUpdatePrivateKeyResult {
    /// The user whose key was rotated.
    pub user_id: UserId,

    /// The new wrapped master key.
    pub encrypted_master: EncryptedMasterKey,

    /// Always false after a successful rotation.
    pub needs_rotation: bool,
}

/// Create a user: generate a master key pair and wrap the secret under the
/// passphrase.
///
/// Fails with [`CoreError::CryptoFailure`] if the OS RNG cannot supply
/// entropy.
pub fn create_user(
    id: UserId,
    passphrase: &str,
    opts: &UserCreateOpts,
    now: i64,
) -> Result<(UserRecord, UserCreateResult)> {
    let pair = EncryptionKeyPair::generate()?;
    let encrypted_master = EncryptedMasterKey::encrypt(&pair.secret.to_bytes(), passphrase)?;

    let record = UserRecord {
        id: id.clone(),
        public_key: pair.public,
        encrypted_master,
        needs_rotation: opts.needs_rotation,
        created: now,
        last_updated: now,
    };
    let result = UserCreateResult {
        user_id: id,
        user_public_key: pair.public,
        needs_rotation: opts.needs_rotation,
    };
    Ok((record, result))
}

/// Unlock a user's master secret with their passphrase.
///
/// A wrong passphrase is an [`IdentityError::AuthenticationFailed`], not a
/// corrupt-data error: the envelope is intact, the caller simply lacks the
/// key material.
pub fn unlock_master_key(record: &UserRecord, passphrase: &str) -> Result<EncryptionSecretKey> {
    let bytes = match record.encrypted_master.decrypt(passphrase) {
        Ok(bytes) => bytes,
        Err(CoreError::DecryptionFailed(_)) => {
            return Err(IdentityError::AuthenticationFailed(format!(
                "wrong passphrase for user {}",
                record.id
            )))
        }
        Err(e) => return Err(e.into()),
    };

    let secret = EncryptionSecretKey::from_bytes(bytes);
    if secret.public_key() != record.public_key {
        return Err(IdentityError::AuthenticationFailed(format!(
            "master key does not match user {}",
            record.id
        )));
    }
    Ok(secret)
}
