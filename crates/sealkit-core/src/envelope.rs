//! Encrypted envelopes.
//!
//! [`EncryptedPayload`] wraps authenticated symmetric ciphertext with the
//! metadata needed to decrypt it. [`EncryptedMasterKey`] is the passphrase
//! envelope for a user's master secret: Argon2id derives the wrapping key,
//! and the salt travels with the ciphertext.

use serde::{Deserialize, Serialize};

use crate::crypto::{random_bytes, Nonce, SymmetricKey};
use crate::error::{CoreError, Result};

/// Format identifier for encrypted payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// ChaCha20-Poly1305 with 256-bit key.
    ChaCha20Poly1305 = 1,
}

/// An encrypted payload envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Encryption algorithm used.
    pub format: EncryptionFormat,

    /// Nonce used for encryption (unique per encryption).
    pub nonce: Nonce,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Encrypt plaintext with the given key.
    pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> Result<Self> {
        let nonce = Nonce::generate()?;
        let ciphertext = key.encrypt(plaintext, &nonce)?;

        Ok(Self {
            format: EncryptionFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt with the given key.
    pub fn decrypt(&self, key: &SymmetricKey) -> Result<Vec<u8>> {
        match self.format {
            EncryptionFormat::ChaCha20Poly1305 => key.decrypt(&self.ciphertext, &self.nonce),
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Get the size of the ciphertext.
    pub fn ciphertext_len(&self) -> usize {
        self.ciphertext.len()
    }
}

/// Derive a 32-byte wrapping key from a passphrase with Argon2id.
fn derive_passphrase_key(passphrase: &str, salt: &[u8; 16]) -> Result<SymmetricKey> {
    let mut out = [0u8; 32];
    argon2::Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut out)
        .map_err(|e| CoreError::KeyDerivationFailed(e.to_string()))?;
    Ok(SymmetricKey::from_bytes(out))
}

/// A private key encrypted under a passphrase-derived key.
///
/// The Argon2id salt is bundled with the ciphertext so the passphrase is
/// the only input needed for decryption. Destroyed together with the
/// owning user record on revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMasterKey {
    /// Argon2id salt.
    pub salt: [u8; 16],

    /// The wrapped 32-byte secret.
    pub payload: EncryptedPayload,
}

impl EncryptedMasterKey {
    /// Encrypt a 32-byte secret under the passphrase.
    pub fn encrypt(secret: &[u8; 32], passphrase: &str) -> Result<Self> {
        let salt: [u8; 16] = random_bytes()?;
        let key = derive_passphrase_key(passphrase, &salt)?;
        let payload = EncryptedPayload::encrypt(secret, &key)?;
        Ok(Self { salt, payload })
    }

    /// Decrypt the wrapped secret with the passphrase.
    ///
    /// A wrong passphrase fails the authentication tag and returns
    /// [`CoreError::DecryptionFailed`].
    pub fn decrypt(&self, passphrase: &str) -> Result<[u8; 32]> {
        let key = derive_passphrase_key(passphrase, &self.salt)?;
        let plaintext = self.payload.decrypt(&key)?;

        if plaintext.len() != 32 {
            return Err(CoreError::InvalidKeyLength {
                expected: 32,
                actual: plaintext.len(),
            });
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&plaintext);
        Ok(bytes)
    }
}
