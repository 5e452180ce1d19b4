//! Sealing secrets to a recipient public key.
//!
//! A [`SealedKey`] carries a 32-byte secret encrypted so that only the
//! holder of the recipient's private key can recover it: ephemeral X25519
//! ECDH, a blake3-derived wrapping key, and ChaCha20-Poly1305. This is the
//! access-block primitive — group member key copies, document access
//! blocks, device copies of the user master key, and encrypted blind index
//! salts are all `SealedKey`s with different contexts.

use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptionPublicKey, EncryptionSecretKey, EphemeralKeyPair, Nonce};
use crate::error::{CoreError, Result};

/// A 32-byte secret sealed to a recipient public key.
///
/// The context passed to [`SealedKey::seal`] must be supplied again at
/// [`SealedKey::open`]; it domain-separates the wrapping key so a sealed
/// key cannot be replayed for a different entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    /// Ephemeral X25519 public key (sender's side of ECDH).
    pub ephemeral_public: EncryptionPublicKey,

    /// The secret, encrypted with the derived shared key.
    pub encrypted_key: Vec<u8>,

    /// Nonce used for encryption.
    pub nonce: Nonce,
}

impl SealedKey {
    /// Seal a 32-byte secret to the recipient.
    pub fn seal(
        secret: &[u8; 32],
        recipient_public: &EncryptionPublicKey,
        context: &[u8],
    ) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();

        let shared = ephemeral.diffie_hellman(recipient_public);
        let wrap_key = shared.derive_encryption_key(context);

        let nonce = Nonce::generate()?;
        let encrypted_key = wrap_key.encrypt(secret, &nonce)?;

        Ok(Self {
            ephemeral_public,
            encrypted_key,
            nonce,
        })
    }

    /// Recover the sealed secret using the recipient's secret key.
    pub fn open(&self, recipient_secret: &EncryptionSecretKey, context: &[u8]) -> Result<[u8; 32]> {
        let shared = recipient_secret.diffie_hellman(&self.ephemeral_public);
        let wrap_key = shared.derive_encryption_key(context);

        let key_bytes = wrap_key.decrypt(&self.encrypted_key, &self.nonce)?;
        if key_bytes.len() != 32 {
            return Err(CoreError::InvalidKeyLength {
                expected: 32,
                actual: key_bytes.len(),
            });
        }

        let mut arr = [0u8; 32];
        arr.copy_from_slice(&key_bytes);
        Ok(arr)
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
}
