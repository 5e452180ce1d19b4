//! Cryptographic primitives.
//!
//! Wraps X25519 key agreement, Ed25519 signing, and ChaCha20-Poly1305
//! authenticated encryption with strong types. Key generation draws from
//! the operating system RNG fallibly, so entropy exhaustion surfaces as
//! [`CoreError::CryptoFailure`] instead of a panic.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305,
};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CoreError, Result};

/// Fill a fixed-size buffer from the OS RNG.
///
/// All secret material in sealkit is generated through this function so a
/// failing RNG is always a hard [`CoreError::CryptoFailure`].
pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CoreError::CryptoFailure(format!("os rng unavailable: {e}")))?;
    Ok(bytes)
}

// ─────────────────────────────────────────────────────────────────────────
// X25519 key agreement
// ─────────────────────────────────────────────────────────────────────────

/// An X25519 public key (32 bytes). Users, groups, and devices expose one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncryptionPublicKey(pub [u8; 32]);

impl EncryptionPublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn to_dalek(self) -> x25519_dalek::PublicKey {
        x25519_dalek::PublicKey::from(self.0)
    }
}

impl fmt::Debug for EncryptionPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncPub({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for EncryptionPublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An X25519 static secret key.
///
/// Never serialized in plaintext; persisted only inside an
/// [`crate::EncryptedMasterKey`] or [`crate::SealedKey`] envelope.
pub struct EncryptionSecretKey(x25519_dalek::StaticSecret);

impl EncryptionSecretKey {
    /// Generate a new random secret.
    pub fn generate() -> Result<Self> {
        let bytes: [u8; 32] = random_bytes()?;
        Ok(Self(x25519_dalek::StaticSecret::from(bytes)))
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(x25519_dalek::StaticSecret::from(bytes))
    }

    /// The raw secret bytes. Callers must only feed these into an
    /// encrypted envelope.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Derive the public key.
    pub fn public_key(&self) -> EncryptionPublicKey {
        EncryptionPublicKey(*x25519_dalek::PublicKey::from(&self.0).as_bytes())
    }

    /// Perform key agreement with a peer's public key.
    pub fn diffie_hellman(&self, peer_public: &EncryptionPublicKey) -> SharedKey {
        let shared = self.0.diffie_hellman(&peer_public.to_dalek());
        SharedKey(*shared.as_bytes())
    }
}

impl Clone for EncryptionSecretKey {
    fn clone(&self) -> Self {
        Self::from_bytes(self.to_bytes())
    }
}

impl fmt::Debug for EncryptionSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncSecret({:?})", self.public_key())
    }
}

/// An asymmetric encryption key pair.
#[derive(Debug)]
pub struct EncryptionKeyPair {
    /// The shareable half.
    pub public: EncryptionPublicKey,
    /// The secret half.
    pub secret: EncryptionSecretKey,
}

impl EncryptionKeyPair {
    /// Generate a fresh pair from the OS RNG.
    pub fn generate() -> Result<Self> {
        let secret = EncryptionSecretKey::generate()?;
        let public = secret.public_key();
        Ok(Self { public, secret })
    }
}

/// A shared secret derived from X25519 key agreement.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    /// Derive an encryption key from this shared secret for the given
    /// context. Contexts separate uses of the same agreement (per group,
    /// per document, per device).
    pub fn derive_encryption_key(&self, context: &[u8]) -> SymmetricKey {
        let mut hasher = blake3::Hasher::new_derive_key("sealkit-v1-seal");
        hasher.update(&self.0);
        hasher.update(context);
        SymmetricKey(*hasher.finalize().as_bytes())
    }
}

/// Ephemeral key pair for one-shot key agreement (sealing).
pub struct EphemeralKeyPair {
    secret: x25519_dalek::EphemeralSecret,
    public: EncryptionPublicKey,
}

impl EphemeralKeyPair {
    /// Generate a new ephemeral key pair.
    pub fn generate() -> Self {
        let secret = x25519_dalek::EphemeralSecret::random_from_rng(OsRng);
        let public = EncryptionPublicKey(*x25519_dalek::PublicKey::from(&secret).as_bytes());
        Self { secret, public }
    }

    /// Get the public key.
    pub fn public_key(&self) -> EncryptionPublicKey {
        self.public
    }

    /// Perform key agreement with a peer's public key.
    ///
    /// Consumes the ephemeral secret (can only be used once).
    pub fn diffie_hellman(self, peer_public: &EncryptionPublicKey) -> SharedKey {
        let shared = self.secret.diffie_hellman(&peer_public.to_dalek());
        SharedKey(*shared.as_bytes())
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Symmetric encryption
// ─────────────────────────────────────────────────────────────────────────

/// A 256-bit symmetric key for ChaCha20-Poly1305.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    /// Generate a new random key.
    pub fn generate() -> Result<Self> {
        Ok(Self(random_bytes()?))
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt data with this key.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &Nonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CoreError::EncryptionFailed(e.to_string()))?;
        cipher
            .encrypt(chacha20poly1305::Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| CoreError::EncryptionFailed(e.to_string()))
    }

    /// Decrypt data with this key. Fails when the authentication tag does
    /// not verify.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &Nonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CoreError::DecryptionFailed(e.to_string()))?;
        cipher
            .decrypt(chacha20poly1305::Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|_| CoreError::DecryptionFailed("authentication tag mismatch".into()))
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// A 96-bit ChaCha20-Poly1305 nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce(pub [u8; 12]);

impl Nonce {
    /// Generate a new random nonce.
    pub fn generate() -> Result<Self> {
        Ok(Self(random_bytes()?))
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Ed25519 signing
// ─────────────────────────────────────────────────────────────────────────

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigningPublicKey(pub [u8; 32]);

impl SigningPublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        let key = VerifyingKey::from_bytes(&self.0)
            .map_err(|_| CoreError::CryptoFailure("invalid signing public key".into()))?;
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify(message, &sig)
            .map_err(|_| CoreError::CryptoFailure("signature verification failed".into()))
    }
}

impl fmt::Debug for SigningPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignPub({})", &self.to_hex()[..16])
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sig({}...)", &self.to_hex()[..16])
    }
}

impl Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        struct SigVisitor;

        impl<'de> serde::de::Visitor<'de> for SigVisitor {
            type Value = Signature;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("64 signature bytes")
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> std::result::Result<Signature, E> {
                let arr: [u8; 64] = v
                    .try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(Signature(arr))
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Signature, A::Error> {
                let mut bytes = [0u8; 64];
                for (i, slot) in bytes.iter_mut().enumerate() {
                    *slot = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                }
                Ok(Signature(bytes))
            }
        }

        deserializer.deserialize_bytes(SigVisitor)
    }
}

/// An Ed25519 key pair for request signing.
#[derive(Clone)]
pub struct SigningKeyPair {
    signing_key: SigningKey,
}

impl SigningKeyPair {
    /// Generate a new random pair.
    pub fn generate() -> Result<Self> {
        let seed: [u8; 32] = random_bytes()?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> SigningPublicKey {
        SigningPublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    /// The raw seed bytes (secret key material).
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKeyPair({:?})", self.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_agreement_symmetric() {
        let alice = EncryptionKeyPair::generate().unwrap();
        let bob = EncryptionKeyPair::generate().unwrap();

        let a = alice.secret.diffie_hellman(&bob.public);
        let b = bob.secret.diffie_hellman(&alice.public);

        let ka = a.derive_encryption_key(b"ctx");
        let kb = b.derive_encryption_key(b"ctx");
        assert_eq!(ka.as_bytes(), kb.as_bytes());
    }

    #[test]
    fn test_derive_key_context_separated() {
        let shared = SharedKey([0x42; 32]);
        let k1 = shared.derive_encryption_key(b"context-a");
        let k2 = shared.derive_encryption_key(b"context-b");
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = SymmetricKey::generate().unwrap();
        let nonce = Nonce::generate().unwrap();
        let plaintext = b"attack at dawn";

        let ciphertext = key.encrypt(plaintext, &nonce).unwrap();
        assert_ne!(&ciphertext, plaintext);

        let decrypted = key.decrypt(&ciphertext, &nonce).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let key1 = SymmetricKey::generate().unwrap();
        let key2 = SymmetricKey::generate().unwrap();
        let nonce = Nonce::generate().unwrap();

        let ciphertext = key1.encrypt(b"secret", &nonce).unwrap();
        assert!(matches!(
            key2.decrypt(&ciphertext, &nonce),
            Err(CoreError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_sign_verify() {
        let pair = SigningKeyPair::generate().unwrap();
        let message = b"device add request";
        let signature = pair.sign(message);

        pair.public_key().verify(message, &signature).unwrap();
        assert!(pair.public_key().verify(b"tampered", &signature).is_err());
    }

    #[test]
    fn test_signing_deterministic_from_seed() {
        let seed = [7u8; 32];
        let p1 = SigningKeyPair::from_seed(&seed);
        let p2 = SigningKeyPair::from_seed(&seed);
        assert_eq!(p1.public_key(), p2.public_key());
    }

    #[test]
    fn test_secret_key_roundtrip() {
        let secret = EncryptionSecretKey::generate().unwrap();
        let restored = EncryptionSecretKey::from_bytes(secret.to_bytes());
        assert_eq!(secret.public_key(), restored.public_key());
    }

    #[test]
    fn test_signature_serde_roundtrip() {
        let pair = SigningKeyPair::generate().unwrap();
        let sig = pair.sign(b"msg");

        let mut buf = Vec::new();
        ciborium::into_writer(&sig, &mut buf).unwrap();
        let back: Signature = ciborium::from_reader(buf.as_slice()).unwrap();
        assert_eq!(sig, back);
    }
}
