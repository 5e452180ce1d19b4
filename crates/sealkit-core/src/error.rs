//! Error types for sealkit core primitives.

use thiserror::Error;

/// Errors from core primitive operations.
///
/// `CryptoFailure` is reserved for RNG or primitive failures and is never
/// downgraded to a softer variant by callers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An identifier failed validation at construction time.
    #[error("invalid {kind}: {reason}")]
    InvalidId {
        /// Which identifier type was being constructed.
        kind: &'static str,
        /// Why validation rejected it.
        reason: String,
    },

    /// The system RNG could not supply entropy, or a primitive failed.
    #[error("cryptographic failure: {0}")]
    CryptoFailure(String),

    /// Encryption failed (malformed key material or cipher error).
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed: wrong key or the ciphertext failed its
    /// integrity check.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Key material had an unexpected length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Key derivation (passphrase KDF) failed.
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// CBOR encoding/decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
