//! # Sealkit Document
//!
//! The document transform engine.
//!
//! ## Encryption Model
//!
//! A document is encrypted exactly once under a fresh random content key
//! (ChaCha20-Poly1305). The content key is then sealed per recipient into
//! "access blocks": one [`sealkit_core::SealedKey`] per user or group.
//! Granting or revoking access touches only access blocks — O(1) per
//! recipient change, with the document body untouched.
//!
//! Every access block opens to the identical content key. Decryption
//! locates a block reachable from the caller (their own user block, or a
//! block for a group they belong to), opens it, and decrypts the body.
//! "No reachable block" ([`DocumentError::AccessDenied`]) is distinct
//! from "reachable block or body failed its integrity check"
//! ([`DocumentError::CorruptData`]).
//!
//! The unmanaged variant returns the sealed blocks (EDEKs) to the caller
//! instead of persisting them; key distribution becomes the caller's
//! problem.

pub mod access;
pub mod engine;
pub mod error;
pub mod header;
pub mod record;

pub use access::{AccessBlock, EncryptedDeks};
pub use engine::{
    encrypt_for_recipients, generate_document_id, open_reachable_block, EncryptOutcome,
    SealFailure,
};
pub use error::{DocumentError, Result};
pub use header::{document_id_from_bytes, DocumentHeader, DOCUMENT_FORMAT_VERSION, DOCUMENT_MAGIC};
pub use record::{
    AccessChange, AccessError, DocumentAccessResult, DocumentAssociation, DocumentDecryptResult,
    DocumentDecryptUnmanagedResult, DocumentEncryptOpts, DocumentEncryptResult,
    DocumentEncryptUnmanagedResult, DocumentListMeta, DocumentMetadataResult, DocumentName,
    DocumentRecord,
};
