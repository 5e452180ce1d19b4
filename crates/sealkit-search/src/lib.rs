//! # Sealkit Search
//!
//! Blind index search: equality search over encrypted fields without
//! revealing plaintext to the index store.
//!
//! ## Model
//!
//! A search index is keyed by a random 32-byte salt. Field values are
//! normalized, tokenized (exact or n-gram), and each token is hashed with
//! a salt-keyed hash into a `u32` index token. The same
//! tokenization+hash runs on both the indexing side
//! ([`BlindIndexSearch::tokenize_data`]) and the query side
//! ([`BlindIndexSearch::tokenize_query`]), so equality search works on
//! hashes alone. `tokenize_data` additionally mixes in random decoy
//! tokens; for any value, the query tokens are a subset of the data
//! tokens.
//!
//! The salt itself is stored as an [`EncryptedBlindIndexSalt`] — sealed
//! to a group exactly like an unmanaged document key — so the index is
//! useless to a store operator without decryption rights.

pub mod error;
pub mod index;
pub mod tokenize;

pub use error::{Result, SearchError};
pub use index::{
    create_blind_index, initialize_search, BlindIndexSalt, BlindIndexSearch,
    EncryptedBlindIndexSalt,
};
pub use tokenize::Tokenization;
