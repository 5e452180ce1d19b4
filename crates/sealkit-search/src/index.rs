//! Blind index creation and token generation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use sealkit_core::{
    random_bytes, EncryptedPayload, EncryptionPublicKey, EncryptionSecretKey, GroupId, Recipient,
    SealedKey, SymmetricKey,
};
use sealkit_document::{AccessBlock, EncryptedDeks};

use crate::error::{Result, SearchError};
use crate::tokenize::Tokenization;

/// The per-index secret used to key the token hash.
#[derive(Clone)]
pub struct BlindIndexSalt([u8; 32]);

impl BlindIndexSalt {
    /// Generate a fresh random salt.
    pub fn generate() -> Result<Self> {
        Ok(Self(random_bytes()?))
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for BlindIndexSalt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BlindIndexSalt(..)")
    }
}

/// A blind index salt, sealed to a group the same way an unmanaged
/// document key is sealed: EDEKs plus the salt encrypted under the key
/// they wrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlindIndexSalt {
    /// Serialized access blocks for the wrapping key.
    pub encrypted_deks: Vec<u8>,

    /// The salt, encrypted under the wrapped key.
    pub encrypted_salt_bytes: Vec<u8>,
}

/// Create a blind index and seal its salt to the given group.
pub fn create_blind_index(
    group_id: &GroupId,
    group_public: &EncryptionPublicKey,
) -> Result<EncryptedBlindIndexSalt> {
    let salt = BlindIndexSalt::generate()?;
    let wrap_key = SymmetricKey::generate()?;

    let encrypted_salt = EncryptedPayload::encrypt(&salt.0, &wrap_key)?;
    let deks = EncryptedDeks {
        blocks: vec![AccessBlock {
            recipient: Recipient::Group(group_id.clone()),
            sealed_key: SealedKey::seal(wrap_key.as_bytes(), group_public, group_id.as_bytes())?,
        }],
    };

    Ok(EncryptedBlindIndexSalt {
        encrypted_deks: deks.to_bytes()?,
        encrypted_salt_bytes: encrypted_salt.to_bytes()?,
    })
}

/// Unlock an encrypted salt with the group secret and initialize search.
pub fn initialize_search(
    encrypted: &EncryptedBlindIndexSalt,
    group_id: &GroupId,
    group_secret: &EncryptionSecretKey,
    tokenization: Tokenization,
) -> Result<BlindIndexSearch> {
    let deks = EncryptedDeks::from_bytes(&encrypted.encrypted_deks)?;
    let recipient = Recipient::Group(group_id.clone());
    let block = deks.find(&recipient).ok_or_else(|| {
        SearchError::SaltUnavailable(format!("salt is not sealed to group {group_id}"))
    })?;

    let wrap_key = SymmetricKey::from_bytes(
        block
            .sealed_key
            .open(group_secret, group_id.as_bytes())
            .map_err(|e| SearchError::SaltUnavailable(e.to_string()))?,
    );

    let payload = EncryptedPayload::from_bytes(&encrypted.encrypted_salt_bytes)?;
    let salt_bytes = payload
        .decrypt(&wrap_key)
        .map_err(|e| SearchError::SaltUnavailable(e.to_string()))?;
    let salt_bytes: [u8; 32] = salt_bytes
        .as_slice()
        .try_into()
        .map_err(|_| SearchError::SaltUnavailable("salt has the wrong length".into()))?;

    Ok(BlindIndexSearch {
        salt: BlindIndexSalt::from_bytes(salt_bytes),
        tokenization,
    })
}

/// An initialized blind index: the unlocked salt plus a tokenization
/// strategy.
#[derive(Debug)]
pub struct BlindIndexSearch {
    salt: BlindIndexSalt,
    tokenization: Tokenization,
}

impl BlindIndexSearch {
    /// Build directly from an unlocked salt. Prefer
    /// [`initialize_search`] when the salt is still sealed.
    pub fn from_salt(salt: BlindIndexSalt, tokenization: Tokenization) -> Self {
        Self { salt, tokenization }
    }

    /// Generate the tokens to store in the index for a field value.
    ///
    /// Includes random decoy tokens so an index observer cannot count the
    /// real tokens of a value. [`BlindIndexSearch::tokenize_query`] on
    /// the same value always returns a subset of this.
    pub fn tokenize_data(&self, value: &str, partition: Option<&str>) -> Vec<u32> {
        let mut tokens: BTreeSet<u32> = self.hashed_tokens(value, partition);

        let mut rng = rand::thread_rng();
        let decoys = tokens.len() / 2 + 1;
        for _ in 0..decoys {
            tokens.insert(rng.gen());
        }

        tokens.into_iter().collect()
    }

    /// Generate the tokens to query the index for a field value.
    pub fn tokenize_query(&self, value: &str, partition: Option<&str>) -> Vec<u32> {
        self.hashed_tokens(value, partition).into_iter().collect()
    }

    fn hashed_tokens(&self, value: &str, partition: Option<&str>) -> BTreeSet<u32> {
        self.tokenization
            .tokenize(value)
            .into_iter()
            .map(|token| self.hash_token(&token, partition))
            .collect()
    }

    /// Salt-keyed hash of one token. Fields are length-prefixed so
    /// (partition, token) pairs cannot collide across boundaries.
    fn hash_token(&self, token: &str, partition: Option<&str>) -> u32 {
        let mut hasher = blake3::Hasher::new_derive_key("sealkit-v1-blind-index");
        hasher.update(&self.salt.0);

        let partition = partition.unwrap_or("");
        hasher.update(&(partition.len() as u32).to_le_bytes());
        hasher.update(partition.as_bytes());
        hasher.update(&(token.len() as u32).to_le_bytes());
        hasher.update(token.as_bytes());

        let digest = hasher.finalize();
        u32::from_le_bytes(digest.as_bytes()[..4].try_into().expect("4 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealkit_core::EncryptionKeyPair;

    fn search() -> BlindIndexSearch {
        BlindIndexSearch {
            salt: BlindIndexSalt::from_bytes([0x42; 32]),
            tokenization: Tokenization::Exact,
        }
    }

    #[test]
    fn test_query_subset_of_data() {
        let s = search();
        for value in ["Ada Lovelace", "grace HOPPER", "x"] {
            let data = s.tokenize_data(value, None);
            let query = s.tokenize_query(value, None);
            assert!(query.iter().all(|t| data.contains(t)), "value {value:?}");
        }
    }

    #[test]
    fn test_data_includes_decoys() {
        let s = search();
        let data = s.tokenize_data("ada", None);
        let query = s.tokenize_query("ada", None);
        assert!(data.len() > query.len());
    }

    #[test]
    fn test_query_deterministic() {
        let s = search();
        assert_eq!(
            s.tokenize_query("Ada Lovelace", Some("patients")),
            s.tokenize_query("ada  lovelace", Some("patients")),
        );
    }

    #[test]
    fn test_partition_changes_tokens() {
        let s = search();
        assert_ne!(
            s.tokenize_query("ada", Some("patients")),
            s.tokenize_query("ada", Some("staff")),
        );
        assert_ne!(s.tokenize_query("ada", None), s.tokenize_query("ada", Some("a")));
    }

    #[test]
    fn test_different_salts_differ() {
        let s1 = search();
        let s2 = BlindIndexSearch {
            salt: BlindIndexSalt::from_bytes([0x43; 32]),
            tokenization: Tokenization::Exact,
        };
        assert_ne!(s1.tokenize_query("ada", None), s2.tokenize_query("ada", None));
    }

    #[test]
    fn test_create_and_initialize_roundtrip() {
        let group_id = GroupId::new("team").unwrap();
        let group_pair = EncryptionKeyPair::generate().unwrap();

        let encrypted = create_blind_index(&group_id, &group_pair.public).unwrap();
        let search = initialize_search(
            &encrypted,
            &group_id,
            &group_pair.secret,
            Tokenization::Exact,
        )
        .unwrap();

        // Tokens are stable across re-initialization of the same salt.
        let again = initialize_search(
            &encrypted,
            &group_id,
            &group_pair.secret,
            Tokenization::Exact,
        )
        .unwrap();
        assert_eq!(
            search.tokenize_query("ada", None),
            again.tokenize_query("ada", None)
        );
    }

    #[test]
    fn test_initialize_wrong_group_fails() {
        let group_id = GroupId::new("team").unwrap();
        let other_id = GroupId::new("other").unwrap();
        let group_pair = EncryptionKeyPair::generate().unwrap();

        let encrypted = create_blind_index(&group_id, &group_pair.public).unwrap();
        let result = initialize_search(
            &encrypted,
            &other_id,
            &group_pair.secret,
            Tokenization::Exact,
        );
        assert!(matches!(result, Err(SearchError::SaltUnavailable(_))));
    }

    #[test]
    fn test_ngram_query_matches_substring_entry() {
        let tokenization = Tokenization::NGram { size: 3 };
        let s = BlindIndexSearch {
            salt: BlindIndexSalt::from_bytes([0x42; 32]),
            tokenization,
        };

        let data = s.tokenize_data("lovelace", None);
        // A trigram of the indexed word is among the query tokens for the
        // full word, so substring queries intersect.
        let query = s.tokenize_query("love", None);
        assert!(query.iter().any(|t| data.contains(t)));
    }
}
