//! Access blocks: the content key, sealed per recipient.

use serde::{Deserialize, Serialize};

use sealkit_core::{CoreError, Recipient, SealedKey};

/// One access block: the document content key sealed for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessBlock {
    /// Who can open this block.
    pub recipient: Recipient,

    /// The sealed content key.
    pub sealed_key: SealedKey,
}

/// A serializable set of access blocks (EDEKs), produced by unmanaged
/// encryption and consumed by unmanaged decryption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedDeks {
    /// The blocks, one per recipient.
    pub blocks: Vec<AccessBlock>,
}

impl EncryptedDeks {
    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Find the block for a recipient.
    pub fn find(&self, recipient: &Recipient) -> Option<&AccessBlock> {
        self.blocks.iter().find(|b| &b.recipient == recipient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealkit_core::{EncryptionKeyPair, GroupId, UserId};

    #[test]
    fn test_deks_roundtrip() {
        let pair = EncryptionKeyPair::generate().unwrap();
        let deks = EncryptedDeks {
            blocks: vec![
                AccessBlock {
                    recipient: Recipient::User(UserId::new("alice").unwrap()),
                    sealed_key: SealedKey::seal(&[1u8; 32], &pair.public, b"doc").unwrap(),
                },
                AccessBlock {
                    recipient: Recipient::Group(GroupId::new("team").unwrap()),
                    sealed_key: SealedKey::seal(&[1u8; 32], &pair.public, b"doc").unwrap(),
                },
            ],
        };

        let bytes = deks.to_bytes().unwrap();
        let recovered = EncryptedDeks::from_bytes(&bytes).unwrap();
        assert_eq!(deks, recovered);

        let alice = Recipient::User(UserId::new("alice").unwrap());
        assert!(recovered.find(&alice).is_some());
        let bob = Recipient::User(UserId::new("bob").unwrap());
        assert!(recovered.find(&bob).is_none());
    }
}
