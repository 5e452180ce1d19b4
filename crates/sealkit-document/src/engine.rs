//! Content key generation, sealing, and recovery.
//!
//! These are the pure flows of the transform engine: the façade supplies
//! recipient public keys and unlocked secrets, and this module never
//! performs I/O.

use bytes::Bytes;
use std::collections::BTreeMap;

use sealkit_core::{
    random_bytes, DocumentId, EncryptedPayload, EncryptionPublicKey, EncryptionSecretKey,
    Recipient, SealedKey, SymmetricKey,
};

use crate::error::{DocumentError, Result};
use crate::header::DocumentHeader;
use crate::record::{AccessError, DocumentAccessResult, DocumentRecord};

/// A per-recipient sealing failure during encryption.
#[derive(Debug, Clone)]
pub struct SealFailure {
    /// The recipient that could not be sealed for.
    pub recipient: Recipient,
    /// Why.
    pub error: String,
}

/// Everything produced by one encryption pass.
///
/// The content key is included so the caller can decide its fate: the
/// managed path drops it after persisting the blocks, the unmanaged path
/// returns the blocks (and only the blocks) to the caller.
pub struct EncryptOutcome {
    /// The wire header.
    pub header: DocumentHeader,
    /// Encrypted document in wire format.
    pub encrypted_data: Bytes,
    /// The raw content key. Never persisted.
    pub content_key: SymmetricKey,
    /// Access blocks for every successfully sealed recipient.
    pub blocks: BTreeMap<Recipient, SealedKey>,
    /// Recipients in `blocks`, in grant order.
    pub granted: Vec<Recipient>,
    /// Recipients that could not be sealed for.
    pub failed: Vec<SealFailure>,
}

/// Generate a random document id (32 hex characters).
pub fn generate_document_id() -> Result<DocumentId> {
    let bytes: [u8; 16] = random_bytes()?;
    Ok(DocumentId::new(hex::encode(bytes)).expect("hex ids are always valid"))
}

/// Encrypt a document for a resolved recipient set.
///
/// Generates a fresh content key, encrypts the plaintext once, and seals
/// the key per recipient. A recipient without a public key (or whose seal
/// fails) is reported in `failed`; encryption succeeds as long as at
/// least one block was produced, otherwise the whole operation fails with
/// [`DocumentError::NoRecipients`].
pub fn encrypt_for_recipients(
    plaintext: &[u8],
    id: DocumentId,
    recipients: &[(Recipient, Option<EncryptionPublicKey>)],
    now: i64,
) -> Result<EncryptOutcome> {
    let content_key = SymmetricKey::generate()?;
    let payload = EncryptedPayload::encrypt(plaintext, &content_key)?;

    let mut blocks = BTreeMap::new();
    let mut granted = Vec::new();
    let mut failed = Vec::new();

    for (recipient, public) in recipients {
        if blocks.contains_key(recipient) {
            continue;
        }
        let outcome = match public {
            Some(public) => {
                SealedKey::seal(content_key.as_bytes(), public, id.as_bytes())
                    .map_err(|e| e.to_string())
            }
            None => Err("recipient has no known public key".to_string()),
        };
        match outcome {
            Ok(sealed) => {
                blocks.insert(recipient.clone(), sealed);
                granted.push(recipient.clone());
            }
            Err(error) => failed.push(SealFailure {
                recipient: recipient.clone(),
                error,
            }),
        }
    }

    if blocks.is_empty() {
        return Err(DocumentError::NoRecipients);
    }

    let header = DocumentHeader { id, created: now };
    let encrypted_data = Bytes::from(header.encode(&payload)?);

    Ok(EncryptOutcome {
        header,
        encrypted_data,
        content_key,
        blocks,
        granted,
        failed,
    })
}

/// Open the first reachable access block.
///
/// `candidates` pairs each block reachable from the caller with the
/// secret that should open it: the caller's master secret for their user
/// block, an unlocked group secret for a group block.
///
/// No candidates at all is [`DocumentError::AccessDenied`]; candidates
/// that all fail their integrity check is [`DocumentError::CorruptData`].
pub fn open_reachable_block<'a>(
    doc_id: &DocumentId,
    candidates: impl IntoIterator<Item = (&'a Recipient, &'a SealedKey, &'a EncryptionSecretKey)>,
) -> Result<(Recipient, SymmetricKey)> {
    let mut any = false;
    for (recipient, sealed, secret) in candidates {
        any = true;
        if let Ok(bytes) = sealed.open(secret, doc_id.as_bytes()) {
            return Ok((recipient.clone(), SymmetricKey::from_bytes(bytes)));
        }
    }

    if any {
        Err(DocumentError::CorruptData(format!(
            "no access block for document {doc_id} passed its integrity check"
        )))
    } else {
        Err(DocumentError::AccessDenied(format!(
            "no access block for document {doc_id} is reachable from the caller"
        )))
    }
}

impl DocumentRecord {
    /// Add access blocks for new recipients. O(1) per recipient: the
    /// document body is untouched.
    pub fn grant_blocks(
        &mut self,
        content_key: &SymmetricKey,
        targets: &[(Recipient, Option<EncryptionPublicKey>)],
        now: i64,
    ) -> DocumentAccessResult {
        let mut result = DocumentAccessResult::default();
        let mut changed = Vec::new();

        for (recipient, public) in targets {
            if self.access.contains_key(recipient) {
                result.errors.push(AccessError {
                    recipient: recipient.clone(),
                    error: "already has access".into(),
                });
                continue;
            }
            let outcome = match public {
                Some(public) => {
                    SealedKey::seal(content_key.as_bytes(), public, self.id.as_bytes())
                        .map_err(|e| e.to_string())
                }
                None => Err("recipient has no known public key".to_string()),
            };
            match outcome {
                Ok(sealed) => {
                    self.access.insert(recipient.clone(), sealed);
                    changed.push(recipient.clone());
                }
                Err(error) => result.errors.push(AccessError {
                    recipient: recipient.clone(),
                    error,
                }),
            }
        }

        if !changed.is_empty() {
            self.touch(now);
        }
        result.changed = crate::record::AccessChange::from_recipients(changed);
        result
    }

    /// Remove access blocks. O(1) per recipient: the document body is
    /// untouched, and the content key of already-shared ciphertext is
    /// unchanged for remaining recipients. Revoking every block leaves
    /// the document unrecoverable; that is a revocation, not data loss.
    pub fn revoke_blocks(&mut self, targets: &[Recipient], now: i64) -> DocumentAccessResult {
        let mut result = DocumentAccessResult::default();
        let mut changed = Vec::new();

        for recipient in targets {
            if self.access.remove(recipient).is_some() {
                changed.push(recipient.clone());
            } else {
                result.errors.push(AccessError {
                    recipient: recipient.clone(),
                    error: "no access block".into(),
                });
            }
        }

        if !changed.is_empty() {
            self.touch(now);
        }
        result.changed = crate::record::AccessChange::from_recipients(changed);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealkit_core::{EncryptionKeyPair, GroupId, UserId};

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn doc_id() -> DocumentId {
        DocumentId::new("doc-1").unwrap()
    }

    #[test]
    fn test_encrypt_and_open_via_user_block() {
        let alice = EncryptionKeyPair::generate().unwrap();
        let recipient = Recipient::User(uid("alice"));

        let outcome = encrypt_for_recipients(
            b"the plan",
            doc_id(),
            &[(recipient.clone(), Some(alice.public))],
            1000,
        )
        .unwrap();
        assert_eq!(outcome.granted, vec![recipient.clone()]);
        assert!(outcome.failed.is_empty());

        let sealed = &outcome.blocks[&recipient];
        let (via, key) = open_reachable_block(
            &doc_id(),
            [(&recipient, sealed, &alice.secret)],
        )
        .unwrap();
        assert_eq!(via, recipient);

        let (_, payload) = DocumentHeader::decode(&outcome.encrypted_data).unwrap();
        assert_eq!(payload.decrypt(&key).unwrap(), b"the plan");
    }

    #[test]
    fn test_every_block_opens_to_same_key() {
        let alice = EncryptionKeyPair::generate().unwrap();
        let team = EncryptionKeyPair::generate().unwrap();
        let r_alice = Recipient::User(uid("alice"));
        let r_team = Recipient::Group(GroupId::new("team").unwrap());

        let outcome = encrypt_for_recipients(
            b"body",
            doc_id(),
            &[
                (r_alice.clone(), Some(alice.public)),
                (r_team.clone(), Some(team.public)),
            ],
            0,
        )
        .unwrap();

        let (_, k1) =
            open_reachable_block(&doc_id(), [(&r_alice, &outcome.blocks[&r_alice], &alice.secret)])
                .unwrap();
        let (_, k2) =
            open_reachable_block(&doc_id(), [(&r_team, &outcome.blocks[&r_team], &team.secret)])
                .unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_no_recipients_is_error() {
        let result = encrypt_for_recipients(b"body", doc_id(), &[], 0);
        assert!(matches!(result, Err(DocumentError::NoRecipients)));

        // One recipient without a key: also no blocks at all.
        let result = encrypt_for_recipients(
            b"body",
            doc_id(),
            &[(Recipient::User(uid("ghost")), None)],
            0,
        );
        assert!(matches!(result, Err(DocumentError::NoRecipients)));
    }

    #[test]
    fn test_partial_seal_failure_reported() {
        let alice = EncryptionKeyPair::generate().unwrap();
        let outcome = encrypt_for_recipients(
            b"body",
            doc_id(),
            &[
                (Recipient::User(uid("alice")), Some(alice.public)),
                (Recipient::User(uid("ghost")), None),
            ],
            0,
        )
        .unwrap();

        assert_eq!(outcome.granted.len(), 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].recipient, Recipient::User(uid("ghost")));
    }

    #[test]
    fn test_no_candidates_is_access_denied() {
        let result = open_reachable_block(&doc_id(), []);
        assert!(matches!(result, Err(DocumentError::AccessDenied(_))));
    }

    #[test]
    fn test_failing_candidate_is_corrupt_data() {
        let alice = EncryptionKeyPair::generate().unwrap();
        let mallory = EncryptionKeyPair::generate().unwrap();
        let recipient = Recipient::User(uid("alice"));

        let outcome = encrypt_for_recipients(
            b"body",
            doc_id(),
            &[(recipient.clone(), Some(alice.public))],
            0,
        )
        .unwrap();

        // A reachable block that fails to open is corruption, not denial.
        let result = open_reachable_block(
            &doc_id(),
            [(&recipient, &outcome.blocks[&recipient], &mallory.secret)],
        );
        assert!(matches!(result, Err(DocumentError::CorruptData(_))));
    }

    #[test]
    fn test_grant_then_revoke_block() {
        let alice = EncryptionKeyPair::generate().unwrap();
        let bob = EncryptionKeyPair::generate().unwrap();
        let r_alice = Recipient::User(uid("alice"));
        let r_bob = Recipient::User(uid("bob"));

        let outcome = encrypt_for_recipients(
            b"body",
            doc_id(),
            &[(r_alice.clone(), Some(alice.public))],
            0,
        )
        .unwrap();

        let mut record = DocumentRecord {
            id: doc_id(),
            name: None,
            owner: uid("alice"),
            access: outcome.blocks.clone(),
            version: 0,
            created: 0,
            last_updated: 0,
        };

        let granted = record.grant_blocks(
            &outcome.content_key,
            &[(r_bob.clone(), Some(bob.public))],
            10,
        );
        assert_eq!(granted.changed.users, vec![uid("bob")]);
        assert_eq!(record.access.len(), 2);
        assert_eq!(record.version, 1);

        // Bob can now open his block.
        let (_, key) =
            open_reachable_block(&doc_id(), [(&r_bob, &record.access[&r_bob], &bob.secret)])
                .unwrap();
        assert_eq!(key.as_bytes(), outcome.content_key.as_bytes());

        // Revoking removes exactly bob's block.
        let revoked = record.revoke_blocks(&[r_bob.clone()], 20);
        assert_eq!(revoked.changed.users, vec![uid("bob")]);
        assert_eq!(record.access.len(), 1);
        assert!(record.access.contains_key(&r_alice));

        // Revoking again reports a per-recipient error.
        let again = record.revoke_blocks(&[r_bob], 30);
        assert!(again.changed.is_empty());
        assert_eq!(again.errors.len(), 1);
    }
}
