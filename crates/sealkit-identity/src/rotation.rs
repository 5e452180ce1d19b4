//! Master key rotation.
//!
//! Rotation is computed entirely in memory before anything is committed:
//! every sealed key the user can open is opened with the old secret and
//! re-sealed to the new public key. If any single item fails, the whole
//! rotation is rejected and the old key remains authoritative.

use sealkit_core::{EncryptionKeyPair, EncryptionSecretKey, SealedKey};

use crate::error::{IdentityError, Result};

/// One sealed key that depends on the user's master key, tagged with the
/// context it was sealed under (group id, document id, or user id for
/// device copies).
#[derive(Debug, Clone)]
pub struct SealedItem {
    /// A caller-meaningful label, used only in error reports.
    pub label: String,

    /// Domain-separation context the key was sealed under.
    pub context: Vec<u8>,

    /// The sealed key itself.
    pub sealed: SealedKey,
}

/// The fully computed result of a rotation, ready to commit.
pub struct MasterKeyRotation {
    /// The replacement key pair.
    pub new_pair: EncryptionKeyPair,

    /// Re-sealed items, in the same order as the input.
    pub resealed: Vec<SealedItem>,
}

/// Rotate a master key: generate a replacement pair and re-seal every
/// dependent item to it.
///
/// All-or-nothing: the first item that cannot be opened with the old
/// secret (or re-sealed to the new public key) aborts the rotation with
/// [`IdentityError::RotationAborted`] and no partial state.
pub fn rotate_master_key(
    old_secret: &EncryptionSecretKey,
    items: &[SealedItem],
) -> Result<MasterKeyRotation> {
    let new_pair = EncryptionKeyPair::generate()?;

    let mut resealed = Vec::with_capacity(items.len());
    for item in items {
        let secret = item.sealed.open(old_secret, &item.context).map_err(|e| {
            IdentityError::RotationAborted(format!("cannot open {}: {e}", item.label))
        })?;
        let sealed = SealedKey::seal(&secret, &new_pair.public, &item.context).map_err(|e| {
            IdentityError::RotationAborted(format!("cannot re-seal {}: {e}", item.label))
        })?;
        resealed.push(SealedItem {
            label: item.label.clone(),
            context: item.context.clone(),
            sealed,
        });
    }

    Ok(MasterKeyRotation { new_pair, resealed })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed_item(label: &str, secret: &[u8; 32], to: &EncryptionKeyPair) -> SealedItem {
        SealedItem {
            label: label.to_string(),
            context: label.as_bytes().to_vec(),
            sealed: SealedKey::seal(secret, &to.public, label.as_bytes()).unwrap(),
        }
    }

    #[test]
    fn test_rotation_preserves_secrets() {
        let old = EncryptionKeyPair::generate().unwrap();
        let secrets = [[1u8; 32], [2u8; 32], [3u8; 32]];
        let items: Vec<_> = secrets
            .iter()
            .enumerate()
            .map(|(i, s)| sealed_item(&format!("item-{i}"), s, &old))
            .collect();

        let rotation = rotate_master_key(&old.secret, &items).unwrap();
        assert_eq!(rotation.resealed.len(), 3);

        for (item, secret) in rotation.resealed.iter().zip(secrets.iter()) {
            let opened = item
                .sealed
                .open(&rotation.new_pair.secret, &item.context)
                .unwrap();
            assert_eq!(&opened, secret);
        }
    }

    #[test]
    fn test_rotation_aborts_on_unreachable_item() {
        let old = EncryptionKeyPair::generate().unwrap();
        let stranger = EncryptionKeyPair::generate().unwrap();

        let items = vec![
            sealed_item("good", &[1u8; 32], &old),
            // Sealed to someone else: the old secret cannot open it.
            sealed_item("bad", &[2u8; 32], &stranger),
        ];

        let result = rotate_master_key(&old.secret, &items);
        assert!(matches!(result, Err(IdentityError::RotationAborted(_))));
    }

    #[test]
    fn test_rotation_with_no_dependents() {
        let old = EncryptionKeyPair::generate().unwrap();
        let rotation = rotate_master_key(&old.secret, &[]).unwrap();
        assert!(rotation.resealed.is_empty());
        assert_ne!(rotation.new_pair.public, old.public);
    }
}
