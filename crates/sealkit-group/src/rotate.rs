//! Group key rotation.
//!
//! Rotation generates a fresh group key pair and re-seals the new secret
//! for every current member. A single member's failure is reported, not
//! fatal: the batch succeeds as long as at least one member (which always
//! includes the acting admin) can be re-sealed. Members whose re-seal
//! failed lose their copy and must be re-added.

use std::collections::BTreeMap;

use tracing::warn;

use sealkit_core::{EncryptionKeyPair, EncryptionPublicKey, SealedKey, UserId};

use crate::edit::GroupAccessEditErr;
use crate::error::{GroupError, Result};
use crate::group::Group;

/// Result of rotating a group's private key.
#[derive(Debug, Clone)]
pub struct GroupKeyRotationResult {
    /// Members re-sealed under the new key.
    pub succeeded: Vec<UserId>,
    /// Members whose re-seal failed; they no longer hold a key copy.
    pub failed: Vec<GroupAccessEditErr>,
    /// Always false after a successful rotation.
    pub needs_rotation: bool,
}

impl Group {
    /// Rotate the group key. Admin only.
    ///
    /// `public_keys` must contain the master public key of every current
    /// member that should survive the rotation; members missing from the
    /// map are reported as failed.
    pub fn rotate_key(
        &mut self,
        actor: &UserId,
        public_keys: &BTreeMap<UserId, EncryptionPublicKey>,
        now: i64,
    ) -> Result<GroupKeyRotationResult> {
        self.ensure_active()?;
        self.ensure_admin(actor)?;

        let new_pair = EncryptionKeyPair::generate()?;
        let secret_bytes = new_pair.secret.to_bytes();

        let mut new_members = BTreeMap::new();
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for user in self.members.keys() {
            let outcome = match public_keys.get(user) {
                Some(public) => SealedKey::seal(&secret_bytes, public, self.id.as_bytes())
                    .map_err(|e| e.to_string()),
                None => Err("user has no known public key".to_string()),
            };
            match outcome {
                Ok(sealed) => {
                    new_members.insert(user.clone(), sealed);
                    succeeded.push(user.clone());
                }
                Err(error) => {
                    warn!(group = %self.id, user = %user, %error, "member dropped from key rotation");
                    failed.push(GroupAccessEditErr {
                        user: user.clone(),
                        error,
                    });
                }
            }
        }

        if succeeded.is_empty() {
            return Err(GroupError::InvalidGroupState(format!(
                "rotation of group {} re-sealed no members; previous key kept",
                self.id
            )));
        }

        self.public_key = new_pair.public;
        self.members = new_members;
        self.needs_rotation = false;
        self.touch(now);

        Ok(GroupKeyRotationResult {
            succeeded,
            failed,
            needs_rotation: false,
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupCreateOpts;
    use sealkit_core::GroupId;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn test_rotation_changes_key_and_preserves_members() {
        let mut publics = BTreeMap::new();
        let mut pairs = BTreeMap::new();
        for u in ["alice", "bob"] {
            let pair = EncryptionKeyPair::generate().unwrap();
            publics.insert(uid(u), pair.public);
            pairs.insert(uid(u), pair);
        }

        let opts = GroupCreateOpts {
            members: vec![uid("bob")],
            ..Default::default()
        };
        let mut group =
            Group::create(GroupId::new("g1").unwrap(), &uid("alice"), &opts, &publics, 0).unwrap();
        group.needs_rotation = true;
        let old_public = group.public_key;

        let result = group.rotate_key(&uid("alice"), &publics, 10).unwrap();
        assert_eq!(result.succeeded.len(), 2);
        assert!(result.failed.is_empty());
        assert!(!group.needs_rotation);
        assert_ne!(group.public_key, old_public);

        // Both members open the new secret and it matches the new public.
        for u in ["alice", "bob"] {
            let secret = group.unlock(&uid(u), &pairs[&uid(u)].secret).unwrap();
            assert_eq!(secret.public_key(), group.public_key);
        }
    }

    #[test]
    fn test_rotation_partial_failure_drops_member() {
        let mut publics = BTreeMap::new();
        let alice = EncryptionKeyPair::generate().unwrap();
        let bob = EncryptionKeyPair::generate().unwrap();
        publics.insert(uid("alice"), alice.public);
        publics.insert(uid("bob"), bob.public);

        let opts = GroupCreateOpts {
            members: vec![uid("bob")],
            ..Default::default()
        };
        let mut group =
            Group::create(GroupId::new("g1").unwrap(), &uid("alice"), &opts, &publics, 0).unwrap();

        // Bob's key disappears from the directory before rotation.
        publics.remove(&uid("bob"));
        let result = group.rotate_key(&uid("alice"), &publics, 10).unwrap();

        assert_eq!(result.succeeded, vec![uid("alice")]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].user, uid("bob"));
        assert!(!group.is_member(&uid("bob")));
    }

    #[test]
    fn test_rotation_requires_admin() {
        let mut publics = BTreeMap::new();
        let alice = EncryptionKeyPair::generate().unwrap();
        publics.insert(uid("alice"), alice.public);

        let mut group = Group::create(
            GroupId::new("g1").unwrap(),
            &uid("alice"),
            &GroupCreateOpts::default(),
            &publics,
            0,
        )
        .unwrap();

        assert!(matches!(
            group.rotate_key(&uid("bob"), &publics, 10),
            Err(GroupError::NotAdmin { .. })
        ));
    }
}
