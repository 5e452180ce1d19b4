//! Membership and admin edits.
//!
//! All edits are batch operations with per-user partial success, mirroring
//! the access-edit results of the document engine. A batch never fails as
//! a whole unless it would violate a group invariant (no admins left, or a
//! non-admin actor).

use std::collections::BTreeMap;

use sealkit_core::{EncryptionPublicKey, EncryptionSecretKey, SealedKey, UserId};

use crate::error::{GroupError, Result};
use crate::group::Group;

/// A failure to edit one user in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAccessEditErr {
    /// The user that could not be edited.
    pub user: UserId,
    /// Why.
    pub error: String,
}

/// Result of a batch membership or admin edit. Partial success is
/// supported: the caller must inspect `failed`.
#[derive(Debug, Clone, Default)]
pub struct GroupAccessEditResult {
    /// Users whose access was changed.
    pub succeeded: Vec<UserId>,
    /// Users whose change failed, with reasons.
    pub failed: Vec<GroupAccessEditErr>,
}

impl GroupAccessEditResult {
    fn fail(&mut self, user: &UserId, error: impl Into<String>) {
        self.failed.push(GroupAccessEditErr {
            user: user.clone(),
            error: error.into(),
        });
    }
}

impl Group {
    /// Add members: seal the group secret to each target's public key.
    ///
    /// The actor must be an admin and supply the unlocked group secret
    /// (obtained via [`Group::unlock`] on their own member copy).
    pub fn add_members(
        &mut self,
        actor: &UserId,
        group_secret: &EncryptionSecretKey,
        targets: &[UserId],
        public_keys: &BTreeMap<UserId, EncryptionPublicKey>,
        now: i64,
    ) -> Result<GroupAccessEditResult> {
        self.ensure_active()?;
        self.ensure_admin(actor)?;

        let secret_bytes = group_secret.to_bytes();
        let mut result = GroupAccessEditResult::default();

        for user in targets {
            if self.members.contains_key(user) {
                result.fail(user, "already a member");
                continue;
            }
            let Some(public) = public_keys.get(user) else {
                result.fail(user, "user has no known public key");
                continue;
            };
            match SealedKey::seal(&secret_bytes, public, self.id.as_bytes()) {
                Ok(sealed) => {
                    self.members.insert(user.clone(), sealed);
                    result.succeeded.push(user.clone());
                }
                Err(e) => result.fail(user, e.to_string()),
            }
        }

        if !result.succeeded.is_empty() {
            self.touch(now);
        }
        Ok(result)
    }

    /// Remove members: delete their sealed copies.
    ///
    /// Does NOT rotate the group key. Removed members who cached the
    /// secret retain historical access until [`Group::rotate_key`] is
    /// called; the group is flagged `needs_rotation` as a reminder.
    /// Members who are still admins are skipped (remove the admin first).
    pub fn remove_members(
        &mut self,
        actor: &UserId,
        targets: &[UserId],
        now: i64,
    ) -> Result<GroupAccessEditResult> {
        self.ensure_active()?;
        self.ensure_admin(actor)?;

        let mut result = GroupAccessEditResult::default();

        for user in targets {
            if self.admins.contains(user) {
                result.fail(user, "user is an admin; remove the admin role first");
                continue;
            }
            if self.members.remove(user).is_some() {
                result.succeeded.push(user.clone());
            } else {
                result.fail(user, "not a member");
            }
        }

        if !result.succeeded.is_empty() {
            self.needs_rotation = true;
            self.touch(now);
        }
        Ok(result)
    }

    /// Add admins. Admins are always members: a target who is not yet a
    /// member also gets a sealed copy of the group secret.
    pub fn add_admins(
        &mut self,
        actor: &UserId,
        group_secret: &EncryptionSecretKey,
        targets: &[UserId],
        public_keys: &BTreeMap<UserId, EncryptionPublicKey>,
        now: i64,
    ) -> Result<GroupAccessEditResult> {
        self.ensure_active()?;
        self.ensure_admin(actor)?;

        let secret_bytes = group_secret.to_bytes();
        let mut result = GroupAccessEditResult::default();

        for user in targets {
            if self.admins.contains(user) {
                result.fail(user, "already an admin");
                continue;
            }
            if !self.members.contains_key(user) {
                let Some(public) = public_keys.get(user) else {
                    result.fail(user, "user has no known public key");
                    continue;
                };
                match SealedKey::seal(&secret_bytes, public, self.id.as_bytes()) {
                    Ok(sealed) => {
                        self.members.insert(user.clone(), sealed);
                    }
                    Err(e) => {
                        result.fail(user, e.to_string());
                        continue;
                    }
                }
            }
            self.admins.insert(user.clone());
            result.succeeded.push(user.clone());
        }

        if !result.succeeded.is_empty() {
            self.touch(now);
        }
        Ok(result)
    }

    /// Remove admins. Membership (and the sealed key copy) is kept.
    ///
    /// Rejects the whole batch with [`GroupError::InvalidGroupState`] if
    /// it would remove the last admin.
    pub fn remove_admins(
        &mut self,
        actor: &UserId,
        targets: &[UserId],
        now: i64,
    ) -> Result<GroupAccessEditResult> {
        self.ensure_active()?;
        self.ensure_admin(actor)?;

        let remaining = self
            .admins
            .iter()
            .filter(|a| !targets.contains(a))
            .count();
        if remaining == 0 {
            return Err(GroupError::InvalidGroupState(format!(
                "group {} must keep at least one admin",
                self.id
            )));
        }

        let mut result = GroupAccessEditResult::default();
        for user in targets {
            if self.admins.remove(user) {
                result.succeeded.push(user.clone());
            } else {
                result.fail(user, "not an admin");
            }
        }

        if !result.succeeded.is_empty() {
            self.touch(now);
        }
        Ok(result)
    }
}
