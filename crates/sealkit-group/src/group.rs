//! The group record: creation, unlocking, and metadata.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use sealkit_core::{
    validate_label, CoreError, EncryptionKeyPair, EncryptionPublicKey, EncryptionSecretKey,
    GroupId, SealedKey, UserId,
};

use crate::error::{GroupError, Result};

/// Human-readable group name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupName(String);

impl GroupName {
    /// Construct after validating the name.
    pub fn new(s: impl Into<String>) -> std::result::Result<Self, CoreError> {
        let s = s.into();
        validate_label("group name", &s)?;
        Ok(Self(s))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options that can be specified when creating a group.
#[derive(Debug, Clone)]
pub struct GroupCreateOpts {
    /// Optional name.
    pub name: Option<GroupName>,

    /// Whether the creator becomes an admin. Default true.
    pub add_as_admin: bool,

    /// Whether the creator becomes a member. Default true. Admins are
    /// always members, so `add_as_admin` without `add_as_member` is
    /// rejected.
    pub add_as_member: bool,

    /// Owner of the group; defaults to the creator. Must end up an admin.
    pub owner: Option<UserId>,

    /// Additional users to seed as admins (and therefore members).
    pub admins: Vec<UserId>,

    /// Additional users to seed as members.
    pub members: Vec<UserId>,

    /// Whether the group key should be flagged for rotation immediately.
    pub needs_rotation: bool,
}

impl Default for GroupCreateOpts {
    fn default() -> Self {
        Self {
            name: None,
            add_as_admin: true,
            add_as_member: true,
            owner: None,
            admins: Vec::new(),
            members: Vec::new(),
            needs_rotation: false,
        }
    }
}

/// Lifecycle of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupLifecycle {
    /// The group accepts membership edits and key rotations.
    Active,
    /// The group was deleted; all operations are rejected.
    Deleted,
}

/// A group: shared encryption key with per-member sealed copies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// The group's id.
    pub id: GroupId,

    /// Optional name.
    pub name: Option<GroupName>,

    /// The owner (always an admin).
    pub owner: UserId,

    /// The group's encryption public key.
    pub public_key: EncryptionPublicKey,

    /// Admin user ids. Invariant: non-empty, and a subset of the member
    /// key set.
    pub admins: BTreeSet<UserId>,

    /// Member sealed key copies. Every value opens to the same group
    /// secret under its member's master secret.
    pub members: BTreeMap<UserId, SealedKey>,

    /// Lifecycle state.
    pub lifecycle: GroupLifecycle,

    /// Set when membership shrank without a key rotation.
    pub needs_rotation: bool,

    /// Monotonic version for optimistic concurrency.
    pub version: u64,

    /// When the group was created (Unix milliseconds).
    pub created: i64,

    /// When the group was last updated (Unix milliseconds).
    pub last_updated: i64,
}

/// Metadata about a group from one viewer's perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMeta {
    /// The group's id.
    pub id: GroupId,
    /// Optional name.
    pub name: Option<GroupName>,
    /// Whether the viewer is an admin.
    pub is_admin: bool,
    /// Whether the viewer is a member.
    pub is_member: bool,
    /// Whether the key is flagged for rotation.
    pub needs_rotation: bool,
    /// When the group was created (Unix milliseconds).
    pub created: i64,
    /// When the group was last updated (Unix milliseconds).
    pub last_updated: i64,
}

impl Group {
    /// Create a group.
    ///
    /// Generates the group key pair, seals the secret to every seed
    /// member, and adds the creator per `opts`. Every seed user must have
    /// a public key in `public_keys`; creation is not a partial-success
    /// operation.
    pub fn create(
        id: GroupId,
        creator: &UserId,
        opts: &GroupCreateOpts,
        public_keys: &BTreeMap<UserId, EncryptionPublicKey>,
        now: i64,
    ) -> Result<Self> {
        if opts.add_as_admin && !opts.add_as_member {
            return Err(GroupError::InvalidGroupState(
                "admins are always members; add_as_admin requires add_as_member".into(),
            ));
        }

        let mut admins: BTreeSet<UserId> = opts.admins.iter().cloned().collect();
        if opts.add_as_admin {
            admins.insert(creator.clone());
        }
        if admins.is_empty() {
            return Err(GroupError::InvalidGroupState(
                "a group needs at least one admin".into(),
            ));
        }

        let owner = opts.owner.clone().unwrap_or_else(|| creator.clone());
        if !admins.contains(&owner) {
            return Err(GroupError::InvalidGroupState(format!(
                "owner {owner} must be an admin"
            )));
        }

        // Admins are members; seed members are the explicit list, the
        // admin set, and optionally the creator.
        let mut member_ids: BTreeSet<UserId> = opts.members.iter().cloned().collect();
        member_ids.extend(admins.iter().cloned());
        if opts.add_as_member {
            member_ids.insert(creator.clone());
        }

        let pair = EncryptionKeyPair::generate()?;
        let secret_bytes = pair.secret.to_bytes();

        let mut members = BTreeMap::new();
        for user in member_ids {
            let public = public_keys
                .get(&user)
                .ok_or_else(|| GroupError::UnknownUser(user.clone()))?;
            let sealed = SealedKey::seal(&secret_bytes, public, id.as_bytes())?;
            members.insert(user, sealed);
        }

        Ok(Self {
            id,
            name: opts.name.clone(),
            owner,
            public_key: pair.public,
            admins,
            members,
            lifecycle: GroupLifecycle::Active,
            needs_rotation: opts.needs_rotation,
            version: 0,
            created: now,
            last_updated: now,
        })
    }

    /// Whether the user is an admin.
    pub fn is_admin(&self, user: &UserId) -> bool {
        self.admins.contains(user)
    }

    /// Whether the user is a member.
    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.contains_key(user)
    }

    /// Recover the group secret using a member's master secret.
    pub fn unlock(&self, user: &UserId, master_secret: &EncryptionSecretKey) -> Result<EncryptionSecretKey> {
        let sealed = self.members.get(user).ok_or_else(|| GroupError::NotMember {
            user: user.clone(),
            group: self.id.clone(),
        })?;
        let bytes = sealed.open(master_secret, self.id.as_bytes())?;
        Ok(EncryptionSecretKey::from_bytes(bytes))
    }

    /// Metadata from the viewer's perspective.
    pub fn meta(&self, viewer: &UserId) -> GroupMeta {
        GroupMeta {
            id: self.id.clone(),
            name: self.name.clone(),
            is_admin: self.is_admin(viewer),
            is_member: self.is_member(viewer),
            needs_rotation: self.needs_rotation,
            created: self.created,
            last_updated: self.last_updated,
        }
    }

    /// Update or clear the group's name. Admin only.
    pub fn update_name(&mut self, actor: &UserId, name: Option<GroupName>, now: i64) -> Result<()> {
        self.ensure_active()?;
        self.ensure_admin(actor)?;
        self.name = name;
        self.touch(now);
        Ok(())
    }

    /// Mark the group deleted. Admin only. Member sealed keys are dropped
    /// with the record.
    pub fn delete(&mut self, actor: &UserId, now: i64) -> Result<()> {
        self.ensure_active()?;
        self.ensure_admin(actor)?;
        self.lifecycle = GroupLifecycle::Deleted;
        self.members.clear();
        self.touch(now);
        Ok(())
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        match self.lifecycle {
            GroupLifecycle::Active => Ok(()),
            GroupLifecycle::Deleted => Err(GroupError::InvalidGroupState(format!(
                "group {} is deleted",
                self.id
            ))),
        }
    }

    pub(crate) fn ensure_admin(&self, actor: &UserId) -> Result<()> {
        if self.is_admin(actor) {
            Ok(())
        } else {
            Err(GroupError::NotAdmin {
                user: actor.clone(),
                group: self.id.clone(),
            })
        }
    }

    pub(crate) fn touch(&mut self, now: i64) {
        self.last_updated = now;
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealkit_core::EncryptionKeyPair;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn keys_for(users: &[&str]) -> (BTreeMap<UserId, EncryptionPublicKey>, BTreeMap<UserId, EncryptionKeyPair>) {
        let mut publics = BTreeMap::new();
        let mut pairs = BTreeMap::new();
        for u in users {
            let pair = EncryptionKeyPair::generate().unwrap();
            publics.insert(uid(u), pair.public);
            pairs.insert(uid(u), pair);
        }
        (publics, pairs)
    }

    #[test]
    fn test_create_default_creator_is_admin_and_member() {
        let (publics, _) = keys_for(&["alice"]);
        let group = Group::create(
            GroupId::new("g1").unwrap(),
            &uid("alice"),
            &GroupCreateOpts::default(),
            &publics,
            1000,
        )
        .unwrap();

        assert!(group.is_admin(&uid("alice")));
        assert!(group.is_member(&uid("alice")));
        assert_eq!(group.owner, uid("alice"));
        assert_eq!(group.version, 0);
    }

    #[test]
    fn test_create_admin_without_member_rejected() {
        let (publics, _) = keys_for(&["alice"]);
        let opts = GroupCreateOpts {
            add_as_admin: true,
            add_as_member: false,
            ..Default::default()
        };
        let result = Group::create(GroupId::new("g1").unwrap(), &uid("alice"), &opts, &publics, 0);
        assert!(matches!(result, Err(GroupError::InvalidGroupState(_))));
    }

    #[test]
    fn test_create_without_any_admin_rejected() {
        let (publics, _) = keys_for(&["alice"]);
        let opts = GroupCreateOpts {
            add_as_admin: false,
            add_as_member: true,
            ..Default::default()
        };
        let result = Group::create(GroupId::new("g1").unwrap(), &uid("alice"), &opts, &publics, 0);
        assert!(matches!(result, Err(GroupError::InvalidGroupState(_))));
    }

    #[test]
    fn test_all_member_copies_open_to_same_secret() {
        let (publics, pairs) = keys_for(&["alice", "bob", "carol"]);
        let opts = GroupCreateOpts {
            members: vec![uid("bob"), uid("carol")],
            ..Default::default()
        };
        let group = Group::create(GroupId::new("g1").unwrap(), &uid("alice"), &opts, &publics, 0)
            .unwrap();

        let secrets: Vec<[u8; 32]> = ["alice", "bob", "carol"]
            .iter()
            .map(|u| {
                group
                    .unlock(&uid(u), &pairs[&uid(u)].secret)
                    .unwrap()
                    .to_bytes()
            })
            .collect();

        assert_eq!(secrets[0], secrets[1]);
        assert_eq!(secrets[1], secrets[2]);

        // And the shared secret matches the group public key.
        let recovered = EncryptionSecretKey::from_bytes(secrets[0]);
        assert_eq!(recovered.public_key(), group.public_key);
    }

    #[test]
    fn test_unlock_non_member_fails() {
        let (publics, _) = keys_for(&["alice"]);
        let group = Group::create(
            GroupId::new("g1").unwrap(),
            &uid("alice"),
            &GroupCreateOpts::default(),
            &publics,
            0,
        )
        .unwrap();

        let outsider = EncryptionKeyPair::generate().unwrap();
        assert!(matches!(
            group.unlock(&uid("mallory"), &outsider.secret),
            Err(GroupError::NotMember { .. })
        ));
    }

    #[test]
    fn test_create_missing_public_key_fails() {
        let (publics, _) = keys_for(&["alice"]);
        let opts = GroupCreateOpts {
            members: vec![uid("ghost")],
            ..Default::default()
        };
        let result = Group::create(GroupId::new("g1").unwrap(), &uid("alice"), &opts, &publics, 0);
        assert!(matches!(result, Err(GroupError::UnknownUser(_))));
    }

    #[test]
    fn test_delete_blocks_further_ops() {
        let (publics, _) = keys_for(&["alice"]);
        let mut group = Group::create(
            GroupId::new("g1").unwrap(),
            &uid("alice"),
            &GroupCreateOpts::default(),
            &publics,
            0,
        )
        .unwrap();

        group.delete(&uid("alice"), 10).unwrap();
        assert_eq!(group.lifecycle, GroupLifecycle::Deleted);
        assert!(group.members.is_empty());
        assert!(matches!(
            group.update_name(&uid("alice"), None, 20),
            Err(GroupError::InvalidGroupState(_))
        ));
    }

    #[test]
    fn test_update_name_requires_admin() {
        let (publics, _) = keys_for(&["alice", "bob"]);
        let opts = GroupCreateOpts {
            members: vec![uid("bob")],
            ..Default::default()
        };
        let mut group =
            Group::create(GroupId::new("g1").unwrap(), &uid("alice"), &opts, &publics, 0).unwrap();

        assert!(matches!(
            group.update_name(&uid("bob"), Some(GroupName::new("new").unwrap()), 1),
            Err(GroupError::NotAdmin { .. })
        ));

        group
            .update_name(&uid("alice"), Some(GroupName::new("new").unwrap()), 1)
            .unwrap();
        assert_eq!(group.name.as_ref().unwrap().as_str(), "new");
        assert_eq!(group.version, 1);
    }
}
