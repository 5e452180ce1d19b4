//! The Sdk: unified API for sealkit.
//!
//! An [`Sdk`] instance is a session bound to one [`DeviceContext`]. All
//! operations flow through it: user and device management, group key
//! management, policy-driven document encryption, and blind index search.
//!
//! The store is the only blocking point; every store call honors the
//! configured operation timeout, and a timed-out call surfaces
//! [`SdkError::Timeout`] without any internal retry — the outcome of an
//! interrupted commit is ambiguous and only the caller can decide how to
//! proceed.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use sealkit_core::{
    DeviceId, DocumentId, EncryptionPublicKey, EncryptionSecretKey, GroupId, Recipient, UserId,
};
use sealkit_document::{
    document_id_from_bytes, encrypt_for_recipients, generate_document_id, open_reachable_block,
    AccessChange, AccessError, DocumentAccessResult, DocumentDecryptResult,
    DocumentDecryptUnmanagedResult, DocumentEncryptOpts, DocumentEncryptResult,
    DocumentEncryptUnmanagedResult, DocumentError, DocumentHeader, DocumentListMeta,
    DocumentMetadataResult, DocumentName, DocumentRecord, EncryptedDeks,
};
use sealkit_group::{
    Group, GroupAccessEditResult, GroupCreateOpts, GroupKeyRotationResult, GroupMeta, GroupName,
};
use sealkit_identity::{
    create_user as identity_create_user, provision_device, rotate_master_key, unlock_master_key,
    DeviceAddResult, DeviceContext, DeviceCreateOpts, DeviceRecord, SealedItem, UserCreateOpts,
    UserCreateResult, UserRecord, UserUpdatePrivateKeyResult,
};
use sealkit_policy::{resolve_grants, PolicyError, PolicyRuleSet, RecipientCatalog};
use sealkit_search::{
    create_blind_index, initialize_search, BlindIndexSearch, EncryptedBlindIndexSalt, SearchError,
    Tokenization,
};
use sealkit_store::{Store, UpdateResult};

use crate::error::{Result, SdkError};

/// Configuration for the Sdk.
#[derive(Debug, Clone, Default)]
pub struct SdkConfig {
    /// Timeout applied to each store call. `None` waits indefinitely.
    pub operation_timeout: Option<Duration>,

    /// The policy rule set used to resolve policy grants at encrypt
    /// time.
    pub policy: PolicyRuleSet,
}

/// A user's public key, as returned by [`Sdk::user_public_keys`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserWithKey {
    /// The user.
    pub id: UserId,
    /// Their master public key.
    pub public_key: EncryptionPublicKey,
}

/// The main Sdk struct: a session bound to one device identity.
pub struct Sdk<S: Store> {
    /// The authenticated device identity.
    device: DeviceContext,
    /// The entity store.
    store: Arc<S>,
    /// Configuration.
    config: SdkConfig,
}

impl<S: Store> Sdk<S> {
    // ─────────────────────────────────────────────────────────────────────
    // Bootstrap
    // ─────────────────────────────────────────────────────────────────────

    /// Create a user account: generate a master key pair and store it
    /// wrapped under the passphrase.
    pub async fn create_user(
        store: &S,
        user_id: UserId,
        passphrase: &str,
        opts: &UserCreateOpts,
    ) -> Result<UserCreateResult> {
        let (record, result) = identity_create_user(user_id, passphrase, opts, now_millis())?;
        store.insert_user(&record).await?;
        Ok(result)
    }

    /// Provision a device for an existing user.
    ///
    /// Requires the user's passphrase to unlock the master key; a wrong
    /// passphrase is an authentication failure.
    pub async fn generate_device(
        store: &S,
        user_id: &UserId,
        passphrase: &str,
        device_id: DeviceId,
        opts: &DeviceCreateOpts,
    ) -> Result<(DeviceContext, DeviceAddResult)> {
        let user = store
            .get_user(user_id)
            .await?
            .ok_or_else(|| SdkError::UnknownUser(user_id.clone()))?;
        let master = unlock_master_key(&user, passphrase)?;

        let (context, record, result) = provision_device(
            user_id,
            &master,
            &user.public_key,
            device_id,
            opts,
            now_millis(),
        )?;
        store.insert_device(&record).await?;
        Ok((context, result))
    }

    /// Initialize an Sdk session from a device context.
    pub fn initialize(store: Arc<S>, device: DeviceContext, config: SdkConfig) -> Self {
        Self {
            device,
            store,
            config,
        }
    }

    /// The session's device context.
    pub fn device(&self) -> &DeviceContext {
        &self.device
    }

    fn user(&self) -> &UserId {
        self.device.user_id()
    }

    // ─────────────────────────────────────────────────────────────────────
    // User & Device Operations
    // ─────────────────────────────────────────────────────────────────────

    /// List the calling user's devices, sorted by device id.
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        self.io(self.store.list_devices(self.user())).await
    }

    /// Delete a device. `None` deletes the current device, after which
    /// this session can no longer decrypt anything.
    pub async fn delete_device(&self, device_id: Option<&DeviceId>) -> Result<DeviceId> {
        let target = device_id.unwrap_or_else(|| self.device.device_id()).clone();
        let removed = self
            .io(self.store.delete_device(self.user(), &target))
            .await?;
        match removed {
            Some(record) => Ok(record.device_id),
            None => Err(SdkError::Store(sealkit_store::StoreError::NotFound(
                format!("device {target}"),
            ))),
        }
    }

    /// Look up master public keys for a list of users. Unknown users are
    /// omitted, so callers can probe which ids can receive grants.
    pub async fn user_public_keys(&self, users: &[UserId]) -> Result<Vec<UserWithKey>> {
        let mut out = Vec::new();
        for id in users {
            if let Some(record) = self.io(self.store.get_user(id)).await? {
                out.push(UserWithKey {
                    id: record.id,
                    public_key: record.public_key,
                });
            }
        }
        Ok(out)
    }

    /// Rotate the calling user's master key.
    ///
    /// Re-seals every dependent sealed key (group memberships, direct
    /// document grants, device copies) to the new key. The rotation is
    /// atomic from the caller's perspective: dependents are computed
    /// up-front and the user record commits last, so on any abort the
    /// previous key remains authoritative. On success this session's
    /// device context is refreshed with its new sealed master copy;
    /// other live sessions of the same user must re-initialize.
    pub async fn rotate_user_key(&mut self, passphrase: &str) -> Result<UserUpdatePrivateKeyResult> {
        let user = self.user_record().await?;
        let old_secret = unlock_master_key(&user, passphrase)?;

        // Gather every sealed key that must survive the rotation.
        let me = Recipient::User(self.user().clone());
        let groups: Vec<Group> = self.caller_groups().await?;
        let documents: Vec<DocumentRecord> = self
            .io(self.store.list_documents())
            .await?
            .into_iter()
            .filter(|d| d.access.contains_key(&me))
            .collect();
        let devices = self.io(self.store.list_devices(self.user())).await?;

        let mut items = Vec::new();
        for group in &groups {
            items.push(SealedItem {
                label: format!("group {}", group.id),
                context: group.id.as_bytes().to_vec(),
                sealed: group.members[self.user()].clone(),
            });
        }
        for doc in &documents {
            items.push(SealedItem {
                label: format!("document {}", doc.id),
                context: doc.id.as_bytes().to_vec(),
                sealed: doc.access[&me].clone(),
            });
        }
        // Device copies are sealed to the device key, not the master key;
        // they are replaced rather than re-opened.
        let rotation = rotate_master_key(&old_secret, &items)?;
        let new_secret_bytes = rotation.new_pair.secret.to_bytes();

        // Commit dependents with the versions we read; roll back on the
        // first conflict so the old key stays authoritative.
        let mut committed_groups: Vec<(Group, u64)> = Vec::new();
        let mut committed_docs: Vec<(DocumentRecord, u64)> = Vec::new();
        let mut resealed = rotation.resealed.into_iter();

        for group in &groups {
            let item = resealed.next().expect("one item per group");
            let mut updated = group.clone();
            let expected = updated.version;
            updated
                .members
                .insert(self.user().clone(), item.sealed.clone());
            touch_group(&mut updated);
            match self.io(self.store.update_group(&updated, expected)).await? {
                UpdateResult::Committed => committed_groups.push((group.clone(), expected)),
                UpdateResult::VersionConflict { current } => {
                    self.rollback_rotation(&committed_groups, &committed_docs).await;
                    return Err(SdkError::Identity(
                        sealkit_identity::IdentityError::RotationAborted(format!(
                            "group {} changed concurrently (version {current})",
                            group.id
                        )),
                    ));
                }
            }
        }
        for doc in &documents {
            let item = resealed.next().expect("one item per document");
            let mut updated = doc.clone();
            let expected = updated.version;
            updated.access.insert(me.clone(), item.sealed.clone());
            touch_document(&mut updated);
            match self
                .io(self.store.update_document(&updated, expected))
                .await?
            {
                UpdateResult::Committed => committed_docs.push((doc.clone(), expected)),
                UpdateResult::VersionConflict { current } => {
                    self.rollback_rotation(&committed_groups, &committed_docs).await;
                    return Err(SdkError::Identity(
                        sealkit_identity::IdentityError::RotationAborted(format!(
                            "document {} changed concurrently (version {current})",
                            doc.id
                        )),
                    ));
                }
            }
        }

        // Device copies: seal the new master secret to each device key.
        let mut own_sealed_master = None;
        for mut device in devices {
            let sealed = sealkit_core::SealedKey::seal(
                &new_secret_bytes,
                &device.encryption_public,
                self.user().as_bytes(),
            )?;
            if &device.device_id == self.device.device_id() {
                own_sealed_master = Some(sealed.clone());
            }
            device.sealed_master = sealed;
            device.last_updated = now_millis();
            self.io(self.store.update_device(&device)).await?;
        }

        // The user record commits last.
        let encrypted_master =
            sealkit_core::EncryptedMasterKey::encrypt(&new_secret_bytes, passphrase)?;
        let mut updated_user = user;
        updated_user.public_key = rotation.new_pair.public;
        updated_user.encrypted_master = encrypted_master.clone();
        updated_user.needs_rotation = false;
        updated_user.last_updated = now_millis();
        self.io(self.store.update_user(&updated_user)).await?;

        // Keep this session usable with the rotated key.
        if let Some(sealed) = own_sealed_master {
            self.device = self.device.with_sealed_master(sealed);
        }

        Ok(UserUpdatePrivateKeyResult {
            user_id: self.user().clone(),
            encrypted_master,
            needs_rotation: false,
        })
    }

    /// Best-effort restore of entities committed before a rotation
    /// abort.
    async fn rollback_rotation(
        &self,
        groups: &[(Group, u64)],
        documents: &[(DocumentRecord, u64)],
    ) {
        for (original, expected) in groups {
            let mut restore = original.clone();
            touch_group(&mut restore);
            restore.version = expected + 2;
            if self
                .io(self.store.update_group(&restore, expected + 1))
                .await
                .map(|r| !r.is_committed())
                .unwrap_or(true)
            {
                warn!(group = %original.id, "could not roll back group after aborted rotation");
            }
        }
        for (original, expected) in documents {
            let mut restore = original.clone();
            touch_document(&mut restore);
            restore.version = expected + 2;
            if self
                .io(self.store.update_document(&restore, expected + 1))
                .await
                .map(|r| !r.is_committed())
                .unwrap_or(true)
            {
                warn!(document = %original.id, "could not roll back document after aborted rotation");
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Group Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Create a group. With no id, one is generated.
    pub async fn create_group(
        &self,
        id: Option<GroupId>,
        opts: &GroupCreateOpts,
    ) -> Result<GroupMeta> {
        let id = match id {
            Some(id) => id,
            None => generate_group_id()?,
        };

        // Everyone who ends up a member needs a public key.
        let mut seed_users: Vec<UserId> = vec![self.user().clone()];
        seed_users.extend(opts.admins.iter().cloned());
        seed_users.extend(opts.members.iter().cloned());
        if let Some(owner) = &opts.owner {
            seed_users.push(owner.clone());
        }
        let publics = self.user_publics(&seed_users).await?;

        let group = Group::create(id, self.user(), opts, &publics, now_millis())?;
        self.io(self.store.insert_group(&group)).await?;
        Ok(group.meta(self.user()))
    }

    /// Metadata for one group.
    pub async fn group_metadata(&self, group_id: &GroupId) -> Result<GroupMeta> {
        let group = self.group_required(group_id).await?;
        Ok(group.meta(self.user()))
    }

    /// List the groups the caller is an admin or member of.
    pub async fn list_groups(&self) -> Result<Vec<GroupMeta>> {
        let groups = self.io(self.store.list_groups()).await?;
        Ok(groups
            .iter()
            .filter(|g| g.is_member(self.user()) || g.is_admin(self.user()))
            .map(|g| g.meta(self.user()))
            .collect())
    }

    /// Update or clear a group's name. Admin only.
    pub async fn update_group_name(
        &self,
        group_id: &GroupId,
        name: Option<GroupName>,
    ) -> Result<GroupMeta> {
        let mut group = self.group_required(group_id).await?;
        let expected = group.version;
        group.update_name(self.user(), name, now_millis())?;
        self.commit_group(&group, expected).await?;
        Ok(group.meta(self.user()))
    }

    /// Delete a group. Admin only.
    pub async fn delete_group(&self, group_id: &GroupId) -> Result<GroupId> {
        let mut group = self.group_required(group_id).await?;
        let expected = group.version;
        group.delete(self.user(), now_millis())?;
        self.commit_group(&group, expected).await?;
        Ok(group.id)
    }

    /// Add members to a group. Admin only; partial success per user.
    pub async fn add_members(
        &self,
        group_id: &GroupId,
        users: &[UserId],
    ) -> Result<GroupAccessEditResult> {
        let mut group = self.group_required(group_id).await?;
        let expected = group.version;
        let secret = self.unlock_group(&group)?;
        let publics = self.user_publics(users).await?;

        let result = group.add_members(self.user(), &secret, users, &publics, now_millis())?;
        if group.version != expected {
            self.commit_group(&group, expected).await?;
        }
        Ok(result)
    }

    /// Remove members from a group. Admin only; partial success per
    /// user. Does not rotate the group key (see [`sealkit_group`]).
    pub async fn remove_members(
        &self,
        group_id: &GroupId,
        users: &[UserId],
    ) -> Result<GroupAccessEditResult> {
        let mut group = self.group_required(group_id).await?;
        let expected = group.version;
        let result = group.remove_members(self.user(), users, now_millis())?;
        if group.version != expected {
            self.commit_group(&group, expected).await?;
        }
        Ok(result)
    }

    /// Add admins to a group (making them members if they are not).
    pub async fn add_admins(
        &self,
        group_id: &GroupId,
        users: &[UserId],
    ) -> Result<GroupAccessEditResult> {
        let mut group = self.group_required(group_id).await?;
        let expected = group.version;
        let secret = self.unlock_group(&group)?;
        let publics = self.user_publics(users).await?;

        let result = group.add_admins(self.user(), &secret, users, &publics, now_millis())?;
        if group.version != expected {
            self.commit_group(&group, expected).await?;
        }
        Ok(result)
    }

    /// Remove admins from a group. The last admin cannot be removed.
    pub async fn remove_admins(
        &self,
        group_id: &GroupId,
        users: &[UserId],
    ) -> Result<GroupAccessEditResult> {
        let mut group = self.group_required(group_id).await?;
        let expected = group.version;
        let result = group.remove_admins(self.user(), users, now_millis())?;
        if group.version != expected {
            self.commit_group(&group, expected).await?;
        }
        Ok(result)
    }

    /// Rotate a group's key. Admin only; per-member partial failure.
    ///
    /// Rotation replaces the group key pair, so document access blocks
    /// sealed to the old group key stop being decryptable through the
    /// group. Re-grant affected documents after rotating.
    pub async fn rotate_group_key(&self, group_id: &GroupId) -> Result<GroupKeyRotationResult> {
        let mut group = self.group_required(group_id).await?;
        let expected = group.version;

        let members: Vec<UserId> = group.members.keys().cloned().collect();
        let publics = self.user_publics(&members).await?;

        let result = group.rotate_key(self.user(), &publics, now_millis())?;
        self.commit_group(&group, expected).await?;
        Ok(result)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Document Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Encrypt a document and persist its access blocks.
    ///
    /// Recipients come from the explicit user/group lists, the policy
    /// grant (if any), and the author (unless `grant_to_author` is
    /// false). Per-recipient sealing failures are reported in the result;
    /// the operation fails only if no access block could be produced.
    pub async fn encrypt_document(
        &self,
        plaintext: &[u8],
        opts: &DocumentEncryptOpts,
    ) -> Result<DocumentEncryptResult> {
        let id = match &opts.id {
            Some(id) => id.clone(),
            None => generate_document_id()?,
        };
        let recipients = self.resolve_recipients(opts).await?;
        let targets = self.recipient_publics(&recipients).await?;

        let now = now_millis();
        let outcome = encrypt_for_recipients(plaintext, id.clone(), &targets, now)?;

        let record = DocumentRecord {
            id: id.clone(),
            name: opts.name.clone(),
            owner: self.user().clone(),
            access: outcome.blocks,
            version: 0,
            created: now,
            last_updated: now,
        };
        self.io(self.store.insert_document(&record)).await?;

        Ok(DocumentEncryptResult {
            id,
            name: opts.name.clone(),
            grants: AccessChange::from_recipients(outcome.granted),
            access_errors: outcome
                .failed
                .into_iter()
                .map(|f| AccessError {
                    recipient: f.recipient,
                    error: f.error,
                })
                .collect(),
            encrypted_data: outcome.encrypted_data,
            created: now,
            last_updated: now,
        })
    }

    /// Decrypt a managed document.
    pub async fn decrypt_document(&self, encrypted: &[u8]) -> Result<DocumentDecryptResult> {
        let (header, payload) = DocumentHeader::decode(encrypted)?;
        let record = self.document_required(&header.id).await?;

        let (_, key) = self.open_content_key(&record).await?;
        let plaintext = payload
            .decrypt(&key)
            .map_err(|e| DocumentError::CorruptData(format!("document body: {e}")))?;

        Ok(DocumentDecryptResult {
            id: record.id,
            name: record.name,
            decrypted_data: Bytes::from(plaintext),
            created: record.created,
            last_updated: record.last_updated,
        })
    }

    /// Re-encrypt a document's contents under a fresh content key,
    /// keeping its recipient set.
    pub async fn update_document_bytes(
        &self,
        document_id: &DocumentId,
        new_bytes: &[u8],
    ) -> Result<DocumentEncryptResult> {
        let mut record = self.document_required(document_id).await?;
        let expected = record.version;
        self.require_access(&record).await?;

        let recipients: Vec<Recipient> = record.access.keys().cloned().collect();
        let targets = self.recipient_publics(&recipients).await?;

        let now = now_millis();
        let outcome = encrypt_for_recipients(new_bytes, record.id.clone(), &targets, now)?;
        record.access = outcome.blocks;
        touch_document(&mut record);
        self.commit_document(&record, expected).await?;

        Ok(DocumentEncryptResult {
            id: record.id.clone(),
            name: record.name.clone(),
            grants: AccessChange::from_recipients(outcome.granted),
            access_errors: outcome
                .failed
                .into_iter()
                .map(|f| AccessError {
                    recipient: f.recipient,
                    error: f.error,
                })
                .collect(),
            encrypted_data: outcome.encrypted_data,
            created: record.created,
            last_updated: record.last_updated,
        })
    }

    /// Modify or clear a document's name.
    pub async fn update_document_name(
        &self,
        document_id: &DocumentId,
        name: Option<DocumentName>,
    ) -> Result<DocumentMetadataResult> {
        let mut record = self.document_required(document_id).await?;
        let expected = record.version;
        self.require_access(&record).await?;

        record.name = name;
        touch_document(&mut record);
        self.commit_document(&record, expected).await?;
        self.metadata_of(&record).await
    }

    /// Grant document access to users and groups. Partial success.
    pub async fn grant_document_access(
        &self,
        document_id: &DocumentId,
        users: &[UserId],
        groups: &[GroupId],
    ) -> Result<DocumentAccessResult> {
        let mut record = self.document_required(document_id).await?;
        let expected = record.version;

        // The caller proves access by opening their own block.
        let (_, key) = self.open_content_key(&record).await?;

        let recipients: Vec<Recipient> = users
            .iter()
            .map(|u| Recipient::User(u.clone()))
            .chain(groups.iter().map(|g| Recipient::Group(g.clone())))
            .collect();
        let targets = self.recipient_publics(&recipients).await?;

        let result = record.grant_blocks(&key, &targets, now_millis());
        if !result.changed.is_empty() {
            self.commit_document(&record, expected).await?;
        }
        Ok(result)
    }

    /// Revoke document access from users and groups. Partial success.
    /// Removes access blocks only; the document body and content key are
    /// unchanged for remaining recipients.
    pub async fn revoke_document_access(
        &self,
        document_id: &DocumentId,
        users: &[UserId],
        groups: &[GroupId],
    ) -> Result<DocumentAccessResult> {
        let mut record = self.document_required(document_id).await?;
        let expected = record.version;
        self.require_access(&record).await?;

        let recipients: Vec<Recipient> = users
            .iter()
            .map(|u| Recipient::User(u.clone()))
            .chain(groups.iter().map(|g| Recipient::Group(g.clone())))
            .collect();

        let result = record.revoke_blocks(&recipients, now_millis());
        if !result.changed.is_empty() {
            self.commit_document(&record, expected).await?;
        }
        Ok(result)
    }

    /// List metadata for every document the caller can decrypt.
    pub async fn list_documents(&self) -> Result<Vec<DocumentListMeta>> {
        let member_of = self.caller_group_ids().await?;
        let docs = self.io(self.store.list_documents()).await?;

        Ok(docs
            .into_iter()
            .filter_map(|d| {
                d.association_for(self.user(), &member_of)
                    .map(|association| DocumentListMeta {
                        id: d.id.clone(),
                        name: d.name.clone(),
                        association,
                        created: d.created,
                        last_updated: d.last_updated,
                    })
            })
            .collect())
    }

    /// Full metadata for one document the caller can decrypt.
    pub async fn document_metadata(&self, document_id: &DocumentId) -> Result<DocumentMetadataResult> {
        let record = self.document_required(document_id).await?;
        self.metadata_of(&record).await
    }

    /// Extract the document id from encrypted bytes.
    pub fn document_id_from_bytes(&self, encrypted: &[u8]) -> Result<DocumentId> {
        Ok(document_id_from_bytes(encrypted)?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Advanced (unmanaged) Document Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Encrypt without persisting access blocks. The returned EDEKs are
    /// required for decryption; the trust boundary for key distribution
    /// shifts to the caller.
    pub async fn encrypt_document_unmanaged(
        &self,
        plaintext: &[u8],
        opts: &DocumentEncryptOpts,
    ) -> Result<DocumentEncryptUnmanagedResult> {
        let id = match &opts.id {
            Some(id) => id.clone(),
            None => generate_document_id()?,
        };
        let recipients = self.resolve_recipients(opts).await?;
        let targets = self.recipient_publics(&recipients).await?;

        let outcome = encrypt_for_recipients(plaintext, id.clone(), &targets, now_millis())?;

        let deks = EncryptedDeks {
            blocks: outcome
                .blocks
                .into_iter()
                .map(|(recipient, sealed_key)| sealkit_document::AccessBlock {
                    recipient,
                    sealed_key,
                })
                .collect(),
        };

        Ok(DocumentEncryptUnmanagedResult {
            id,
            encrypted_data: outcome.encrypted_data,
            encrypted_deks: deks.to_bytes()?,
            changed: AccessChange::from_recipients(outcome.granted),
            errors: outcome
                .failed
                .into_iter()
                .map(|f| AccessError {
                    recipient: f.recipient,
                    error: f.error,
                })
                .collect(),
        })
    }

    /// Decrypt an unmanaged document from its bytes and EDEKs.
    pub async fn decrypt_document_unmanaged(
        &self,
        encrypted: &[u8],
        encrypted_deks: &[u8],
    ) -> Result<DocumentDecryptUnmanagedResult> {
        let (header, payload) = DocumentHeader::decode(encrypted)?;
        let deks = EncryptedDeks::from_bytes(encrypted_deks)?;

        let master = self.device.master_secret()?;
        let mut candidates: Vec<(Recipient, sealkit_core::SealedKey, EncryptionSecretKey)> =
            Vec::new();

        let me = Recipient::User(self.user().clone());
        if let Some(block) = deks.find(&me) {
            candidates.push((me, block.sealed_key.clone(), master.clone()));
        }
        for group in self.caller_groups().await? {
            let recipient = Recipient::Group(group.id.clone());
            if let Some(block) = deks.find(&recipient) {
                match group.unlock(self.user(), &master) {
                    Ok(secret) => candidates.push((recipient, block.sealed_key.clone(), secret)),
                    Err(e) => warn!(group = %group.id, error = %e, "cannot unlock group for decrypt"),
                }
            }
        }

        let (access_via, key) = open_reachable_block(
            &header.id,
            candidates.iter().map(|(r, s, k)| (r, s, k)),
        )?;
        let plaintext = payload
            .decrypt(&key)
            .map_err(|e| DocumentError::CorruptData(format!("document body: {e}")))?;

        Ok(DocumentDecryptUnmanagedResult {
            id: header.id,
            decrypted_data: Bytes::from(plaintext),
            access_via,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Search Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Create a blind index whose salt is sealed to the given group.
    pub async fn create_blind_index(&self, group_id: &GroupId) -> Result<EncryptedBlindIndexSalt> {
        let group = self.group_required(group_id).await?;
        Ok(create_blind_index(&group.id, &group.public_key)?)
    }

    /// Unlock an encrypted blind index salt and initialize search.
    ///
    /// The caller must be a member of the group the salt is sealed to.
    pub async fn initialize_search(
        &self,
        encrypted: &EncryptedBlindIndexSalt,
        tokenization: Tokenization,
    ) -> Result<BlindIndexSearch> {
        let deks = EncryptedDeks::from_bytes(&encrypted.encrypted_deks)?;
        let master = self.device.master_secret()?;

        for block in &deks.blocks {
            let Recipient::Group(group_id) = &block.recipient else {
                continue;
            };
            let Some(group) = self.io(self.store.get_group(group_id)).await? else {
                continue;
            };
            if let Ok(secret) = group.unlock(self.user(), &master) {
                return Ok(initialize_search(encrypted, group_id, &secret, tokenization)?);
            }
        }

        Err(SdkError::Search(SearchError::SaltUnavailable(
            "caller is not a member of any group the salt is sealed to".into(),
        )))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    /// Run a store future under the configured operation timeout.
    async fn io<T>(
        &self,
        fut: impl Future<Output = sealkit_store::Result<T>>,
    ) -> Result<T> {
        match self.config.operation_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, fut).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(SdkError::Timeout),
            },
            None => Ok(fut.await?),
        }
    }

    async fn user_record(&self) -> Result<UserRecord> {
        self.io(self.store.get_user(self.user()))
            .await?
            .ok_or_else(|| SdkError::UnknownUser(self.user().clone()))
    }

    async fn group_required(&self, id: &GroupId) -> Result<Group> {
        self.io(self.store.get_group(id))
            .await?
            .ok_or_else(|| SdkError::UnknownGroup(id.clone()))
    }

    async fn document_required(&self, id: &DocumentId) -> Result<DocumentRecord> {
        self.io(self.store.get_document(id))
            .await?
            .ok_or_else(|| SdkError::UnknownDocument(id.clone()))
    }

    async fn commit_group(&self, group: &Group, expected: u64) -> Result<()> {
        match self.io(self.store.update_group(group, expected)).await? {
            UpdateResult::Committed => Ok(()),
            UpdateResult::VersionConflict { current } => Err(SdkError::VersionConflict {
                entity: format!("group {}", group.id),
                current,
            }),
        }
    }

    async fn commit_document(&self, record: &DocumentRecord, expected: u64) -> Result<()> {
        match self
            .io(self.store.update_document(record, expected))
            .await?
        {
            UpdateResult::Committed => Ok(()),
            UpdateResult::VersionConflict { current } => Err(SdkError::VersionConflict {
                entity: format!("document {}", record.id),
                current,
            }),
        }
    }

    /// Unlock the group secret via the caller's own member copy.
    fn unlock_group(&self, group: &Group) -> Result<EncryptionSecretKey> {
        let master = self.device.master_secret()?;
        Ok(group.unlock(self.user(), &master)?)
    }

    async fn caller_groups(&self) -> Result<Vec<Group>> {
        let groups = self.io(self.store.list_groups()).await?;
        Ok(groups
            .into_iter()
            .filter(|g| g.is_member(self.user()))
            .collect())
    }

    async fn caller_group_ids(&self) -> Result<Vec<GroupId>> {
        Ok(self
            .caller_groups()
            .await?
            .into_iter()
            .map(|g| g.id)
            .collect())
    }

    /// Public keys for a user list; absent users are simply missing from
    /// the map (batch callers report them per-item).
    async fn user_publics(
        &self,
        users: &[UserId],
    ) -> Result<BTreeMap<UserId, EncryptionPublicKey>> {
        let mut out = BTreeMap::new();
        for id in users {
            if out.contains_key(id) {
                continue;
            }
            if let Some(record) = self.io(self.store.get_user(id)).await? {
                out.insert(record.id, record.public_key);
            }
        }
        Ok(out)
    }

    /// Resolve the effective recipient list for an encrypt call.
    async fn resolve_recipients(&self, opts: &DocumentEncryptOpts) -> Result<Vec<Recipient>> {
        let mut recipients: Vec<Recipient> = Vec::new();
        if opts.grant_to_author {
            recipients.push(Recipient::User(self.user().clone()));
        }

        match &opts.policy_grant {
            Some(grant) => {
                let catalog = self.catalog().await?;
                match resolve_grants(
                    grant,
                    &opts.user_grants,
                    &opts.group_grants,
                    &self.config.policy,
                    &catalog,
                ) {
                    Ok(resolved) => {
                        for r in resolved {
                            if !recipients.contains(&r) {
                                recipients.push(r);
                            }
                        }
                    }
                    // An author grant still satisfies the at-least-one-
                    // block requirement.
                    Err(PolicyError::NoRecipients) if !recipients.is_empty() => {}
                    Err(e) => return Err(e.into()),
                }
            }
            None => {
                for u in &opts.user_grants {
                    let r = Recipient::User(u.clone());
                    if !recipients.contains(&r) {
                        recipients.push(r);
                    }
                }
                for g in &opts.group_grants {
                    let r = Recipient::Group(g.clone());
                    if !recipients.contains(&r) {
                        recipients.push(r);
                    }
                }
            }
        }

        if recipients.is_empty() {
            return Err(DocumentError::NoRecipients.into());
        }
        Ok(recipients)
    }

    /// Pair each recipient with its current public key, if known.
    async fn recipient_publics(
        &self,
        recipients: &[Recipient],
    ) -> Result<Vec<(Recipient, Option<EncryptionPublicKey>)>> {
        let mut out = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let public = match recipient {
                Recipient::User(id) => self
                    .io(self.store.get_user(id))
                    .await?
                    .map(|u| u.public_key),
                Recipient::Group(id) => self
                    .io(self.store.get_group(id))
                    .await?
                    .filter(|g| g.lifecycle == sealkit_group::GroupLifecycle::Active)
                    .map(|g| g.public_key),
            };
            out.push((recipient.clone(), public));
        }
        Ok(out)
    }

    async fn catalog(&self) -> Result<RecipientCatalog> {
        let users = self.io(self.store.list_user_ids()).await?;
        let groups = self.io(self.store.list_group_ids()).await?;
        Ok(RecipientCatalog::new(users, groups))
    }

    /// Open the content key of a managed document via any block
    /// reachable from the caller.
    async fn open_content_key(
        &self,
        record: &DocumentRecord,
    ) -> Result<(Recipient, sealkit_core::SymmetricKey)> {
        let master = self.device.master_secret()?;
        let mut candidates: Vec<(Recipient, sealkit_core::SealedKey, EncryptionSecretKey)> =
            Vec::new();

        let me = Recipient::User(self.user().clone());
        if let Some(sealed) = record.access.get(&me) {
            candidates.push((me, sealed.clone(), master.clone()));
        }
        for group in self.caller_groups().await? {
            let recipient = Recipient::Group(group.id.clone());
            if let Some(sealed) = record.access.get(&recipient) {
                match group.unlock(self.user(), &master) {
                    Ok(secret) => candidates.push((recipient, sealed.clone(), secret)),
                    Err(e) => warn!(group = %group.id, error = %e, "cannot unlock group for decrypt"),
                }
            }
        }

        Ok(open_reachable_block(
            &record.id,
            candidates.iter().map(|(r, s, k)| (r, s, k)),
        )?)
    }

    /// Reject callers without any association to the document.
    async fn require_access(&self, record: &DocumentRecord) -> Result<()> {
        let member_of = self.caller_group_ids().await?;
        if record.association_for(self.user(), &member_of).is_none() {
            return Err(DocumentError::AccessDenied(format!(
                "no access block for document {} is reachable from the caller",
                record.id
            ))
            .into());
        }
        Ok(())
    }

    async fn metadata_of(&self, record: &DocumentRecord) -> Result<DocumentMetadataResult> {
        let member_of = self.caller_group_ids().await?;
        let association = record
            .association_for(self.user(), &member_of)
            .ok_or_else(|| {
                DocumentError::AccessDenied(format!(
                    "no access block for document {} is reachable from the caller",
                    record.id
                ))
            })?;

        Ok(DocumentMetadataResult {
            id: record.id.clone(),
            name: record.name.clone(),
            association,
            visible_to_users: record.visible_to_users(),
            visible_to_groups: record.visible_to_groups(),
            created: record.created,
            last_updated: record.last_updated,
        })
    }
}

fn generate_group_id() -> Result<GroupId> {
    let bytes: [u8; 16] = sealkit_core::random_bytes()?;
    Ok(GroupId::new(hex_encode(&bytes)).expect("hex ids are always valid"))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Bump version and timestamp outside the entity's own mutation methods
/// (used by rotation, which edits sealed keys directly).
fn touch_group(group: &mut Group) {
    group.version += 1;
    group.last_updated = now_millis();
}

fn touch_document(record: &mut DocumentRecord) {
    record.version += 1;
    record.last_updated = now_millis();
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
