//! Store trait: the abstract interface for entity persistence.

use async_trait::async_trait;

use sealkit_core::{DeviceId, DocumentId, GroupId, UserId};
use sealkit_document::DocumentRecord;
use sealkit_group::Group;
use sealkit_identity::{DeviceRecord, UserRecord};

use crate::error::Result;

/// Result of a versioned update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    /// The entity was committed at the new version.
    Committed,
    /// Another mutation committed since the caller's read. Retry from a
    /// fresh read.
    VersionConflict {
        /// The version currently stored.
        current: u64,
    },
}

impl UpdateResult {
    /// Whether the update committed.
    pub fn is_committed(&self) -> bool {
        matches!(self, UpdateResult::Committed)
    }
}

/// The Store trait: async interface for entity persistence.
///
/// # Design Notes
///
/// - **Versioned commits**: `update_group` / `update_document` take the
///   version the caller read; a mismatch returns
///   [`UpdateResult::VersionConflict`] without writing. The entity passed
///   in carries its post-mutation version (read version + 1).
/// - **User and device records** are owned by a single passphrase holder
///   and use last-write-wins upserts.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────
    // User Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a new user. Fails if the id exists.
    async fn insert_user(&self, record: &UserRecord) -> Result<()>;

    /// Get a user by id.
    async fn get_user(&self, id: &UserId) -> Result<Option<UserRecord>>;

    /// Update an existing user record.
    async fn update_user(&self, record: &UserRecord) -> Result<()>;

    /// List all known user ids.
    async fn list_user_ids(&self) -> Result<Vec<UserId>>;

    // ─────────────────────────────────────────────────────────────────────
    // Device Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a new device. Fails if (user, device) exists.
    async fn insert_device(&self, record: &DeviceRecord) -> Result<()>;

    /// Update an existing device record (e.g. re-sealed master key).
    async fn update_device(&self, record: &DeviceRecord) -> Result<()>;

    /// List a user's devices, sorted by device id.
    async fn list_devices(&self, user: &UserId) -> Result<Vec<DeviceRecord>>;

    /// Delete a device, returning the removed record if it existed.
    async fn delete_device(&self, user: &UserId, device: &DeviceId)
        -> Result<Option<DeviceRecord>>;

    // ─────────────────────────────────────────────────────────────────────
    // Group Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a new group. Fails if the id exists.
    async fn insert_group(&self, group: &Group) -> Result<()>;

    /// Get a group by id.
    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>>;

    /// Commit a mutated group if the stored version is still
    /// `expected_version`.
    async fn update_group(&self, group: &Group, expected_version: u64) -> Result<UpdateResult>;

    /// List all groups.
    async fn list_groups(&self) -> Result<Vec<Group>>;

    /// List all group ids.
    async fn list_group_ids(&self) -> Result<Vec<GroupId>>;

    // ─────────────────────────────────────────────────────────────────────
    // Document Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a new document record. Fails if the id exists.
    async fn insert_document(&self, record: &DocumentRecord) -> Result<()>;

    /// Get a document record by id.
    async fn get_document(&self, id: &DocumentId) -> Result<Option<DocumentRecord>>;

    /// Commit a mutated document if the stored version is still
    /// `expected_version`.
    async fn update_document(
        &self,
        record: &DocumentRecord,
        expected_version: u64,
    ) -> Result<UpdateResult>;

    /// List all document records.
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>>;
}
