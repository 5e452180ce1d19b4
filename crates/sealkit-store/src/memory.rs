//! In-memory implementation of the Store trait.
//!
//! Reference implementation and test backend. Thread-safe via RwLock;
//! version checks happen under the same short write lock as the commit,
//! which is what makes the optimistic protocol race-free.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use sealkit_core::{DeviceId, DocumentId, GroupId, UserId};
use sealkit_document::DocumentRecord;
use sealkit_group::Group;
use sealkit_identity::{DeviceRecord, UserRecord};

use crate::error::{Result, StoreError};
use crate::traits::{Store, UpdateResult};

/// In-memory store. All data is lost when the store is dropped.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    users: HashMap<UserId, UserRecord>,
    devices: HashMap<(UserId, DeviceId), DeviceRecord>,
    groups: HashMap<GroupId, Group>,
    documents: HashMap<DocumentId, DocumentRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryStoreInner> {
        self.inner.read().expect("store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryStoreInner> {
        self.inner.write().expect("store lock poisoned")
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, record: &UserRecord) -> Result<()> {
        let mut inner = self.write();
        if inner.users.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(format!("user {}", record.id)));
        }
        inner.users.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<UserRecord>> {
        Ok(self.read().users.get(id).cloned())
    }

    async fn update_user(&self, record: &UserRecord) -> Result<()> {
        let mut inner = self.write();
        if !inner.users.contains_key(&record.id) {
            return Err(StoreError::NotFound(format!("user {}", record.id)));
        }
        inner.users.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<UserId>> {
        let mut ids: Vec<UserId> = self.read().users.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn insert_device(&self, record: &DeviceRecord) -> Result<()> {
        let mut inner = self.write();
        let key = (record.user_id.clone(), record.device_id.clone());
        if inner.devices.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!(
                "device {} for user {}",
                record.device_id, record.user_id
            )));
        }
        inner.devices.insert(key, record.clone());
        Ok(())
    }

    async fn update_device(&self, record: &DeviceRecord) -> Result<()> {
        let mut inner = self.write();
        let key = (record.user_id.clone(), record.device_id.clone());
        if !inner.devices.contains_key(&key) {
            return Err(StoreError::NotFound(format!(
                "device {} for user {}",
                record.device_id, record.user_id
            )));
        }
        inner.devices.insert(key, record.clone());
        Ok(())
    }

    async fn list_devices(&self, user: &UserId) -> Result<Vec<DeviceRecord>> {
        let mut devices: Vec<DeviceRecord> = self
            .read()
            .devices
            .values()
            .filter(|d| &d.user_id == user)
            .cloned()
            .collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(devices)
    }

    async fn delete_device(
        &self,
        user: &UserId,
        device: &DeviceId,
    ) -> Result<Option<DeviceRecord>> {
        let mut inner = self.write();
        Ok(inner.devices.remove(&(user.clone(), device.clone())))
    }

    async fn insert_group(&self, group: &Group) -> Result<()> {
        let mut inner = self.write();
        if inner.groups.contains_key(&group.id) {
            return Err(StoreError::AlreadyExists(format!("group {}", group.id)));
        }
        inner.groups.insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>> {
        Ok(self.read().groups.get(id).cloned())
    }

    async fn update_group(&self, group: &Group, expected_version: u64) -> Result<UpdateResult> {
        let mut inner = self.write();
        let current = inner
            .groups
            .get(&group.id)
            .ok_or_else(|| StoreError::NotFound(format!("group {}", group.id)))?
            .version;

        if current != expected_version {
            return Ok(UpdateResult::VersionConflict { current });
        }
        inner.groups.insert(group.id.clone(), group.clone());
        Ok(UpdateResult::Committed)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let mut groups: Vec<Group> = self.read().groups.values().cloned().collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(groups)
    }

    async fn list_group_ids(&self) -> Result<Vec<GroupId>> {
        let mut ids: Vec<GroupId> = self.read().groups.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn insert_document(&self, record: &DocumentRecord) -> Result<()> {
        let mut inner = self.write();
        if inner.documents.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(format!("document {}", record.id)));
        }
        inner.documents.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<DocumentRecord>> {
        Ok(self.read().documents.get(id).cloned())
    }

    async fn update_document(
        &self,
        record: &DocumentRecord,
        expected_version: u64,
    ) -> Result<UpdateResult> {
        let mut inner = self.write();
        let current = inner
            .documents
            .get(&record.id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", record.id)))?
            .version;

        if current != expected_version {
            return Ok(UpdateResult::VersionConflict { current });
        }
        inner.documents.insert(record.id.clone(), record.clone());
        Ok(UpdateResult::Committed)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let mut docs: Vec<DocumentRecord> = self.read().documents.values().cloned().collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }
}
