//! Document records, options, and operation results.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use sealkit_core::{
    validate_label, CoreError, DocumentId, GroupId, Recipient, SealedKey, UserId,
};
use sealkit_policy::PolicyGrant;

/// Human-readable document name. Not encrypted, not unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentName(String);

impl DocumentName {
    /// Construct after validating the name.
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        validate_label("document name", &s)?;
        Ok(Self(s))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a document is visible to the requesting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentAssociation {
    /// The user created the document.
    Owner,
    /// The user was granted access directly.
    FromUser,
    /// The user has access via a group they belong to.
    FromGroup,
}

/// Stored state for one managed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// The document's id.
    pub id: DocumentId,

    /// Optional name.
    pub name: Option<DocumentName>,

    /// The user who encrypted the document.
    pub owner: UserId,

    /// Access blocks: the content key sealed per recipient. Every value
    /// opens to the identical content key.
    pub access: BTreeMap<Recipient, SealedKey>,

    /// Monotonic version for optimistic concurrency.
    pub version: u64,

    /// When the document was created (Unix milliseconds).
    pub created: i64,

    /// When the document was last updated (Unix milliseconds).
    pub last_updated: i64,
}

impl DocumentRecord {
    /// How the given user is associated with this document, considering
    /// the groups they belong to. `None` means no access.
    pub fn association_for(
        &self,
        user: &UserId,
        member_of: &[GroupId],
    ) -> Option<DocumentAssociation> {
        if self.owner == *user {
            return Some(DocumentAssociation::Owner);
        }
        if self.access.contains_key(&Recipient::User(user.clone())) {
            return Some(DocumentAssociation::FromUser);
        }
        if member_of
            .iter()
            .any(|g| self.access.contains_key(&Recipient::Group(g.clone())))
        {
            return Some(DocumentAssociation::FromGroup);
        }
        None
    }

    /// Users with a direct access block.
    pub fn visible_to_users(&self) -> Vec<UserId> {
        self.access
            .keys()
            .filter_map(|r| match r {
                Recipient::User(id) => Some(id.clone()),
                Recipient::Group(_) => None,
            })
            .collect()
    }

    /// Groups with an access block.
    pub fn visible_to_groups(&self) -> Vec<GroupId> {
        self.access
            .keys()
            .filter_map(|r| match r {
                Recipient::Group(id) => Some(id.clone()),
                Recipient::User(_) => None,
            })
            .collect()
    }

    pub(crate) fn touch(&mut self, now: i64) {
        self.last_updated = now;
        self.version += 1;
    }
}

/// Parameters for encrypting a new document.
///
/// With no id, one is generated. Neither the id nor the name is
/// encrypted.
#[derive(Debug, Clone)]
pub struct DocumentEncryptOpts {
    /// Id to use; generated if absent.
    pub id: Option<DocumentId>,

    /// Optional name.
    pub name: Option<DocumentName>,

    /// Whether the author gets an access block. Default true.
    pub grant_to_author: bool,

    /// Users to grant access.
    pub user_grants: Vec<UserId>,

    /// Groups to grant access.
    pub group_grants: Vec<GroupId>,

    /// Policy to resolve additional recipients from.
    pub policy_grant: Option<PolicyGrant>,
}

impl Default for DocumentEncryptOpts {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            grant_to_author: true,
            user_grants: Vec::new(),
            group_grants: Vec::new(),
            policy_grant: None,
        }
    }
}

/// Recipients whose access actually changed, split back into users and
/// groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessChange {
    /// Users granted or revoked.
    pub users: Vec<UserId>,
    /// Groups granted or revoked.
    pub groups: Vec<GroupId>,
}

impl AccessChange {
    /// Split a recipient list into users and groups.
    pub fn from_recipients(recipients: impl IntoIterator<Item = Recipient>) -> Self {
        let mut change = Self::default();
        for r in recipients {
            match r {
                Recipient::User(id) => change.users.push(id),
                Recipient::Group(id) => change.groups.push(id),
            }
        }
        change
    }

    /// Total number of changed recipients.
    pub fn len(&self) -> usize {
        self.users.len() + self.groups.len()
    }

    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty()
    }
}

/// A per-recipient failure in a batch access edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessError {
    /// The recipient that failed.
    pub recipient: Recipient,
    /// Why.
    pub error: String,
}

/// Encrypted document bytes and metadata.
#[derive(Debug)]
pub struct DocumentEncryptResult {
    /// The document's id.
    pub id: DocumentId,
    /// Optional name.
    pub name: Option<DocumentName>,
    /// Recipients the content key was sealed for.
    pub grants: AccessChange,
    /// Recipients that could not be granted.
    pub access_errors: Vec<AccessError>,
    /// The encrypted document (wire format).
    pub encrypted_data: Bytes,
    /// When the document was created (Unix milliseconds).
    pub created: i64,
    /// When the document was last updated (Unix milliseconds).
    pub last_updated: i64,
}

/// Decrypted document bytes and metadata.
#[derive(Debug)]
pub struct DocumentDecryptResult {
    /// The document's id.
    pub id: DocumentId,
    /// Optional name.
    pub name: Option<DocumentName>,
    /// The plaintext.
    pub decrypted_data: Bytes,
    /// When the document was created (Unix milliseconds).
    pub created: i64,
    /// When the document was last updated (Unix milliseconds).
    pub last_updated: i64,
}

/// Encrypted document bytes plus the EDEKs the caller must keep.
#[derive(Debug)]
pub struct DocumentEncryptUnmanagedResult {
    /// The document's id.
    pub id: DocumentId,
    /// The encrypted document (wire format).
    pub encrypted_data: Bytes,
    /// Serialized access blocks; required for decryption.
    pub encrypted_deks: Vec<u8>,
    /// Recipients the content key was sealed for.
    pub changed: AccessChange,
    /// Recipients that could not be granted.
    pub errors: Vec<AccessError>,
}

/// Decrypted unmanaged document bytes.
#[derive(Debug)]
pub struct DocumentDecryptUnmanagedResult {
    /// The document's id.
    pub id: DocumentId,
    /// The plaintext.
    pub decrypted_data: Bytes,
    /// The access block that granted access.
    pub access_via: Recipient,
}

/// Successful and failed changes to a document's access list. Both grant
/// and revoke support partial success.
#[derive(Debug, Default)]
pub struct DocumentAccessResult {
    /// Recipients whose access changed.
    pub changed: AccessChange,
    /// Recipients whose change failed, with reasons.
    pub errors: Vec<AccessError>,
}

/// Abbreviated metadata for document listings.
#[derive(Debug, Clone)]
pub struct DocumentListMeta {
    /// The document's id.
    pub id: DocumentId,
    /// Optional name.
    pub name: Option<DocumentName>,
    /// How the requesting user has access.
    pub association: DocumentAssociation,
    /// When the document was created (Unix milliseconds).
    pub created: i64,
    /// When the document was last updated (Unix milliseconds).
    pub last_updated: i64,
}

/// Full metadata for a document.
#[derive(Debug, Clone)]
pub struct DocumentMetadataResult {
    /// The document's id.
    pub id: DocumentId,
    /// Optional name.
    pub name: Option<DocumentName>,
    /// How the requesting user has access.
    pub association: DocumentAssociation,
    /// Users with a direct access block.
    pub visible_to_users: Vec<UserId>,
    /// Groups with an access block.
    pub visible_to_groups: Vec<GroupId>,
    /// When the document was created (Unix milliseconds).
    pub created: i64,
    /// When the document was last updated (Unix milliseconds).
    pub last_updated: i64,
}
