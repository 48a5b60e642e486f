use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::SealedHandle;
use crate::identity::Identity;

/// Registry-assigned file identifier; starts at 1 and only grows
pub type FileId = u64;

/// A registry record binding an owner, the sealed locator and key of one
///  uploaded blob, and the identities the owner has shared it with.
///
/// Everything except `grantees` is fixed at creation. Re-uploading the same
///  content creates a new `File`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    id: FileId,
    owner: Identity,
    /// Sealed blob address
    locator: SealedHandle,
    /// Sealed encryption key
    key: SealedHandle,
    created_at: DateTime<Utc>,
    /// Grantee -> time of grant. Never contains the owner.
    grantees: BTreeMap<Identity, DateTime<Utc>>,
}

impl File {
    pub fn new(
        id: FileId,
        owner: Identity,
        locator: SealedHandle,
        key: SealedHandle,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            locator,
            key,
            created_at,
            grantees: BTreeMap::new(),
        }
    }

    /// Rebuild a record with its grantee set, e.g. when loading from a database.
    ///  Entries naming the owner are dropped.
    pub fn with_grantees(
        mut self,
        grantees: impl IntoIterator<Item = (Identity, DateTime<Utc>)>,
    ) -> Self {
        let owner = self.owner.clone();
        self.grantees
            .extend(grantees.into_iter().filter(|(g, _)| *g != owner));
        self
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn locator(&self) -> &SealedHandle {
        &self.locator
    }

    pub fn key(&self) -> &SealedHandle {
        &self.key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn grantees(&self) -> impl Iterator<Item = &Identity> {
        self.grantees.keys()
    }

    pub fn is_owner(&self, identity: &Identity) -> bool {
        self.owner == *identity
    }

    pub fn is_grantee(&self, identity: &Identity) -> bool {
        self.grantees.contains_key(identity)
    }

    /// Owner or grantee
    pub fn authorizes(&self, identity: &Identity) -> bool {
        self.is_owner(identity) || self.is_grantee(identity)
    }

    /// Grant records ordered by grantee
    pub fn grants(&self) -> Vec<GrantRecord> {
        self.grantees
            .iter()
            .map(|(grantee, granted_at)| GrantRecord {
                file_id: self.id,
                grantee: grantee.clone(),
                granted_at: *granted_at,
            })
            .collect()
    }

    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            id: self.id,
            owner: self.owner.clone(),
            created_at: self.created_at,
            grantee_count: self.grantees.len(),
        }
    }

    /// Returns false if `grantee` was already present or is the owner
    pub(crate) fn add_grantee(&mut self, grantee: &Identity, granted_at: DateTime<Utc>) -> bool {
        if self.is_owner(grantee) || self.is_grantee(grantee) {
            return false;
        }
        self.grantees.insert(grantee.clone(), granted_at);
        true
    }

    /// Returns false if `grantee` was not present
    pub(crate) fn remove_grantee(&mut self, grantee: &Identity) -> bool {
        self.grantees.remove(grantee).is_some()
    }
}

/// One entry of a file's access list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub file_id: FileId,
    pub grantee: Identity,
    pub granted_at: DateTime<Utc>,
}

/// The non-confidential view of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub id: FileId,
    pub owner: Identity,
    pub created_at: DateTime<Utc>,
    pub grantee_count: usize,
}
