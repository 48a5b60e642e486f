use std::fmt::{Debug, Display};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::file::{File, FileId};
use crate::crypto::SealedHandle;
use crate::identity::Identity;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError<T> {
    #[error("unhandled ledger provider error: {0}")]
    Provider(#[from] T),
    #[error("file not found: {0}")]
    FileNotFound(FileId),
}

/// Authoritative storage for registry files and their grantee sets
///
/// Implementations must make each write atomic: an `insert` either lands
///  whole or not at all, and `add_grantee`/`remove_grantee` on one file are
///  serialized against each other and against `file` reads of that file.
#[async_trait]
pub trait FileLedger: Send + Sync + Debug + Clone + 'static {
    type Error: Display + Debug + Send + Sync + 'static;

    /// Allocate the next file id and store a file with no grantees
    ///
    /// # Returns
    /// * `Ok(FileId)` - The id of the new file, greater than every id issued before
    async fn insert(
        &self,
        owner: &Identity,
        locator: SealedHandle,
        key: SealedHandle,
        created_at: DateTime<Utc>,
    ) -> Result<FileId, LedgerError<Self::Error>>;

    /// Snapshot of a file, including its current grantees
    async fn file(&self, id: FileId) -> Result<Option<File>, LedgerError<Self::Error>>;

    /// Add `grantee` to the file's set
    ///
    /// # Returns
    /// * `Ok(true)` - The grantee was added
    /// * `Ok(false)` - The grantee was already present
    /// * `Err(LedgerError::FileNotFound)` - No such file
    async fn add_grantee(
        &self,
        id: FileId,
        grantee: &Identity,
        granted_at: DateTime<Utc>,
    ) -> Result<bool, LedgerError<Self::Error>>;

    /// Remove `grantee` from the file's set
    ///
    /// # Returns
    /// * `Ok(true)` - The grantee was removed
    /// * `Ok(false)` - The grantee was not present
    /// * `Err(LedgerError::FileNotFound)` - No such file
    async fn remove_grantee(
        &self,
        id: FileId,
        grantee: &Identity,
    ) -> Result<bool, LedgerError<Self::Error>>;

    /// Ids of all files owned by `owner`, ascending
    async fn owned_by(&self, owner: &Identity) -> Result<Vec<FileId>, LedgerError<Self::Error>>;

    /// The most recently issued id, if any file exists
    async fn latest_id(&self) -> Result<Option<FileId>, LedgerError<Self::Error>>;
}
