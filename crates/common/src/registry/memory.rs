use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::file::{File, FileId};
use super::ledger::{FileLedger, LedgerError};
use crate::crypto::SealedHandle;
use crate::identity::Identity;

/// In-memory file ledger
///
/// Each file sits behind its own lock, so grant/revoke traffic on one file
///  never waits on another. The table lock is only held to look a file up or
///  to register a new one.
#[derive(Debug, Clone)]
pub struct MemoryFileLedger {
    inner: Arc<RwLock<MemoryFileLedgerInner>>,
}

#[derive(Debug, Default)]
struct MemoryFileLedgerInner {
    /// file_id -> record
    files: BTreeMap<FileId, Arc<RwLock<File>>>,
    /// owner -> owned file ids
    by_owner: HashMap<Identity, BTreeSet<FileId>>,
    /// Last id handed out; 0 means none yet
    last_id: FileId,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryFileLedgerError {
    #[error("memory ledger error: {0}")]
    Internal(String),
}

impl MemoryFileLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryFileLedgerInner::default())),
        }
    }

    fn entry(&self, id: FileId) -> Result<Arc<RwLock<File>>, LedgerError<MemoryFileLedgerError>> {
        let inner = self.inner.read().map_err(|e| poisoned("read", e))?;

        inner
            .files
            .get(&id)
            .cloned()
            .ok_or(LedgerError::FileNotFound(id))
    }
}

impl Default for MemoryFileLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(what: &str, e: E) -> LedgerError<MemoryFileLedgerError> {
    LedgerError::Provider(MemoryFileLedgerError::Internal(format!(
        "failed to acquire {} lock: {}",
        what, e
    )))
}

#[async_trait]
impl FileLedger for MemoryFileLedger {
    type Error = MemoryFileLedgerError;

    async fn insert(
        &self,
        owner: &Identity,
        locator: SealedHandle,
        key: SealedHandle,
        created_at: DateTime<Utc>,
    ) -> Result<FileId, LedgerError<Self::Error>> {
        let mut inner = self.inner.write().map_err(|e| poisoned("write", e))?;

        let id = inner.last_id + 1;
        let file = File::new(id, owner.clone(), locator, key, created_at);

        inner.files.insert(id, Arc::new(RwLock::new(file)));
        inner
            .by_owner
            .entry(owner.clone())
            .or_default()
            .insert(id);
        inner.last_id = id;

        Ok(id)
    }

    async fn file(&self, id: FileId) -> Result<Option<File>, LedgerError<Self::Error>> {
        let entry = match self.entry(id) {
            Ok(entry) => entry,
            Err(LedgerError::FileNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let file = entry.read().map_err(|e| poisoned("file read", e))?;
        Ok(Some(file.clone()))
    }

    async fn add_grantee(
        &self,
        id: FileId,
        grantee: &Identity,
        granted_at: DateTime<Utc>,
    ) -> Result<bool, LedgerError<Self::Error>> {
        let entry = self.entry(id)?;
        let mut file = entry.write().map_err(|e| poisoned("file write", e))?;
        Ok(file.add_grantee(grantee, granted_at))
    }

    async fn remove_grantee(
        &self,
        id: FileId,
        grantee: &Identity,
    ) -> Result<bool, LedgerError<Self::Error>> {
        let entry = self.entry(id)?;
        let mut file = entry.write().map_err(|e| poisoned("file write", e))?;
        Ok(file.remove_grantee(grantee))
    }

    async fn owned_by(&self, owner: &Identity) -> Result<Vec<FileId>, LedgerError<Self::Error>> {
        let inner = self.inner.read().map_err(|e| poisoned("read", e))?;
        Ok(inner
            .by_owner
            .get(owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn latest_id(&self) -> Result<Option<FileId>, LedgerError<Self::Error>> {
        let inner = self.inner.read().map_err(|e| poisoned("read", e))?;
        Ok((inner.last_id > 0).then_some(inner.last_id))
    }
}
