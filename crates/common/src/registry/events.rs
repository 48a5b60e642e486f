use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::file::FileId;
use crate::identity::Identity;

/// Notifications published by the registry after a ledger change commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    FileUploaded {
        file_id: FileId,
        owner: Identity,
        created_at: DateTime<Utc>,
    },
    FileGranted {
        file_id: FileId,
        owner: Identity,
        grantee: Identity,
    },
    FileGrantRevoked {
        file_id: FileId,
        owner: Identity,
        grantee: Identity,
    },
}

impl RegistryEvent {
    pub fn file_id(&self) -> FileId {
        match self {
            RegistryEvent::FileUploaded { file_id, .. }
            | RegistryEvent::FileGranted { file_id, .. }
            | RegistryEvent::FileGrantRevoked { file_id, .. } => *file_id,
        }
    }
}
