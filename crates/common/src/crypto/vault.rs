//! Confidential storage for registry fields
//!
//! The registry never stores a file's locator or key in the clear. Both are
//! handed to a [`Vault`], which returns an opaque [`SealedHandle`]; getting the
//! value back is a mediated `reveal` that the registry only performs after its
//! own authorization check.
//!
//! [`KeyringVault`] implements this with envelope encryption:
//!
//! 1. Generate a fresh data key for the value
//! 2. Encrypt the value under the data key
//! 3. Wrap the data key under the vault's master key
//! 4. Package as a `SealedHandle` (wrapped_key || sealed value)
//!
//! The master key is the only long-lived secret and is persisted by the
//! caller (see [`Secret::to_pem`]).

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::secret::{Secret, SecretError};
use crate::identity::Identity;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("failed to seal value: {0}")]
    Seal(SecretError),
    /// The handle could not be opened with this vault's keys
    #[error("failed to unseal value: {0}")]
    Unseal(SecretError),
    #[error("malformed sealed handle: {0}")]
    MalformedHandle(String),
}

/// An encrypted registry field, only openable through the vault that sealed it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedHandle {
    /// Identity the value was sealed for at creation time
    sealed_for: Identity,
    /// Data key wrapped under the vault master key
    wrapped_key: Vec<u8>,
    /// The value encrypted under the data key
    sealed: Vec<u8>,
}

impl SealedHandle {
    pub fn sealed_for(&self) -> &Identity {
        &self.sealed_for
    }

    /// Serialize for storage in a ledger backend
    pub fn to_bytes(&self) -> Result<Vec<u8>, VaultError> {
        bincode::serialize(self).map_err(|e| VaultError::MalformedHandle(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        bincode::deserialize(bytes).map_err(|e| VaultError::MalformedHandle(e.to_string()))
    }
}

/// The confidential-compute substrate consumed by the registry
#[async_trait]
pub trait Vault: Send + Sync + Debug + Clone + 'static {
    /// Seal `value` so that only a mediated reveal can recover it
    async fn seal(&self, value: &[u8], authorized: &Identity) -> Result<SealedHandle, VaultError>;

    /// Recover a sealed value on behalf of `requester`
    ///
    /// Callers are expected to have authorized `requester` already; the vault
    ///  itself does not consult the grantee set.
    async fn reveal(
        &self,
        handle: &SealedHandle,
        requester: &Identity,
    ) -> Result<Vec<u8>, VaultError>;
}

/// Envelope-encrypting vault keyed by a single master [`Secret`]
#[derive(Debug, Clone)]
pub struct KeyringVault {
    master: Arc<Secret>,
}

impl KeyringVault {
    pub fn new(master: Secret) -> Self {
        Self {
            master: Arc::new(master),
        }
    }

    /// A vault with a freshly generated master key
    pub fn generate() -> Self {
        Self::new(Secret::generate())
    }

    pub fn master(&self) -> &Secret {
        &self.master
    }
}

#[async_trait]
impl Vault for KeyringVault {
    async fn seal(&self, value: &[u8], authorized: &Identity) -> Result<SealedHandle, VaultError> {
        let data_key = Secret::generate();
        let sealed = data_key.encrypt(value).map_err(VaultError::Seal)?;
        let wrapped_key = self
            .master
            .encrypt(data_key.bytes())
            .map_err(VaultError::Seal)?;

        Ok(SealedHandle {
            sealed_for: authorized.clone(),
            wrapped_key,
            sealed,
        })
    }

    async fn reveal(
        &self,
        handle: &SealedHandle,
        requester: &Identity,
    ) -> Result<Vec<u8>, VaultError> {
        tracing::trace!(
            requester = %requester,
            sealed_for = %handle.sealed_for,
            "revealing sealed value"
        );
        let key_bytes = self
            .master
            .decrypt(&handle.wrapped_key)
            .map_err(VaultError::Unseal)?;
        let data_key = Secret::from_slice(&key_bytes).map_err(VaultError::Unseal)?;
        data_key.decrypt(&handle.sealed).map_err(VaultError::Unseal)
    }
}
