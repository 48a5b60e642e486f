use std::fmt::Display;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, MutexGuard};

use super::events::RegistryEvent;
use super::file::{File, FileId, FileMetadata, GrantRecord};
use super::ledger::{FileLedger, LedgerError};
use crate::crypto::{SealedHandle, Secret, Vault, VaultError};
use crate::identity::Identity;
use crate::store::Address;

/// Subscribers that fall further behind than this start losing events
const EVENT_CHANNEL_CAPACITY: usize = 256;
/// Grant/revoke locks; files sharing a stripe serialize, others do not
const WRITE_LOCK_STRIPES: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("file not found: {0}")]
    NotFound(FileId),
    #[error("{identity} is not allowed to do this on file {file_id}")]
    Forbidden { file_id: FileId, identity: Identity },
    #[error("{grantee} already has access to file {file_id}")]
    AlreadyGranted { file_id: FileId, grantee: Identity },
    #[error("ledger error: {0}")]
    Ledger(String),
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
    /// A revealed field did not decode to the value type it was sealed as
    #[error("file {0} has a corrupted {1} field")]
    CorruptedField(FileId, &'static str),
}

impl<T: Display> From<LedgerError<T>> for RegistryError {
    fn from(err: LedgerError<T>) -> Self {
        match err {
            LedgerError::FileNotFound(id) => RegistryError::NotFound(id),
            LedgerError::Provider(e) => RegistryError::Ledger(e.to_string()),
        }
    }
}

/// The plaintext locator and key of a file, as revealed to an authorized requester
#[derive(Debug, Clone)]
pub struct Confidential {
    pub locator: Address,
    pub key: Secret,
}

/// Access-control registry
///
/// Owns every [`File`] through its ledger and is the only path to a file's
///  confidential fields: [`Registry::reveal_confidential`] re-checks the owner
///  and grantee set on every call, so a revoke is honored by the next reveal.
///
/// Grant and revoke on the same file hold that file's write lock across the
///  ledger change and the event publish, so subscribers see a file's events
///  in commit order.
#[derive(Debug, Clone)]
pub struct Registry<L: FileLedger, V: Vault> {
    ledger: L,
    vault: V,
    events: broadcast::Sender<RegistryEvent>,
    write_locks: Arc<Vec<Mutex<()>>>,
}

impl<L: FileLedger, V: Vault> Registry<L, V> {
    pub fn new(ledger: L, vault: V) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let write_locks = (0..WRITE_LOCK_STRIPES).map(|_| Mutex::new(())).collect();
        Self {
            ledger,
            vault,
            events,
            write_locks: Arc::new(write_locks),
        }
    }

    async fn write_lock(&self, id: FileId) -> MutexGuard<'_, ()> {
        let stripe = (id % WRITE_LOCK_STRIPES as FileId) as usize;
        self.write_locks[stripe].lock().await
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: RegistryEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }

    async fn load(&self, id: FileId) -> Result<File, RegistryError> {
        self.ledger
            .file(id)
            .await?
            .ok_or(RegistryError::NotFound(id))
    }

    async fn load_owned(&self, id: FileId, by: &Identity) -> Result<File, RegistryError> {
        let file = self.load(id).await?;
        if !file.is_owner(by) {
            tracing::warn!(file_id = id, identity = %by, "rejected non-owner request");
            return Err(RegistryError::Forbidden {
                file_id: id,
                identity: by.clone(),
            });
        }
        Ok(file)
    }

    /// Seal a locator and key for `owner`, ready to hand to [`Registry::create`]
    pub async fn seal_confidential(
        &self,
        owner: &Identity,
        locator: &Address,
        key: &Secret,
    ) -> Result<(SealedHandle, SealedHandle), RegistryError> {
        let enc_locator = self.vault.seal(locator.as_bytes(), owner).await?;
        let enc_key = self.vault.seal(key.bytes(), owner).await?;
        Ok((enc_locator, enc_key))
    }

    /// Register a new file with no grantees
    pub async fn create(
        &self,
        owner: &Identity,
        enc_locator: SealedHandle,
        enc_key: SealedHandle,
    ) -> Result<FileId, RegistryError> {
        let created_at = Utc::now();
        let file_id = self
            .ledger
            .insert(owner, enc_locator, enc_key, created_at)
            .await?;

        tracing::info!(file_id, owner = %owner, "file registered");
        self.publish(RegistryEvent::FileUploaded {
            file_id,
            owner: owner.clone(),
            created_at,
        });
        Ok(file_id)
    }

    /// Share a file with `grantee`. Only the owner may grant.
    ///
    /// Granting to an identity that already has access, the owner included,
    ///  is an [`RegistryError::AlreadyGranted`] error.
    pub async fn grant(
        &self,
        file_id: FileId,
        by: &Identity,
        grantee: &Identity,
    ) -> Result<GrantRecord, RegistryError> {
        let _guard = self.write_lock(file_id).await;
        let file = self.load_owned(file_id, by).await?;

        let granted_at = Utc::now();
        if !self.ledger.add_grantee(file_id, grantee, granted_at).await? {
            return Err(RegistryError::AlreadyGranted {
                file_id,
                grantee: grantee.clone(),
            });
        }

        tracing::info!(file_id, grantee = %grantee, "access granted");
        self.publish(RegistryEvent::FileGranted {
            file_id,
            owner: file.owner().clone(),
            grantee: grantee.clone(),
        });
        Ok(GrantRecord {
            file_id,
            grantee: grantee.clone(),
            granted_at,
        })
    }

    /// Withdraw `grantee`'s access. Only the owner may revoke.
    ///
    /// # Returns
    /// * `Ok(true)` - The grantee was removed
    /// * `Ok(false)` - The grantee had no access; nothing changed
    pub async fn revoke(
        &self,
        file_id: FileId,
        by: &Identity,
        grantee: &Identity,
    ) -> Result<bool, RegistryError> {
        let _guard = self.write_lock(file_id).await;
        let file = self.load_owned(file_id, by).await?;

        if !self.ledger.remove_grantee(file_id, grantee).await? {
            tracing::debug!(file_id, grantee = %grantee, "revoke of absent grantee");
            return Ok(false);
        }

        tracing::info!(file_id, grantee = %grantee, "access revoked");
        self.publish(RegistryEvent::FileGrantRevoked {
            file_id,
            owner: file.owner().clone(),
            grantee: grantee.clone(),
        });
        Ok(true)
    }

    /// Whether `requester` is the owner or a current grantee
    pub async fn authorize(
        &self,
        file_id: FileId,
        requester: &Identity,
    ) -> Result<bool, RegistryError> {
        Ok(self.load(file_id).await?.authorizes(requester))
    }

    /// Unseal a file's locator and key for an authorized requester
    pub async fn reveal_confidential(
        &self,
        file_id: FileId,
        requester: &Identity,
    ) -> Result<Confidential, RegistryError> {
        let file = self.load(file_id).await?;
        if !file.authorizes(requester) {
            tracing::warn!(file_id, requester = %requester, "reveal denied");
            return Err(RegistryError::Forbidden {
                file_id,
                identity: requester.clone(),
            });
        }

        let locator = self.vault.reveal(file.locator(), requester).await?;
        let locator = Address::from_slice(&locator)
            .map_err(|_| RegistryError::CorruptedField(file_id, "locator"))?;

        let key = self.vault.reveal(file.key(), requester).await?;
        let key =
            Secret::from_slice(&key).map_err(|_| RegistryError::CorruptedField(file_id, "key"))?;

        tracing::debug!(file_id, requester = %requester, "confidential fields revealed");
        Ok(Confidential { locator, key })
    }

    /// Ids of the files `owner` uploaded, ascending
    pub async fn list_owned(&self, owner: &Identity) -> Result<Vec<FileId>, RegistryError> {
        Ok(self.ledger.owned_by(owner).await?)
    }

    pub async fn exists(&self, file_id: FileId) -> Result<bool, RegistryError> {
        Ok(self.ledger.file(file_id).await?.is_some())
    }

    pub async fn metadata(&self, file_id: FileId) -> Result<FileMetadata, RegistryError> {
        Ok(self.load(file_id).await?.metadata())
    }

    /// The access list of a file, ordered by grantee. Owner only.
    pub async fn grants(
        &self,
        file_id: FileId,
        by: &Identity,
    ) -> Result<Vec<GrantRecord>, RegistryError> {
        Ok(self.load_owned(file_id, by).await?.grants())
    }

    pub async fn latest_file_id(&self) -> Result<Option<FileId>, RegistryError> {
        Ok(self.ledger.latest_id().await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::KeyringVault;
    use crate::registry::MemoryFileLedger;

    fn registry() -> Registry<MemoryFileLedger, KeyringVault> {
        Registry::new(MemoryFileLedger::new(), KeyringVault::generate())
    }

    async fn create_for(
        registry: &Registry<MemoryFileLedger, KeyringVault>,
        owner: &Identity,
    ) -> (FileId, Address, Secret) {
        let locator = Address::of(b"ciphertext");
        let key = Secret::generate();
        let (l, k) = registry
            .seal_confidential(owner, &locator, &key)
            .await
            .unwrap();
        let id = registry.create(owner, l, k).await.unwrap();
        (id, locator, key)
    }

    #[tokio::test]
    async fn test_owner_reveals_own_file() {
        let registry = registry();
        let alice = Identity::from("alice");
        let (id, locator, key) = create_for(&registry, &alice).await;

        let revealed = registry.reveal_confidential(id, &alice).await.unwrap();
        assert_eq!(revealed.locator, locator);
        assert_eq!(revealed.key, key);
    }

    #[tokio::test]
    async fn test_stranger_is_forbidden() {
        let registry = registry();
        let alice = Identity::from("alice");
        let mallory = Identity::from("mallory");
        let (id, _, _) = create_for(&registry, &alice).await;

        assert!(!registry.authorize(id, &mallory).await.unwrap());
        assert!(matches!(
            registry.reveal_confidential(id, &mallory).await,
            Err(RegistryError::Forbidden { file_id, .. }) if file_id == id
        ));
    }

    #[tokio::test]
    async fn test_grant_then_revoke() {
        let registry = registry();
        let alice = Identity::from("alice");
        let bob = Identity::from("bob");
        let (id, _, key) = create_for(&registry, &alice).await;

        let record = registry.grant(id, &alice, &bob).await.unwrap();
        assert_eq!(record.file_id, id);
        assert_eq!(record.grantee, bob);
        assert_eq!(registry.reveal_confidential(id, &bob).await.unwrap().key, key);

        assert!(registry.revoke(id, &alice, &bob).await.unwrap());
        assert!(!registry.authorize(id, &bob).await.unwrap());
        assert!(matches!(
            registry.reveal_confidential(id, &bob).await,
            Err(RegistryError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_and_owner_grants_rejected() {
        let registry = registry();
        let alice = Identity::from("alice");
        let bob = Identity::from("bob");
        let (id, _, _) = create_for(&registry, &alice).await;

        registry.grant(id, &alice, &bob).await.unwrap();
        assert!(matches!(
            registry.grant(id, &alice, &bob).await,
            Err(RegistryError::AlreadyGranted { .. })
        ));
        assert!(matches!(
            registry.grant(id, &alice, &alice).await,
            Err(RegistryError::AlreadyGranted { .. })
        ));
        assert_eq!(registry.grants(id, &alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_revoke_absent_is_noop() {
        let registry = registry();
        let alice = Identity::from("alice");
        let (id, _, _) = create_for(&registry, &alice).await;
        let mut events = registry.subscribe();

        assert!(!registry
            .revoke(id, &alice, &Identity::from("carol"))
            .await
            .unwrap());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_non_owner_cannot_manage_access() {
        let registry = registry();
        let alice = Identity::from("alice");
        let bob = Identity::from("bob");
        let carol = Identity::from("carol");
        let (id, _, _) = create_for(&registry, &alice).await;
        registry.grant(id, &alice, &bob).await.unwrap();

        assert!(matches!(
            registry.grant(id, &bob, &carol).await,
            Err(RegistryError::Forbidden { .. })
        ));
        assert!(matches!(
            registry.revoke(id, &bob, &bob).await,
            Err(RegistryError::Forbidden { .. })
        ));
        assert!(matches!(
            registry.grants(id, &bob).await,
            Err(RegistryError::Forbidden { .. })
        ));
        assert!(registry.authorize(id, &bob).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_file_is_not_found() {
        let registry = registry();
        let alice = Identity::from("alice");

        assert!(!registry.exists(7).await.unwrap());
        assert!(matches!(
            registry.authorize(7, &alice).await,
            Err(RegistryError::NotFound(7))
        ));
        assert!(matches!(
            registry.grant(7, &alice, &Identity::from("bob")).await,
            Err(RegistryError::NotFound(7))
        ));
        assert!(matches!(
            registry.metadata(7).await,
            Err(RegistryError::NotFound(7))
        ));
        assert_eq!(registry.latest_file_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_metadata_tracks_grants() {
        let registry = registry();
        let alice = Identity::from("alice");
        let (id, _, _) = create_for(&registry, &alice).await;
        registry
            .grant(id, &alice, &Identity::from("bob"))
            .await
            .unwrap();

        let metadata = registry.metadata(id).await.unwrap();
        assert_eq!(metadata.id, id);
        assert_eq!(metadata.owner, alice);
        assert_eq!(metadata.grantee_count, 1);
        assert!(registry.exists(id).await.unwrap());
        assert_eq!(registry.latest_file_id().await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_foreign_vault_cannot_unseal() {
        let alice = Identity::from("alice");
        let sealing = registry();
        let locator = Address::of(b"x");
        let (l, k) = sealing
            .seal_confidential(&alice, &locator, &Secret::generate())
            .await
            .unwrap();

        let other = registry();
        let id = other.create(&alice, l, k).await.unwrap();
        assert!(matches!(
            other.reveal_confidential(id, &alice).await,
            Err(RegistryError::Vault(VaultError::Unseal(_)))
        ));
    }

    #[tokio::test]
    async fn test_wrong_length_locator_is_corrupted() {
        let registry = registry();
        let alice = Identity::from("alice");
        let bad_locator = registry.vault().seal(b"short", &alice).await.unwrap();
        let key = registry
            .vault()
            .seal(Secret::generate().bytes(), &alice)
            .await
            .unwrap();
        let id = registry.create(&alice, bad_locator, key).await.unwrap();

        assert!(matches!(
            registry.reveal_confidential(id, &alice).await,
            Err(RegistryError::CorruptedField(_, "locator"))
        ));
    }
}
