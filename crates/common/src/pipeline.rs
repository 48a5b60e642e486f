use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::crypto::{sealed_len, Secret, SecretError, Vault, VaultError};
use crate::identity::Identity;
use crate::registry::{
    FileId, FileLedger, FileMetadata, GrantRecord, Registry, RegistryError, RegistryEvent,
};
use crate::store::{Address, ContentStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The blob store or ledger backend failed
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("file not found: {0}")]
    NotFound(FileId),
    /// The registry points at a blob that is missing or does not hash to its address
    #[error("file {file_id} references a missing or corrupted blob {address}")]
    CorruptedReference { file_id: FileId, address: Address },
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("{identity} is not allowed to do this on file {file_id}")]
    Forbidden { file_id: FileId, identity: Identity },
    #[error("{grantee} already has access to file {file_id}")]
    AlreadyGranted { file_id: FileId, grantee: Identity },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RegistryError> for PipelineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => PipelineError::NotFound(id),
            RegistryError::Forbidden { file_id, identity } => {
                PipelineError::Forbidden { file_id, identity }
            }
            RegistryError::AlreadyGranted { file_id, grantee } => {
                PipelineError::AlreadyGranted { file_id, grantee }
            }
            RegistryError::Ledger(e) => PipelineError::StorageUnavailable(e),
            RegistryError::Vault(e) => e.into(),
            RegistryError::CorruptedField(id, field) => PipelineError::DecryptionFailed(format!(
                "file {} has a corrupted {} field",
                id, field
            )),
        }
    }
}

impl From<VaultError> for PipelineError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Unseal(_) | VaultError::MalformedHandle(_) => {
                PipelineError::DecryptionFailed(err.to_string())
            }
            VaultError::Seal(_) => PipelineError::EncryptionFailed(err.to_string()),
        }
    }
}

fn encryption_error(err: SecretError) -> PipelineError {
    match err {
        SecretError::Io(e) => PipelineError::Io(e),
        other => PipelineError::EncryptionFailed(other.to_string()),
    }
}

fn decryption_error(file_id: FileId, err: SecretError) -> PipelineError {
    match err {
        SecretError::Io(e) => PipelineError::Io(e),
        SecretError::DecryptionFailed(reason) => {
            tracing::warn!(file_id, "payload failed authentication");
            PipelineError::DecryptionFailed(reason.to_string())
        }
        other => PipelineError::DecryptionFailed(other.to_string()),
    }
}

fn join_error(err: tokio::task::JoinError) -> PipelineError {
    PipelineError::Io(std::io::Error::other(err))
}

/// Sibling path the plaintext is written to before it is moved into place
fn partial_path(path: &Path) -> PathBuf {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    PathBuf::from(partial)
}

/// Decrypt `ciphertext` into `path` through a partial file
///
/// The partial file is only renamed over `path` once the final segment has
///  authenticated; on any failure it is removed and `path` is untouched.
fn decrypt_to_path(
    file_id: FileId,
    key: &Secret,
    ciphertext: &[u8],
    path: &Path,
) -> Result<u64, PipelineError> {
    let partial = partial_path(path);
    let result = fs::File::create(&partial)
        .map_err(PipelineError::from)
        .and_then(|out| {
            key.decrypt_stream(ciphertext, BufWriter::new(out))
                .map_err(|e| decryption_error(file_id, e))
        })
        .and_then(|written| {
            fs::rename(&partial, path)?;
            Ok(written)
        });

    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

/// Encrypt, store and register files; and the reverse
///
/// The pipeline holds no state of its own. Plaintext, keys and locators only
///  live for the duration of a call.
#[derive(Debug, Clone)]
pub struct Pipeline<S: ContentStore, L: FileLedger, V: Vault> {
    store: S,
    registry: Registry<L, V>,
}

impl<S: ContentStore, L: FileLedger, V: Vault> Pipeline<S, L, V> {
    pub fn new(store: S, ledger: L, vault: V) -> Self {
        Self {
            store,
            registry: Registry::new(ledger, vault),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &Registry<L, V> {
        &self.registry
    }

    /// Encrypt `data` under a fresh key, store the ciphertext and register it
    ///  under `owner`
    ///
    /// A failure before registration leaves no registry entry. A failure while
    ///  registering can leave an unreferenced blob behind.
    pub async fn upload(&self, data: &[u8], owner: &Identity) -> Result<FileId, PipelineError> {
        let key = Secret::generate();
        let ciphertext = key.encrypt_payload(data).map_err(encryption_error)?;
        self.register(ciphertext, key, data.len() as u64, owner)
            .await
    }

    async fn register(
        &self,
        ciphertext: Vec<u8>,
        key: Secret,
        plaintext_len: u64,
        owner: &Identity,
    ) -> Result<FileId, PipelineError> {
        let ciphertext_len = ciphertext.len();

        let address = self.store.put(ciphertext).await.map_err(|e| {
            tracing::warn!(owner = %owner, "blob store rejected upload: {}", e);
            PipelineError::StorageUnavailable(e.to_string())
        })?;

        let (enc_locator, enc_key) = self
            .registry
            .seal_confidential(owner, &address, &key)
            .await?;
        let file_id = self.registry.create(owner, enc_locator, enc_key).await?;

        tracing::info!(
            file_id,
            owner = %owner,
            plaintext_len,
            ciphertext_len,
            "uploaded file"
        );
        Ok(file_id)
    }

    /// Reveal a file's key and fetch its verified ciphertext
    async fn fetch(
        &self,
        file_id: FileId,
        requester: &Identity,
    ) -> Result<(Secret, Bytes), PipelineError> {
        let confidential = self
            .registry
            .reveal_confidential(file_id, requester)
            .await?;
        let address = confidential.locator;

        let ciphertext = match self.store.get(&address).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(file_id, %address, "registered blob is missing");
                return Err(PipelineError::CorruptedReference { file_id, address });
            }
            Err(StoreError::Unavailable(e)) => {
                return Err(PipelineError::StorageUnavailable(e.to_string()))
            }
        };

        if !address.verify(&ciphertext) {
            tracing::warn!(file_id, %address, "fetched blob does not match its address");
            return Err(PipelineError::CorruptedReference { file_id, address });
        }

        Ok((confidential.key, ciphertext))
    }

    /// Fetch and decrypt a file on behalf of `requester`
    pub async fn download(
        &self,
        file_id: FileId,
        requester: &Identity,
    ) -> Result<Vec<u8>, PipelineError> {
        let (key, ciphertext) = self.fetch(file_id, requester).await?;
        let plaintext = key
            .decrypt_payload(&ciphertext)
            .map_err(|e| decryption_error(file_id, e))?;

        tracing::debug!(file_id, requester = %requester, "downloaded file");
        Ok(plaintext)
    }

    /// Stream a file from disk through the cipher and upload it
    ///
    /// The plaintext is never held in memory as a whole.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        owner: &Identity,
    ) -> Result<FileId, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let key = Secret::generate();

        let (ciphertext, plaintext_len) = {
            let key = key.clone();
            tokio::task::spawn_blocking(move || -> Result<(Vec<u8>, u64), PipelineError> {
                let file = fs::File::open(&path)?;
                let plaintext_len = file.metadata()?.len();
                let mut ciphertext = Vec::with_capacity(sealed_len(plaintext_len as usize));
                key.encrypt_stream(BufReader::new(file), &mut ciphertext)
                    .map_err(encryption_error)?;
                Ok((ciphertext, plaintext_len))
            })
            .await
            .map_err(join_error)??
        };

        self.register(ciphertext, key, plaintext_len, owner).await
    }

    /// Download a file and write the plaintext to `path`
    ///
    /// Segments are decrypted straight to disk. Nothing appears at `path`
    ///  unless the whole file authenticates.
    pub async fn download_to(
        &self,
        file_id: FileId,
        requester: &Identity,
        path: impl AsRef<Path>,
    ) -> Result<u64, PipelineError> {
        let (key, ciphertext) = self.fetch(file_id, requester).await?;
        let path = path.as_ref().to_path_buf();

        let written = tokio::task::spawn_blocking(move || {
            decrypt_to_path(file_id, &key, &ciphertext, &path)
        })
        .await
        .map_err(join_error)??;

        tracing::debug!(file_id, requester = %requester, written, "downloaded file to disk");
        Ok(written)
    }

    pub async fn grant(
        &self,
        file_id: FileId,
        by: &Identity,
        grantee: &Identity,
    ) -> Result<GrantRecord, PipelineError> {
        Ok(self.registry.grant(file_id, by, grantee).await?)
    }

    pub async fn revoke(
        &self,
        file_id: FileId,
        by: &Identity,
        grantee: &Identity,
    ) -> Result<bool, PipelineError> {
        Ok(self.registry.revoke(file_id, by, grantee).await?)
    }

    pub async fn list_owned(&self, owner: &Identity) -> Result<Vec<FileId>, PipelineError> {
        Ok(self.registry.list_owned(owner).await?)
    }

    pub async fn grants(
        &self,
        file_id: FileId,
        by: &Identity,
    ) -> Result<Vec<GrantRecord>, PipelineError> {
        Ok(self.registry.grants(file_id, by).await?)
    }

    pub async fn metadata(&self, file_id: FileId) -> Result<FileMetadata, PipelineError> {
        Ok(self.registry.metadata(file_id).await?)
    }

    pub async fn exists(&self, file_id: FileId) -> Result<bool, PipelineError> {
        Ok(self.registry.exists(file_id).await?)
    }

    pub async fn latest_file_id(&self) -> Result<Option<FileId>, PipelineError> {
        Ok(self.registry.latest_file_id().await?)
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RegistryEvent> {
        self.registry.subscribe()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::KeyringVault;
    use crate::registry::MemoryFileLedger;
    use crate::store::MemoryContentStore;

    type MemoryPipeline = Pipeline<MemoryContentStore, MemoryFileLedger, KeyringVault>;

    fn pipeline() -> MemoryPipeline {
        Pipeline::new(
            MemoryContentStore::new(),
            MemoryFileLedger::new(),
            KeyringVault::generate(),
        )
    }

    #[tokio::test]
    async fn test_store_only_sees_ciphertext() {
        let pipeline = pipeline();
        let alice = Identity::from("alice");
        let id = pipeline.upload(b"plain words", &alice).await.unwrap();

        assert_eq!(pipeline.store().len(), 1);
        assert!(!pipeline.store().exists(&Address::of(b"plain words")).await);
        assert_eq!(pipeline.download(id, &alice).await.unwrap(), b"plain words");
    }

    #[tokio::test]
    async fn test_same_content_twice_gives_two_files() {
        let pipeline = pipeline();
        let alice = Identity::from("alice");
        let first = pipeline.upload(b"dup", &alice).await.unwrap();
        let second = pipeline.upload(b"dup", &alice).await.unwrap();

        assert_ne!(first, second);
        // fresh key and nonce per upload, so two distinct blobs
        assert_eq!(pipeline.store().len(), 2);
        assert_eq!(pipeline.list_owned(&alice).await.unwrap(), vec![first, second]);
    }

    #[tokio::test]
    async fn test_download_to_writes_plaintext() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let source = temp_dir.path().join("in.txt");
        let target = temp_dir.path().join("out.txt");
        tokio::fs::write(&source, b"on disk").await.unwrap();

        let pipeline = pipeline();
        let alice = Identity::from("alice");
        let id = pipeline.upload_file(&source, &alice).await.unwrap();
        let written = pipeline.download_to(id, &alice, &target).await.unwrap();

        assert_eq!(written, 7);
        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"on disk");
    }

    #[tokio::test]
    async fn test_forbidden_download_writes_nothing() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let target = temp_dir.path().join("out.txt");

        let pipeline = pipeline();
        let id = pipeline
            .upload(b"secret", &Identity::from("alice"))
            .await
            .unwrap();

        let result = pipeline
            .download_to(id, &Identity::from("mallory"), &target)
            .await;
        assert!(matches!(result, Err(PipelineError::Forbidden { .. })));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_upload_missing_path_is_io_error() {
        let pipeline = pipeline();
        let result = pipeline
            .upload_file("/definitely/not/here", &Identity::from("alice"))
            .await;

        assert!(matches!(result, Err(PipelineError::Io(_))));
        assert_eq!(pipeline.latest_file_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_round_trip_across_segments() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let source = temp_dir.path().join("big.bin");
        let target = temp_dir.path().join("big.out");
        let data: Vec<u8> = (0..2 * crate::crypto::SEGMENT_SIZE + 5)
            .map(|i| (i % 241) as u8)
            .collect();
        tokio::fs::write(&source, &data).await.unwrap();

        let pipeline = pipeline();
        let alice = Identity::from("alice");
        let id = pipeline.upload_file(&source, &alice).await.unwrap();

        assert_eq!(pipeline.download(id, &alice).await.unwrap(), data);
        let written = pipeline.download_to(id, &alice, &target).await.unwrap();
        assert_eq!(written, data.len() as u64);
        assert_eq!(tokio::fs::read(&target).await.unwrap(), data);
        assert!(!partial_path(&target).exists());
    }

    #[tokio::test]
    async fn test_failed_decrypt_leaves_no_file_behind() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let target = temp_dir.path().join("out.bin");

        let pipeline = pipeline();
        let alice = Identity::from("alice");
        let data = vec![7u8; crate::crypto::SEGMENT_SIZE + 1];
        let address = pipeline
            .store()
            .put(Secret::generate().encrypt_payload(&data).unwrap())
            .await
            .unwrap();
        let (locator, key) = pipeline
            .registry()
            .seal_confidential(&alice, &address, &Secret::generate())
            .await
            .unwrap();
        let id = pipeline.registry().create(&alice, locator, key).await.unwrap();

        let result = pipeline.download_to(id, &alice, &target).await;
        assert!(matches!(result, Err(PipelineError::DecryptionFailed(_))));
        assert!(!target.exists());
        assert!(!partial_path(&target).exists());
    }

    #[test]
    fn test_partial_path_is_a_sibling() {
        let partial = partial_path(Path::new("/tmp/out/file-1"));
        assert_eq!(partial, PathBuf::from("/tmp/out/file-1.partial"));
    }
}
