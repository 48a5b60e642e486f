use std::future::IntoFuture;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use iroh_blobs::{
    api::blobs::{BlobStatus, Blobs},
    store::{fs::FsStore, mem::MemStore},
    BlobsProtocol, Hash,
};

use super::{Address, ContentStore, StoreError};

/// Content store over a local iroh-blobs store.
///  iroh-blobs hashes with BLAKE3, so its hashes and our
///  addresses are the same 32 bytes.
#[derive(Clone, Debug)]
pub struct BlobsStore {
    pub inner: Arc<BlobsProtocol>,
}

impl Deref for BlobsStore {
    type Target = Arc<BlobsProtocol>;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl BlobsStore {
    /// Load a blob store from the given path on disk
    pub async fn fs(path: &Path) -> Result<Self, StoreError> {
        tracing::debug!("BlobsStore::fs called with path: {:?}", path);
        let store = FsStore::load(path)
            .await
            .map_err(|e| anyhow!("failed to load blob store at {:?}: {}", path, e))?;
        let blobs = BlobsProtocol::new(&store, None);
        Ok(Self {
            inner: Arc::new(blobs),
        })
    }

    /// Load a memory blobs store
    pub async fn memory() -> Result<Self, StoreError> {
        let store = MemStore::new();
        let blobs = BlobsProtocol::new(&store, None);
        Ok(Self {
            inner: Arc::new(blobs),
        })
    }

    /// Get a handle to the underlying blobs client against
    ///  the store
    pub fn blobs(&self) -> &Blobs {
        self.inner.store().blobs()
    }

    /// Whether the blob is fully present locally
    pub async fn stat(&self, hash: &Hash) -> Result<bool, StoreError> {
        let stat = self
            .blobs()
            .status(*hash)
            .await
            .map_err(|err| anyhow!("blob status error: {}", err))?;
        Ok(matches!(stat, BlobStatus::Complete { .. }))
    }
}

#[async_trait]
impl ContentStore for BlobsStore {
    async fn put(&self, data: Vec<u8>) -> Result<Address, StoreError> {
        let hash = self
            .blobs()
            .add_bytes(data)
            .into_future()
            .await
            .map_err(|e| anyhow!("failed to add blob: {}", e))?
            .hash;
        let address = Address::from(hash);
        tracing::debug!(%address, "stored blob");
        Ok(address)
    }

    async fn get(&self, address: &Address) -> Result<Bytes, StoreError> {
        let hash = Hash::from(*address);
        if !self.stat(&hash).await? {
            return Err(StoreError::NotFound(*address));
        }
        let bytes = self
            .blobs()
            .get_bytes(hash)
            .await
            .map_err(|e| anyhow!("failed to read blob {}: {}", address, e))?;
        Ok(bytes)
    }

    async fn exists(&self, address: &Address) -> bool {
        match self.stat(&Hash::from(*address)).await {
            Ok(present) => present,
            Err(e) => {
                tracing::warn!(%address, "blob status lookup failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_memory_put_get() {
        let store = BlobsStore::memory().await.unwrap();
        let address = store.put(b"ciphertext".to_vec()).await.unwrap();

        assert_eq!(address, Address::of(b"ciphertext"));
        assert!(store.exists(&address).await);
        assert_eq!(store.get(&address).await.unwrap().as_ref(), b"ciphertext");
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let store = BlobsStore::memory().await.unwrap();
        let missing = Address::of(b"not here");

        assert!(!store.exists(&missing).await);
        assert!(matches!(
            store.get(&missing).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_store_put_twice() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let store = BlobsStore::fs(&temp_dir.path().join("blobs")).await.unwrap();

        let first = store.put(b"durable".to_vec()).await.unwrap();
        let second = store.put(b"durable".to_vec()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.get(&first).await.unwrap().as_ref(), b"durable");
    }
}
