use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::{Address, ContentStore, StoreError};

/// In-memory content store using a HashMap
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    inner: Arc<RwLock<HashMap<Address, Bytes>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs held
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Sum of the sizes of all stored blobs
    pub fn total_bytes(&self) -> usize {
        self.inner.read().values().map(Bytes::len).sum()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, data: Vec<u8>) -> Result<Address, StoreError> {
        let address = Address::of(&data);

        if self.inner.read().contains_key(&address) {
            tracing::debug!(%address, "blob already stored");
            return Ok(address);
        }

        // a racing put of the same bytes may have landed in between;
        //  or_insert keeps whichever copy got there first
        self.inner
            .write()
            .entry(address)
            .or_insert_with(|| Bytes::from(data));

        tracing::debug!(%address, "stored blob");
        Ok(address)
    }

    async fn get(&self, address: &Address) -> Result<Bytes, StoreError> {
        self.inner
            .read()
            .get(address)
            .cloned()
            .ok_or(StoreError::NotFound(*address))
    }

    async fn exists(&self, address: &Address) -> bool {
        self.inner.read().contains_key(address)
    }
}
