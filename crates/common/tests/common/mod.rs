//! Shared test utilities for pipeline and registry integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;

use common::crypto::KeyringVault;
use common::identity::Identity;
use common::pipeline::Pipeline;
use common::registry::MemoryFileLedger;
use common::store::{Address, ContentStore, MemoryContentStore, StoreError};

pub type TestPipeline<S = MemoryContentStore> = Pipeline<S, MemoryFileLedger, KeyringVault>;

/// Set up a pipeline over in-memory backends
pub fn setup_test_env() -> TestPipeline {
    setup_with_store(MemoryContentStore::new())
}

pub fn setup_with_store<S: ContentStore>(store: S) -> TestPipeline<S> {
    Pipeline::new(store, MemoryFileLedger::new(), KeyringVault::generate())
}

pub fn alice() -> Identity {
    Identity::from("alice")
}

pub fn bob() -> Identity {
    Identity::from("bob")
}

pub fn carol() -> Identity {
    Identity::from("carol")
}

/// Which fault a [`FaultyStore`] injects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every `put` fails as if the backend were down
    RejectPuts,
    /// `get` reports every blob as missing
    LoseBlobs,
    /// `get` returns the stored bytes with one byte flipped
    FlipByte,
    /// `get` fails as if the backend were down
    FailGets,
}

/// A memory store that misbehaves once armed
#[derive(Debug, Clone)]
pub struct FaultyStore {
    inner: MemoryContentStore,
    fault: Fault,
    armed: Arc<AtomicBool>,
}

impl FaultyStore {
    /// Faults start disarmed so uploads can go through first
    pub fn new(fault: Fault) -> Self {
        Self {
            inner: MemoryContentStore::new(),
            fault,
            armed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn armed(fault: Fault) -> Self {
        let store = Self::new(fault);
        store.arm();
        store
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryContentStore {
        &self.inner
    }

    fn is(&self, fault: Fault) -> bool {
        self.fault == fault && self.armed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for FaultyStore {
    async fn put(&self, data: Vec<u8>) -> Result<Address, StoreError> {
        if self.is(Fault::RejectPuts) {
            return Err(StoreError::Unavailable(anyhow!("disk full")));
        }
        self.inner.put(data).await
    }

    async fn get(&self, address: &Address) -> Result<Bytes, StoreError> {
        if self.is(Fault::LoseBlobs) {
            return Err(StoreError::NotFound(*address));
        }
        if self.is(Fault::FailGets) {
            return Err(StoreError::Unavailable(anyhow!("connection reset")));
        }
        let bytes = self.inner.get(address).await?;
        if self.is(Fault::FlipByte) {
            let mut tampered = bytes.to_vec();
            let last = tampered.len() - 1;
            tampered[last] ^= 0x01;
            return Ok(Bytes::from(tampered));
        }
        Ok(bytes)
    }

    async fn exists(&self, address: &Address) -> bool {
        !self.is(Fault::LoseBlobs) && self.inner.exists(address).await
    }
}
