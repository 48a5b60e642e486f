//! Content-addressed blob storage
//!
//! Blobs are immutable and named by [`Address`] (the BLAKE3 hash of their
//! bytes). Storing the same bytes twice is a no-op that returns the same
//! address, so concurrent or repeated `put`s of one blob converge without a
//! store-wide lock.
//!
//! Two backends implement [`ContentStore`]:
//! - [`MemoryContentStore`]: a map in process memory, for tests and ephemeral use
//! - [`BlobsStore`]: iroh-blobs, in memory or on disk

mod address;
mod blobs;
mod memory;

use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

pub use address::{Address, AddressError, ADDRESS_SIZE};
pub use blobs::BlobsStore;
pub use memory::MemoryContentStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No blob was ever stored under this address
    #[error("blob not found: {0}")]
    NotFound(Address),
    /// Backend fault; surfaced as-is, never retried here
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] anyhow::Error),
}

#[async_trait]
pub trait ContentStore: Send + Sync + Debug + Clone + 'static {
    /// Store `data` under its content address and return the address
    async fn put(&self, data: Vec<u8>) -> Result<Address, StoreError>;

    /// Fetch the bytes stored under `address`
    async fn get(&self, address: &Address) -> Result<Bytes, StoreError>;

    /// Whether a blob is stored under `address`
    async fn exists(&self, address: &Address) -> bool;
}
