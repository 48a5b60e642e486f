/**
 * Cryptographic types and operations.
 *  - Per-file symmetric keys and streamed
 *    authenticated payload encryption
 *  - The vault that seals registry fields
 */
pub mod crypto;
/**
 * Opaque identities of owners, grantees
 *  and requesters.
 */
pub mod identity;
/**
 * The composition layer: encrypt, store and
 *  register on upload; reveal, fetch, verify
 *  and decrypt on download.
 */
pub mod pipeline;
/**
 * The access-control registry and the
 *  ledger providers that persist it.
 */
pub mod registry;
/**
 * Content-addressed blob storage.
 *  In memory, or a light wrapper around
 *  an iroh-blobs store.
 */
pub mod store;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::crypto::{KeyringVault, SealedHandle, Secret, Vault};
    pub use crate::identity::Identity;
    pub use crate::pipeline::{Pipeline, PipelineError};
    pub use crate::registry::{
        FileId, FileLedger, FileMetadata, GrantRecord, MemoryFileLedger, Registry,
        RegistryError, RegistryEvent,
    };
    pub use crate::store::{Address, BlobsStore, ContentStore, MemoryContentStore, StoreError};
    pub use crate::version::BuildInfo;
}
