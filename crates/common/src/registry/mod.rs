//! Access-control registry
//!
//! Maps a [`FileId`] to its owner, the sealed locator and key of its blob, and
//! the set of identities the owner has shared it with.
//!
//! Records live in a [`FileLedger`]:
//! - [`MemoryFileLedger`]: per-file locks in process memory
//! - the SQLite ledger in the `sealbox` app crate
//!
//! [`Registry`] enforces the rules on top of any ledger:
//! only the owner grants, revokes or lists grants; the owner is never a
//! grantee; and every reveal re-checks the grantee set.

mod events;
mod file;
mod ledger;
mod memory;
#[allow(clippy::module_inception)]
mod registry;

pub use events::RegistryEvent;
pub use file::{File, FileId, FileMetadata, GrantRecord};
pub use ledger::{FileLedger, LedgerError};
pub use memory::{MemoryFileLedger, MemoryFileLedgerError};
pub use registry::{Confidential, Registry, RegistryError};
