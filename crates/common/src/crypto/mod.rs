//! Cryptographic primitives for Sealbox
//!
//! - **Per-file keys**: every uploaded file gets its own random 256-bit [`Secret`]
//! - **Payload encryption**: ChaCha20-Poly1305 STREAM, segment-authenticated,
//!   so tampering and truncation surface as [`SecretError::DecryptionFailed`]
//! - **Confidential fields**: the registry stores locators and keys only as
//!   [`SealedHandle`]s produced by a [`Vault`]
//!
//! # Security Model
//!
//! ## Content Encryption
//! Files are encrypted client-side before they reach the blob store, so the
//! store (and its content addresses) only ever sees ciphertext. A fresh nonce
//! per encryption means identical plaintexts never produce identical blobs.
//!
//! ## Key Custody
//! A file's key and locator are sealed by the vault at upload time. Revealing
//! them is mediated by the registry, which checks the owner and grantee set on
//! every request. Revoking a grantee therefore takes effect on the next reveal.

mod secret;
mod stream;
mod vault;

pub use secret::{Secret, SecretError, BLAKE3_HASH_SIZE, SECRET_SIZE};
pub use stream::{sealed_len, SEGMENT_SIZE, STREAM_NONCE_SIZE};
pub use vault::{KeyringVault, SealedHandle, Vault, VaultError};
