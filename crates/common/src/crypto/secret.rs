//! Per-file symmetric keys
//!
//! A [`Secret`] is the `EncryptionKey` of a single file. It is generated fresh
//! at upload time, never reused across files, and only ever leaves the process
//! sealed inside the registry's vault.
//!
//! Two encryption formats hang off a `Secret`:
//! - **One-shot** ([`Secret::encrypt`]): small values such as locators and
//!   wrapped keys. ChaCha20-Poly1305 over `hash(32) || plaintext`.
//! - **Streamed** ([`Secret::encrypt_stream`], see `stream.rs`): file payloads
//!   of arbitrary size, processed segment by segment.

use std::fmt;
use std::ops::Deref;

use chacha20poly1305::Key;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use serde::{Deserialize, Serialize};

/// Size of ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of ChaCha20-Poly1305 key in bytes (256 bits)
pub const SECRET_SIZE: usize = 32;
/// Size of BLAKE3 hash in bytes (256 bits)
pub const BLAKE3_HASH_SIZE: usize = 32;
/// Size of the Poly1305 authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// PEM tag used when a secret is persisted to disk
pub const SECRET_PEM_TAG: &str = "SEALBOX SECRET";

/// Errors that can occur during encryption/decryption
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret error: {0}")]
    Default(#[from] anyhow::Error),
    /// Wrong key, tampered or truncated ciphertext. Never carries
    ///  partially decrypted data.
    #[error("decryption failed: {0}")]
    DecryptionFailed(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A 256-bit symmetric encryption key
///
/// The key length is fixed and independent of what it encrypts, so the raw
/// bytes double as an opaque token that can be sealed into the registry.
///
/// # Examples
///
/// ```ignore
/// let secret = Secret::generate();
///
/// let ciphertext = secret.encrypt(b"sensitive data")?;
/// let recovered = secret.decrypt(&ciphertext)?;
/// assert_eq!(b"sensitive data", &recovered[..]);
/// ```
#[derive(PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Secret([u8; SECRET_SIZE]);

// Key bytes stay out of logs and panic messages
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

impl Deref for Secret {
    type Target = [u8; SECRET_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

impl Secret {
    /// Generate a new random secret using a cryptographically secure RNG
    pub fn generate() -> Self {
        let mut buff = [0; SECRET_SIZE];
        getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
        Self(buff)
    }

    /// Create a secret from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `SECRET_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, SecretError> {
        if data.len() != SECRET_SIZE {
            return Err(anyhow::anyhow!(
                "invalid secret size, expected {}, got {}",
                SECRET_SIZE,
                data.len()
            )
            .into());
        }
        let mut buff = [0; SECRET_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    /// Get a reference to the secret key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Encode the secret in PEM format for storage on disk
    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new(SECRET_PEM_TAG, self.0.to_vec());
        pem::encode(&pem)
    }

    /// Parse a secret from PEM format
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM is malformed, carries the wrong tag,
    ///  or holds the wrong number of bytes.
    pub fn from_pem(pem_str: &str) -> Result<Self, SecretError> {
        let pem = pem::parse(pem_str).map_err(|e| anyhow::anyhow!("failed to parse PEM: {}", e))?;

        if pem.tag() != SECRET_PEM_TAG {
            return Err(anyhow::anyhow!("invalid PEM tag, expected {}", SECRET_PEM_TAG).into());
        }

        Self::from_slice(pem.contents())
    }

    pub(crate) fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(self.bytes()))
    }

    /// Encrypt a small value using ChaCha20-Poly1305 AEAD
    ///
    /// The output format is: `nonce (12 bytes) || encrypted(hash(32) || plaintext) || auth_tag (16 bytes)`.
    /// A BLAKE3 hash of the plaintext is prepended before encryption and
    ///  re-checked on decrypt. A random nonce is generated for each call.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        let plaintext_hash = blake3::hash(data);

        let mut data_with_hash = Vec::with_capacity(BLAKE3_HASH_SIZE + data.len());
        data_with_hash.extend_from_slice(plaintext_hash.as_bytes());
        data_with_hash.extend_from_slice(data);

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(nonce, data_with_hash.as_ref())
            .map_err(|_| anyhow::anyhow!("encrypt error"))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(nonce.as_ref());
        out.extend_from_slice(ciphertext.as_ref());

        Ok(out)
    }

    /// Decrypt a value produced by [`Secret::encrypt`]
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::DecryptionFailed`] if:
    /// - Data is too short to contain a nonce and tag
    /// - Authentication tag verification fails (data was tampered with or wrong key)
    /// - Hash verification fails
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(SecretError::DecryptionFailed("data too short for nonce"));
        }

        let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);
        let decrypted = self
            .cipher()
            .decrypt(nonce, &data[NONCE_SIZE..])
            .map_err(|_| SecretError::DecryptionFailed("authentication failed"))?;

        if decrypted.len() < BLAKE3_HASH_SIZE {
            return Err(SecretError::DecryptionFailed(
                "decrypted data too short for hash header",
            ));
        }

        let stored_hash = &decrypted[..BLAKE3_HASH_SIZE];
        let plaintext = &decrypted[BLAKE3_HASH_SIZE..];

        let computed_hash = blake3::hash(plaintext);
        if stored_hash != computed_hash.as_bytes() {
            return Err(SecretError::DecryptionFailed("hash verification failed"));
        }

        Ok(plaintext.to_vec())
    }
}
