//! Segmented payload encryption
//!
//! File payloads use ChaCha20-Poly1305 in the STREAM construction
//! (big-endian 32-bit segment counter plus a last-segment flag folded into
//! the nonce). Each segment carries its own tag, so memory use is bounded by
//! one segment no matter how large the file is, and dropping, reordering or
//! truncating segments is caught at decrypt time.
//!
//! ```text
//! [ nonce prefix: 7 ][ seg 0: SEGMENT_SIZE + 16 ] ... [ last seg: < SEGMENT_SIZE + 16 ]
//! ```
//!
//! The final segment always holds fewer than `SEGMENT_SIZE` plaintext bytes
//! (possibly zero), which is how the reader tells it apart.

use std::io::{ErrorKind, Read, Write};

use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::aead::stream::{DecryptorBE32, EncryptorBE32};

use super::secret::{Secret, SecretError, TAG_SIZE};

/// Size of the random nonce prefix written at the head of every payload
pub const STREAM_NONCE_SIZE: usize = 7;
/// Plaintext bytes per sealed segment
pub const SEGMENT_SIZE: usize = 64 * 1024;

const SEALED_SEGMENT_SIZE: usize = SEGMENT_SIZE + TAG_SIZE;

/// Exact ciphertext length produced for a plaintext of `plaintext_len` bytes
pub fn sealed_len(plaintext_len: usize) -> usize {
    let full = plaintext_len / SEGMENT_SIZE;
    let rest = plaintext_len % SEGMENT_SIZE;
    STREAM_NONCE_SIZE + full * SEALED_SEGMENT_SIZE + rest + TAG_SIZE
}

impl Secret {
    /// Encrypt everything `reader` yields into `writer`, one segment at a time
    ///
    /// Returns the number of ciphertext bytes written.
    pub fn encrypt_stream<R, W>(&self, mut reader: R, mut writer: W) -> Result<u64, SecretError>
    where
        R: Read,
        W: Write,
    {
        let mut nonce = [0u8; STREAM_NONCE_SIZE];
        getrandom::getrandom(&mut nonce)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;
        writer.write_all(&nonce)?;

        let mut encryptor =
            EncryptorBE32::from_aead(self.cipher(), GenericArray::from_slice(&nonce));
        let mut buf = vec![0u8; SEGMENT_SIZE];
        let mut written = STREAM_NONCE_SIZE as u64;

        loop {
            let n = read_full(&mut reader, &mut buf)?;
            if n < SEGMENT_SIZE {
                let sealed = encryptor
                    .encrypt_last(&buf[..n])
                    .map_err(|_| anyhow::anyhow!("encrypt error"))?;
                writer.write_all(&sealed)?;
                written += sealed.len() as u64;
                break;
            }
            let sealed = encryptor
                .encrypt_next(&buf[..])
                .map_err(|_| anyhow::anyhow!("encrypt error"))?;
            writer.write_all(&sealed)?;
            written += sealed.len() as u64;
        }

        writer.flush()?;
        Ok(written)
    }

    /// Decrypt a payload produced by [`Secret::encrypt_stream`] into `writer`
    ///
    /// Segments are authenticated before they are written. On error `writer`
    ///  may already hold the verified segments that preceded the failure;
    ///  callers must discard it.
    ///
    /// Returns the number of plaintext bytes written.
    pub fn decrypt_stream<R, W>(&self, mut reader: R, mut writer: W) -> Result<u64, SecretError>
    where
        R: Read,
        W: Write,
    {
        let mut nonce = [0u8; STREAM_NONCE_SIZE];
        if read_full(&mut reader, &mut nonce)? < STREAM_NONCE_SIZE {
            return Err(SecretError::DecryptionFailed(
                "ciphertext too short for stream header",
            ));
        }

        let mut decryptor =
            DecryptorBE32::from_aead(self.cipher(), GenericArray::from_slice(&nonce));
        let mut buf = vec![0u8; SEALED_SEGMENT_SIZE];
        let mut written = 0u64;

        loop {
            let n = read_full(&mut reader, &mut buf)?;
            if n < SEALED_SEGMENT_SIZE {
                let plain = decryptor
                    .decrypt_last(&buf[..n])
                    .map_err(|_| SecretError::DecryptionFailed("authentication failed"))?;
                writer.write_all(&plain)?;
                written += plain.len() as u64;
                break;
            }
            let plain = decryptor
                .decrypt_next(&buf[..])
                .map_err(|_| SecretError::DecryptionFailed("authentication failed"))?;
            writer.write_all(&plain)?;
            written += plain.len() as u64;
        }

        writer.flush()?;
        Ok(written)
    }

    /// Encrypt a whole payload held in memory
    pub fn encrypt_payload(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        let mut out = Vec::with_capacity(sealed_len(data.len()));
        self.encrypt_stream(data, &mut out)?;
        Ok(out)
    }

    /// Decrypt a whole payload held in memory
    ///
    /// Either the full plaintext is returned or an error; nothing partial.
    pub fn decrypt_payload(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        let mut out = Vec::with_capacity(data.len());
        self.decrypt_stream(data, &mut out)?;
        Ok(out)
    }
}

/// Fill `buf` from `reader`, stopping early only at EOF
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
