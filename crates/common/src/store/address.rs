use std::fmt;
use std::str::FromStr;

use iroh_blobs::Hash;
use serde::{Deserialize, Serialize};

/// Size of a content address in bytes (BLAKE3, 256 bits)
pub const ADDRESS_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("invalid address: {0}")]
    Invalid(String),
}

/// Content address of a blob: the BLAKE3 hash of its bytes
///
/// Two blobs share an address iff they share content, so an address both
///  names a blob and lets a reader verify what it fetched.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// Compute the address of `data`
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Whether `data` hashes to this address
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        if bytes.len() != ADDRESS_SIZE {
            return Err(AddressError::Invalid(format!(
                "expected {} bytes, got {}",
                ADDRESS_SIZE,
                bytes.len()
            )));
        }
        let mut buff = [0; ADDRESS_SIZE];
        buff.copy_from_slice(bytes);
        Ok(Self(buff))
    }

    /// Parse an address from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, AddressError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; ADDRESS_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|e| AddressError::Invalid(format!("hex decode error: {}", e)))?;
        Ok(Self(buff))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; ADDRESS_SIZE]> for Address {
    fn from(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<Hash> for Address {
    fn from(hash: Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl From<Address> for Hash {
    fn from(address: Address) -> Self {
        Hash::from_bytes(address.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
