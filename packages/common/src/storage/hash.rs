use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;

/// Number of hex characters in a rendered fingerprint.
pub const HASH_HEX_LEN: usize = 64;

/// A validated SHA-256 content fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(hash.into())
    }

    /// Hash everything readable from `reader`, returning the fingerprint and the
    /// number of bytes consumed.
    ///
    /// A read failure aborts the whole computation; no partial digest is returned.
    pub async fn compute_reader<R>(mut reader: R) -> std::io::Result<(Self, u64)>
    where
        R: AsyncRead + Unpin,
    {
        let mut hasher = Sha256::new();
        let mut total_bytes: u64 = 0;
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            total_bytes += n as u64;
            hasher.update(&buf[..n]);
        }

        Ok((Self(hasher.finalize().into()), total_bytes))
    }

    /// Construct from raw SHA-256 bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Whether `s` is syntactically a fingerprint: 64 hex characters, any case.
    pub fn is_valid(s: &str) -> bool {
        s.len() == HASH_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Parse a hex-encoded content hash string. Upper and lower case are accepted.
    pub fn from_hex(s: &str) -> Result<Self, StorageError> {
        if s.len() != HASH_HEX_LEN {
            return Err(StorageError::InvalidHash(format!(
                "expected {HASH_HEX_LEN} hex characters, got {}",
                s.len()
            )));
        }

        let bytes =
            hex::decode(s).map_err(|e| StorageError::InvalidHash(format!("invalid hex: {e}")))?;

        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StorageError::InvalidHash("decoded to wrong length".into()))?;

        Ok(Self(arr))
    }

    /// Return the hash as a 64-character lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Return the raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 2 hex characters, used as the shard directory of an object key.
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// Remaining 62 hex characters.
    pub fn shard_suffix(&self) -> String {
        hex::encode(&self.0[1..])
    }

    /// Object-store key for an original stored under this fingerprint.
    pub fn original_key(&self) -> String {
        format!("originals/{}/{}", self.shard_prefix(), self.shard_suffix())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for ContentHash {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
