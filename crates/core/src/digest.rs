//! Block digests.
//!
//! A digest is the SHA-256 of a block's bytes, rendered as lowercase hex on
//! the wire. It is the only key the store uses to deduplicate blocks.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Length of a digest rendered as hex.
pub const DIGEST_HEX_LEN: usize = 64;

/// A SHA-256 block digest represented as 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockDigest([u8; 32]);

impl BlockDigest {
    /// Compute the digest of a block.
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Create an incremental hasher.
    pub fn hasher() -> DigestHasher {
        DigestHasher::new()
    }

    /// Parse from a 64 character hex string.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != DIGEST_HEX_LEN {
            return Err(crate::Error::InvalidDigest(format!(
                "expected {DIGEST_HEX_LEN} hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, pair) in s.as_bytes().chunks(2).enumerate() {
            let hex_str =
                std::str::from_utf8(pair).map_err(|e| crate::Error::InvalidDigest(e.to_string()))?;
            bytes[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|e| crate::Error::InvalidDigest(format!("{s}: {e}")))?;
        }
        Ok(Self(bytes))
    }

    /// Encode as lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Check that `data` hashes to this digest.
    pub fn verify(&self, data: &[u8]) -> crate::Result<()> {
        let actual = Self::compute(data);
        if &actual != self {
            return Err(crate::Error::DigestMismatch {
                expected: self.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for BlockDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for BlockDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for BlockDigest {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for BlockDigest {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<BlockDigest> for String {
    fn from(value: BlockDigest) -> Self {
        value.to_hex()
    }
}

/// Incremental SHA-256 hasher producing a [`BlockDigest`].
pub struct DigestHasher(Sha256);

impl DigestHasher {
    /// Create a new hasher.
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    /// Update the hasher with data.
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> BlockDigest {
        BlockDigest(self.0.finalize().into())
    }
}

impl Default for DigestHasher {
    fn default() -> Self {
        Self::new()
    }
}
