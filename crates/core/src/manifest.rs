//! The ordered block manifest of a file.

use crate::MANIFEST_DELIMITER;
use crate::digest::BlockDigest;
use serde::{Deserialize, Serialize};

/// Ordered block digests describing how the store reassembles a file.
///
/// Order is significant: the store concatenates the blocks in exactly this
/// sequence. Every block except the last is `block_size` bytes long.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockManifest {
    /// Ordered list of block digests.
    pub digests: Vec<BlockDigest>,
    /// Size of each block (except possibly the last).
    pub block_size: u64,
    /// Total file size.
    pub file_size: u64,
}

impl BlockManifest {
    /// Create an empty manifest for a file of the given size.
    pub fn new(block_size: u64, file_size: u64) -> Self {
        let capacity = usize::try_from(file_size.div_ceil(block_size.max(1))).unwrap_or(0);
        Self {
            digests: Vec::with_capacity(capacity),
            block_size,
            file_size,
        }
    }

    /// Append the digest of the next block.
    pub fn push(&mut self, digest: BlockDigest) {
        self.digests.push(digest);
    }

    /// Number of blocks recorded so far.
    pub fn block_count(&self) -> usize {
        self.digests.len()
    }

    /// Number of blocks a complete manifest must hold.
    pub fn expected_block_count(&self) -> u64 {
        self.file_size.div_ceil(self.block_size.max(1))
    }

    /// Calculate expected size of a block at a given position.
    ///
    /// Returns `None` if the position is out of bounds.
    pub fn expected_block_size(&self, position: usize) -> Option<u64> {
        let count = self.expected_block_count();
        if position as u64 >= count {
            return None;
        }

        if (position as u64) + 1 < count {
            Some(self.block_size)
        } else {
            // Last block may be smaller
            Some(self.file_size - (count - 1) * self.block_size)
        }
    }

    /// Check that the manifest covers the whole file.
    pub fn verify(&self) -> crate::Result<()> {
        if self.block_size == 0 {
            return Err(crate::Error::ManifestIntegrity(
                "block size must be non-zero".to_string(),
            ));
        }
        let expected = self.expected_block_count();
        if self.digests.len() as u64 != expected {
            return Err(crate::Error::ManifestIntegrity(format!(
                "expected {expected} blocks for {} bytes, got {}",
                self.file_size,
                self.digests.len()
            )));
        }
        Ok(())
    }

    /// Render the digest list as the store's comma-joined block array.
    pub fn to_block_array_text(&self) -> String {
        let mut text = String::with_capacity(self.digests.len() * 65);
        for (i, digest) in self.digests.iter().enumerate() {
            if i > 0 {
                text.push(MANIFEST_DELIMITER);
            }
            text.push_str(&digest.to_hex());
        }
        text
    }
}
