//! Blocks: the unit of deduplication and transfer.

use crate::digest::BlockDigest;
use bytes::Bytes;
use std::fmt;

/// Check that a block size is within the supported bounds.
pub fn validate_block_size(size: u64) -> crate::Result<()> {
    if !(crate::MIN_BLOCK_SIZE..=crate::MAX_BLOCK_SIZE).contains(&size) {
        return Err(crate::Error::InvalidBlockSize {
            size,
            min: crate::MIN_BLOCK_SIZE,
            max: crate::MAX_BLOCK_SIZE,
        });
    }
    Ok(())
}

/// An owned, immutable block of file bytes with its digest.
#[derive(Clone)]
pub struct Block {
    /// Position in the manifest (0-indexed).
    pub position: u32,
    /// The block digest (computed from data).
    pub digest: BlockDigest,
    /// The block data.
    pub data: Bytes,
}

impl Block {
    /// Create a new block from data, computing the digest.
    pub fn new(position: u32, data: Bytes) -> Self {
        let digest = BlockDigest::compute(&data);
        Self {
            position,
            digest,
            data,
        }
    }

    /// Get the block size.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("position", &self.position)
            .field("digest", &self.digest)
            .field("size", &self.data.len())
            .finish()
    }
}
