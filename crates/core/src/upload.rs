//! Upload lifecycle and per-block pipeline results.

use crate::digest::BlockDigest;
use crate::file::FileId;
use crate::manifest::BlockManifest;
use serde::{Deserialize, Serialize};

/// Upload state.
///
/// A transfer moves `NotStarted -> Chunking`, then loops over blocks
/// (`HashingBlock -> CheckingExistence -> Skipping | Uploading`), then
/// `Committing -> Done`. Any hard failure jumps straight to `Failed`.
/// There is no way out of `Failed`; a new upload starts from `NotStarted`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    NotStarted,
    Chunking,
    HashingBlock,
    CheckingExistence,
    Skipping,
    Uploading,
    Committing,
    Done,
    Failed,
}

impl UploadState {
    /// Check if the upload reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Check whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: UploadState) -> bool {
        use UploadState::*;

        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (NotStarted, Chunking)
                | (Chunking, HashingBlock)
                | (Chunking, Committing)
                | (HashingBlock, CheckingExistence)
                | (CheckingExistence, Skipping)
                | (CheckingExistence, Uploading)
                | (Skipping, HashingBlock)
                | (Skipping, Committing)
                | (Uploading, HashingBlock)
                | (Uploading, Committing)
                | (Committing, Done)
        )
    }
}

/// Result of the existence check for one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockDecision {
    /// The store already holds the block; skip the upload.
    Present,
    /// The store lacks the block; upload it.
    Missing,
}

/// What happened to a block after the transfer stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockDisposition {
    Deduplicated,
    Uploaded,
}

impl From<BlockDecision> for BlockDisposition {
    fn from(decision: BlockDecision) -> Self {
        match decision {
            BlockDecision::Present => Self::Deduplicated,
            BlockDecision::Missing => Self::Uploaded,
        }
    }
}

/// Per-block result of the digest/decide/transfer pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockOutcome {
    /// Position in the manifest (0-indexed).
    pub position: u32,
    /// The block digest.
    pub digest: BlockDigest,
    /// Size in bytes.
    pub size: u64,
    /// Whether the block was skipped or sent.
    pub disposition: BlockDisposition,
}

/// Request to register a manifest as a file.
#[derive(Clone, Debug)]
pub struct FileCommit {
    /// Display name for the file.
    pub name: String,
    /// The complete block manifest.
    pub manifest: BlockManifest,
    /// Opaque metadata forwarded to the store (empty when absent).
    pub json_text: String,
}

impl FileCommit {
    /// Total file size declared to the store.
    pub fn size(&self) -> u64 {
        self.manifest.file_size
    }
}

/// Block and byte counters for one upload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// Number of blocks sent to the store.
    pub blocks_uploaded: u64,
    /// Number of blocks the store already had.
    pub blocks_deduplicated: u64,
    /// Bytes sent to the store.
    pub bytes_uploaded: u64,
    /// Bytes skipped thanks to deduplication.
    pub bytes_deduplicated: u64,
}

impl UploadStats {
    /// Fold one block outcome into the counters.
    pub fn record(&mut self, outcome: &BlockOutcome) {
        match outcome.disposition {
            BlockDisposition::Uploaded => {
                self.blocks_uploaded += 1;
                self.bytes_uploaded += outcome.size;
            }
            BlockDisposition::Deduplicated => {
                self.blocks_deduplicated += 1;
                self.bytes_deduplicated += outcome.size;
            }
        }
    }
}

/// Result of a completed upload.
#[derive(Clone, Debug)]
pub struct UploadSummary {
    /// Identifier assigned by the store.
    pub file_id: FileId,
    /// The committed manifest.
    pub manifest: BlockManifest,
    /// Digest of the whole file content, for verifying downloads.
    pub content_digest: BlockDigest,
    /// Transfer counters.
    pub stats: UploadStats,
}
