//! Core domain types and shared logic for the stash file store client.
//!
//! This crate defines the data model used by the client and CLI crates:
//! - Block digests (the deduplication key)
//! - Blocks and the ordered block manifest
//! - File identifiers and metadata returned by the store
//! - Upload state machine and per-block pipeline results
//! - Client configuration

pub mod block;
pub mod config;
pub mod digest;
pub mod error;
pub mod file;
pub mod manifest;
pub mod upload;

pub use block::{Block, validate_block_size};
pub use config::ClientConfig;
pub use digest::{BlockDigest, DigestHasher};
pub use error::{Error, Result};
pub use file::{FileId, FileInfo};
pub use manifest::BlockManifest;
pub use upload::{
    BlockDecision, BlockDisposition, BlockOutcome, FileCommit, UploadState, UploadStats,
    UploadSummary,
};

/// Default block size: 16 MiB
pub const DEFAULT_BLOCK_SIZE: u64 = 16 * 1024 * 1024;

/// Maximum block size: 64 MiB
pub const MAX_BLOCK_SIZE: u64 = 64 * 1024 * 1024;

/// Minimum block size: 1 byte
pub const MIN_BLOCK_SIZE: u64 = 1;

/// Separator between digests in the committed block list.
pub const MANIFEST_DELIMITER: char = ',';
