//! In-memory block store that records every call made by the pipeline.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use stash_client::{BlockStore, ClientError, ClientResult};
use stash_core::{Block, BlockDigest, BlockManifest, FileCommit, FileId};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// A committed file as the store sees it.
#[allow(dead_code)]
#[derive(Clone, Debug)]
pub struct StoredFile {
    pub name: String,
    pub manifest: BlockManifest,
    pub json_text: String,
}

#[derive(Default)]
struct Inner {
    blocks: HashMap<BlockDigest, Bytes>,
    files: HashMap<FileId, StoredFile>,
    exists_calls: Vec<BlockDigest>,
    uploads: Vec<BlockDigest>,
    commits: usize,
}

/// Instrumented in-memory store.
///
/// Duplicate uploads of one digest overwrite the same entry, mirroring the
/// idempotence the real store provides.
#[allow(dead_code)]
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    /// Reject the upload of the block at this position with a 500.
    fail_upload_at: Option<u32>,
    /// Reject every commit with a 409.
    reject_commit: bool,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that fails the upload of the block at `position`.
    pub fn failing_upload_at(position: u32) -> Self {
        Self {
            fail_upload_at: Some(position),
            ..Self::default()
        }
    }

    /// A store that rejects every commit.
    pub fn rejecting_commits() -> Self {
        Self {
            reject_commit: true,
            ..Self::default()
        }
    }

    /// Seed a block as if an earlier upload had stored it.
    pub fn insert_block(&self, data: &[u8]) -> BlockDigest {
        let digest = BlockDigest::compute(data);
        self.inner
            .lock()
            .unwrap()
            .blocks
            .insert(digest, Bytes::copy_from_slice(data));
        digest
    }

    pub fn exists_calls(&self) -> Vec<BlockDigest> {
        self.inner.lock().unwrap().exists_calls.clone()
    }

    pub fn uploads(&self) -> Vec<BlockDigest> {
        self.inner.lock().unwrap().uploads.clone()
    }

    pub fn commits(&self) -> usize {
        self.inner.lock().unwrap().commits
    }

    pub fn block_count(&self) -> usize {
        self.inner.lock().unwrap().blocks.len()
    }

    pub fn file(&self, id: &FileId) -> Option<StoredFile> {
        self.inner.lock().unwrap().files.get(id).cloned()
    }

    /// Concatenate a file's blocks in manifest order.
    pub fn reassemble(&self, id: &FileId) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        let file = inner.files.get(id)?;
        let mut out = Vec::with_capacity(file.manifest.file_size as usize);
        for digest in &file.manifest.digests {
            out.extend_from_slice(inner.blocks.get(digest)?);
        }
        Some(out)
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn block_exists(&self, digest: &BlockDigest) -> ClientResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.exists_calls.push(*digest);
        Ok(inner.blocks.contains_key(digest))
    }

    async fn upload_block(&self, block: &Block) -> ClientResult<()> {
        if self.fail_upload_at == Some(block.position) {
            return Err(ClientError::Transfer {
                digest: block.digest.to_hex(),
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        block.digest.verify(&block.data)?;
        let mut inner = self.inner.lock().unwrap();
        inner.uploads.push(block.digest);
        inner.blocks.insert(block.digest, block.data.clone());
        Ok(())
    }

    async fn commit_file(&self, commit: &FileCommit) -> ClientResult<FileId> {
        let mut inner = self.inner.lock().unwrap();
        inner.commits += 1;
        if self.reject_commit {
            return Err(ClientError::Commit {
                status: StatusCode::CONFLICT,
                body: "rejected".to_string(),
            });
        }
        if let Some(missing) = commit
            .manifest
            .digests
            .iter()
            .find(|d| !inner.blocks.contains_key(*d))
        {
            return Err(ClientError::Commit {
                status: StatusCode::BAD_REQUEST,
                body: format!("missing block {missing}"),
            });
        }

        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = FileId::parse(&format!("file-{n}"))?;
        inner.files.insert(
            id.clone(),
            StoredFile {
                name: commit.name.clone(),
                manifest: commit.manifest.clone(),
                json_text: commit.json_text.clone(),
            },
        );
        Ok(id)
    }
}
