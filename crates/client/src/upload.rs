//! Chunked upload pipeline.
//!
//! A file is read in bounded, block-sized pieces. Each piece flows through
//! three stages: digest, decide (does the store have it?) and transfer
//! (upload if missing). Digests are appended to the manifest in read order,
//! and the manifest is committed once the whole file has been read.

use crate::error::{ClientError, ClientResult};
use crate::store::BlockStore;
use bytes::Bytes;
use stash_core::{
    Block, BlockDecision, BlockDigest, BlockDisposition, BlockManifest, BlockOutcome,
    DigestHasher, FileCommit, UploadState, UploadStats, UploadSummary, validate_block_size,
};
use std::collections::HashSet;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Reads a source of known length as a sequence of owned blocks.
///
/// Block lengths come from the manifest being built: each call reads the
/// block at `manifest.block_count()`, so every block is exactly
/// `block_size` bytes except the last. Reads are accumulated until each
/// block is full, so a reader that returns short reads mid-stream is
/// handled. A source that ends before `file_size` bytes is an
/// `UnexpectedEof` error; anything past `file_size` is never read.
pub struct BlockReader<R> {
    reader: R,
    consumed: u64,
}

impl<R: AsyncRead + Unpin> BlockReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            consumed: 0,
        }
    }

    /// Read the next block `manifest` expects, or `None` once it is complete.
    pub async fn next_block(&mut self, manifest: &BlockManifest) -> ClientResult<Option<Bytes>> {
        let Some(expected) = manifest.expected_block_size(manifest.block_count()) else {
            return Ok(None);
        };

        let len = usize::try_from(expected)
            .map_err(|_| ClientError::Config("block size exceeds platform limits".to_string()))?;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "source ended before {} bytes (block at offset {})",
                        manifest.file_size, self.consumed
                    ),
                )
            } else {
                e
            }
        })?;
        self.consumed += expected;
        Ok(Some(Bytes::from(buf)))
    }
}

/// Decide stage: ask the store whether it already holds `digest`.
pub async fn decide<S>(store: &S, digest: &BlockDigest) -> ClientResult<BlockDecision>
where
    S: BlockStore + ?Sized,
{
    if store.block_exists(digest).await? {
        Ok(BlockDecision::Present)
    } else {
        Ok(BlockDecision::Missing)
    }
}

/// Transfer stage: upload `block` unless the store already has it.
pub async fn transfer<S>(
    store: &S,
    block: &Block,
    decision: BlockDecision,
) -> ClientResult<BlockOutcome>
where
    S: BlockStore + ?Sized,
{
    if decision == BlockDecision::Missing {
        store.upload_block(block).await?;
    }
    Ok(BlockOutcome {
        position: block.position,
        digest: block.digest,
        size: block.size(),
        disposition: decision.into(),
    })
}

/// Drives one upload from `NotStarted` to `Done` or `Failed`.
///
/// An uploader runs once. On failure the in-memory manifest is dropped and
/// the state stays `Failed`; blocks already sent remain in the store and are
/// reused by the next attempt.
pub struct Uploader<'a, S: ?Sized> {
    store: &'a S,
    block_size: u64,
    state: UploadState,
    /// Digests confirmed present during this upload.
    known: HashSet<BlockDigest>,
}

impl<'a, S> Uploader<'a, S>
where
    S: BlockStore + ?Sized,
{
    pub fn new(store: &'a S, block_size: u64) -> ClientResult<Self> {
        validate_block_size(block_size)?;
        Ok(Self {
            store,
            block_size,
            state: UploadState::NotStarted,
            known: HashSet::new(),
        })
    }

    /// Current state.
    pub fn state(&self) -> UploadState {
        self.state
    }

    fn transition(&mut self, next: UploadState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal upload transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = ?self.state, to = ?next, "upload state");
        self.state = next;
    }

    /// Upload `size` bytes from `reader` and commit them as `name`.
    pub async fn upload<R>(
        &mut self,
        reader: R,
        size: u64,
        name: &str,
        json_text: String,
    ) -> ClientResult<UploadSummary>
    where
        R: AsyncRead + Unpin + Send,
    {
        if self.state != UploadState::NotStarted {
            return Err(ClientError::Config(format!(
                "upload pipeline already ran (state {:?})",
                self.state
            )));
        }

        match self.run(reader, size, name, json_text).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                self.transition(UploadState::Failed);
                tracing::warn!(name, error = %e, "upload failed");
                Err(e)
            }
        }
    }

    async fn run<R>(
        &mut self,
        reader: R,
        size: u64,
        name: &str,
        json_text: String,
    ) -> ClientResult<UploadSummary>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.transition(UploadState::Chunking);
        let mut reader = BlockReader::new(reader);
        let mut manifest = BlockManifest::new(self.block_size, size);
        let mut content = DigestHasher::new();
        let mut stats = UploadStats::default();
        let mut position = 0u32;

        while let Some(data) = reader.next_block(&manifest).await? {
            content.update(&data);
            let outcome = self.process_block(position, data).await?;
            stats.record(&outcome);
            manifest.push(outcome.digest);
            position = position.checked_add(1).ok_or_else(|| {
                stash_core::Error::ManifestIntegrity("too many blocks for one file".to_string())
            })?;
        }
        manifest.verify()?;

        self.transition(UploadState::Committing);
        let commit = FileCommit {
            name: name.to_string(),
            manifest,
            json_text,
        };
        let file_id = self.store.commit_file(&commit).await?;
        self.transition(UploadState::Done);

        let content_digest = content.finalize();
        tracing::info!(
            file_id = %file_id,
            name,
            size,
            blocks = commit.manifest.block_count(),
            uploaded = stats.blocks_uploaded,
            deduplicated = stats.blocks_deduplicated,
            content_digest = %content_digest,
            "file committed"
        );

        Ok(UploadSummary {
            file_id,
            manifest: commit.manifest,
            content_digest,
            stats,
        })
    }

    async fn process_block(&mut self, position: u32, data: Bytes) -> ClientResult<BlockOutcome> {
        self.transition(UploadState::HashingBlock);
        let block = Block::new(position, data);

        self.transition(UploadState::CheckingExistence);
        let decision = if self.known.contains(&block.digest) {
            BlockDecision::Present
        } else {
            decide(self.store, &block.digest).await?
        };

        match decision {
            BlockDecision::Present => self.transition(UploadState::Skipping),
            BlockDecision::Missing => self.transition(UploadState::Uploading),
        }
        let outcome = transfer(self.store, &block, decision).await?;
        self.known.insert(block.digest);

        tracing::debug!(
            position,
            digest = %block.digest,
            size = outcome.size,
            deduplicated = outcome.disposition == BlockDisposition::Deduplicated,
            "block processed"
        );
        Ok(outcome)
    }
}
