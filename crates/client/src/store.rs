//! Block transfer and manifest commit against the store.

use crate::client::StashClient;
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use stash_core::{Block, BlockDigest, FileCommit, FileId};

/// Remote operations the upload pipeline depends on.
///
/// Implementations must tolerate the same digest being uploaded more than
/// once: the existence check and the upload are not atomic, so concurrent
/// uploads of one new block may both send it.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Check whether the store already holds a block.
    async fn block_exists(&self, digest: &BlockDigest) -> ClientResult<bool>;

    /// Send one block keyed by its digest.
    async fn upload_block(&self, block: &Block) -> ClientResult<()>;

    /// Register a manifest and its metadata, returning the new identifier.
    async fn commit_file(&self, commit: &FileCommit) -> ClientResult<FileId>;
}

#[async_trait]
impl BlockStore for StashClient {
    async fn block_exists(&self, digest: &BlockDigest) -> ClientResult<bool> {
        let hex = digest.to_hex();
        let url = self.endpoint("/file/block", &[("sha256", &hex), ("token", &self.token)])?;
        let response = self.http.get(url).send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ClientError::Transfer {
                digest: hex,
                status,
            }),
        }
    }

    async fn upload_block(&self, block: &Block) -> ClientResult<()> {
        let url = self.endpoint("/file/block", &[])?;
        let hex = block.digest.to_hex();
        let part = Part::stream_with_length(block.data.clone(), block.size())
            .file_name("block")
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .text("token", self.token.clone())
            .text("sha256", hex.clone())
            .part("file", part);

        let response = self.http.post(url).multipart(form).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::Transfer { digest: hex, status });
        }
        Ok(())
    }

    async fn commit_file(&self, commit: &FileCommit) -> ClientResult<FileId> {
        let url = self.endpoint("/file/info", &[])?;
        let form = Form::new()
            .text("token", self.token.clone())
            .text("block_array_text", commit.manifest.to_block_array_text())
            .text("name", commit.name.clone())
            .text("size", commit.size().to_string())
            .text("json_text", commit.json_text.clone());

        let response = self.http.post(url).multipart(form).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Commit { status, body });
        }
        let body = response.text().await?;
        FileId::parse(&body).map_err(|_| ClientError::Commit {
            status,
            body: "store returned an empty file identifier".to_string(),
        })
    }
}
