//! Metadata lookup, download and delete.

use crate::client::StashClient;
use crate::error::{ClientError, ClientResult};
use percent_encoding::percent_decode_str;
use reqwest::StatusCode;
use reqwest::header::HeaderValue;
use stash_core::{FileId, FileInfo};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Response header carrying the URL-escaped original file name.
pub const FILE_NAME_HEADER: &str = "x-name";

impl StashClient {
    /// Fetch the metadata the store holds for `id`.
    ///
    /// Unknown identifiers yield `Ok(None)` rather than an error, so callers
    /// can check before acting.
    pub async fn file_info(&self, id: &str) -> ClientResult<Option<FileInfo>> {
        let Ok(file_id) = FileId::parse(id) else {
            return Ok(None);
        };

        let url = self.endpoint(
            "/file/info",
            &[("token", &self.token), ("id", file_id.as_str())],
        )?;
        let response = self.http.get(url).send().await?;
        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                if body.is_empty() {
                    return Ok(None);
                }
                Ok(Some(FileInfo { id: file_id, body }))
            }
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            status => Err(ClientError::Metadata { status }),
        }
    }

    /// Download `id` into `dir`, returning the path written.
    ///
    /// The file is named `name` if given, otherwise the name the store
    /// reports. The body is streamed to disk; if the transfer breaks, the
    /// partial file is removed.
    #[tracing::instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub async fn download(&self, id: &str, dir: &Path, name: Option<&str>) -> ClientResult<PathBuf> {
        let url = self.endpoint("/file/download", &[("token", &self.token), ("id", id)])?;
        let mut response = self.http.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::Download { status });
        }

        let file_name = resolve_file_name(name, response.headers().get(FILE_NAME_HEADER), id);
        let path = dir.join(file_name);
        let mut file = tokio::fs::File::create(&path).await?;

        let written = match copy_body(&mut response, &mut file).await {
            Ok(written) => written,
            Err(e) => {
                drop(file);
                if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove partial download");
                }
                return Err(e);
            }
        };

        tracing::info!(path = %path.display(), bytes = written, "file downloaded");
        Ok(path)
    }

    /// Delete `id` from the store.
    ///
    /// Deleting an unknown identifier succeeds; only transport failures are
    /// reported.
    pub async fn delete(&self, id: &str) -> ClientResult<()> {
        let url = self.endpoint("/file/info", &[("token", &self.token), ("id", id)])?;
        let response = self.http.delete(url).send().await?;
        tracing::debug!(id, status = %response.status(), "delete acknowledged");
        Ok(())
    }
}

async fn copy_body(response: &mut reqwest::Response, file: &mut tokio::fs::File) -> ClientResult<u64> {
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Pick the local file name for a download.
///
/// Only the final path component of the chosen name is kept, so a store
/// cannot direct writes outside the target directory.
fn resolve_file_name(name: Option<&str>, header: Option<&HeaderValue>, id: &str) -> String {
    let chosen = match name.filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => header
            .and_then(|value| value.to_str().ok())
            .map(decode_header_name)
            .unwrap_or_default(),
    };

    Path::new(&chosen)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| id.to_string())
}

/// Undo query-style escaping: `+` is a space, `%XX` is a byte.
fn decode_header_name(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
