//! The client session.

use crate::error::{ClientError, ClientResult};
use crate::upload::Uploader;
use reqwest::Url;
use stash_core::{ClientConfig, UploadSummary};
use std::path::Path;

/// A session against one file store.
///
/// Built once from a [`ClientConfig`] and passed to every operation. The
/// token is read-only after construction, so clones can be shared freely
/// between concurrent transfers.
#[derive(Clone)]
pub struct StashClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) token: String,
    block_size: u64,
}

impl StashClient {
    /// Create a session from a validated configuration.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let base_url = normalize_base_url(&config.server_url)?;
        let http = build_http_client(config)?;
        tracing::debug!(server = %base_url, block_size = config.block_size, "file store client initialized");
        Ok(Self {
            http,
            base_url,
            token: config.token.clone(),
            block_size: config.block_size,
        })
    }

    /// Create a session for `host` and `token` with default settings.
    pub fn connect(host: &str, token: &str) -> ClientResult<Self> {
        Self::new(&ClientConfig::new(host, token))
    }

    pub(crate) fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> ClientResult<Url> {
        endpoint(&self.base_url, path, query)
    }

    /// Upload a local file, returning the identifier the store assigned.
    ///
    /// `name` overrides the display name (defaults to the file name).
    /// `json_text` is sent byte-for-byte as the file's metadata.
    #[tracing::instrument(skip(self, path, json_text), fields(path = %path.display()))]
    pub async fn upload_file(
        &self,
        path: &Path,
        name: Option<&str>,
        json_text: Option<&str>,
    ) -> ClientResult<UploadSummary> {
        let file_meta = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(ClientError::NotFoundLocal(path.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ClientError::NotFoundLocal(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let name = match name.filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| ClientError::NotFoundLocal(path.to_path_buf()))?,
        };

        let file = tokio::fs::File::open(path).await?;
        self.upload_reader(file, file_meta.len(), &name, json_text)
            .await
    }

    /// Upload `size` bytes from `reader` as a file called `name`.
    pub async fn upload_reader<R>(
        &self,
        reader: R,
        size: u64,
        name: &str,
        json_text: Option<&str>,
    ) -> ClientResult<UploadSummary>
    where
        R: tokio::io::AsyncRead + Unpin + Send,
    {
        let mut uploader = Uploader::new(self, self.block_size)?;
        uploader
            .upload(reader, size, name, json_text.unwrap_or_default().to_string())
            .await
    }
}

impl std::fmt::Debug for StashClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StashClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("block_size", &self.block_size)
            .finish()
    }
}

pub(crate) fn normalize_base_url(url: &str) -> ClientResult<String> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ClientError::Config(
            "server URL must start with http:// or https://".to_string(),
        ));
    }
    let trimmed = url.trim_end_matches('/').to_string();
    Url::parse(&trimmed).map_err(|e| ClientError::Config(format!("invalid server URL: {e}")))?;
    Ok(trimmed)
}

pub(crate) fn build_http_client(config: &ClientConfig) -> ClientResult<reqwest::Client> {
    if config.accept_invalid_certs {
        tracing::warn!("TLS certificate verification disabled");
    }
    Ok(reqwest::Client::builder()
        .read_timeout(config.read_timeout())
        .connect_timeout(config.connect_timeout())
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()?)
}

/// Build `{base}{path}?k=v&...`, keeping any path prefix on the base URL.
pub(crate) fn endpoint(base_url: &str, path: &str, query: &[(&str, &str)]) -> ClientResult<Url> {
    let mut url = Url::parse(&format!("{base_url}{path}"))
        .map_err(|e| ClientError::Config(format!("failed to build URL for {path}: {e}")))?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}
