//! Client configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Configuration for a client session against one store.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the file store (e.g., "https://files.example.com").
    #[serde(default)]
    pub server_url: String,
    /// User token scoping every block and file operation.
    #[serde(default)]
    pub token: String,
    /// Block size in bytes used when splitting uploads.
    #[serde(default = "default_block_size")]
    pub block_size: u64,
    /// Longest wait for the next read on a connection. Whole transfers are
    /// not bounded, so a slow but steady body never times out.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Deadline for establishing a connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Skip TLS certificate verification.
    /// SECURITY: only for stores fronted by self-signed certificates on a
    /// trusted network.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_block_size() -> u64 {
    crate::DEFAULT_BLOCK_SIZE
}

fn default_read_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            token: String::new(),
            block_size: default_block_size(),
            read_timeout_secs: default_read_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            accept_invalid_certs: false,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given store and token with defaults
    /// for everything else.
    pub fn new(server_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            token: token.into(),
            ..Default::default()
        }
    }

    /// Override the block size.
    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    /// Get the read timeout as a Duration.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Get the connect timeout as a Duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(crate::Error::Config(format!(
                "server URL must start with http:// or https://, got '{}'",
                self.server_url
            )));
        }
        if self.token.trim().is_empty() {
            return Err(crate::Error::Config("token must not be empty".to_string()));
        }
        if self.read_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(crate::Error::Config(
                "timeouts must be at least one second".to_string(),
            ));
        }
        crate::block::validate_block_size(self.block_size)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("token", &"<redacted>")
            .field("block_size", &self.block_size)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}
