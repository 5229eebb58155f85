//! Service-key authorized token administration.

use crate::client::{build_http_client, endpoint, normalize_base_url};
use crate::error::{ClientError, ClientResult};
use reqwest::multipart::Form;
use reqwest::{Method, StatusCode};
use stash_core::ClientConfig;

/// Grants and revokes user tokens using the store's service key.
///
/// Tokens are created before any transfer and revoked explicitly afterwards;
/// nothing here persists them.
#[derive(Clone)]
pub struct TokenAdmin {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl TokenAdmin {
    /// Create an administrator for the store at `config.server_url`.
    ///
    /// Only the URL and transport settings of `config` are used.
    pub fn new(config: &ClientConfig, service_key: &str) -> ClientResult<Self> {
        if service_key.is_empty() {
            return Err(ClientError::Config("service key must not be empty".to_string()));
        }
        Ok(Self {
            http: build_http_client(config)?,
            base_url: normalize_base_url(&config.server_url)?,
            service_key: service_key.to_string(),
        })
    }

    /// Bind `token` to `user_id`.
    pub async fn grant(&self, token: &str, user_id: &str) -> ClientResult<()> {
        self.send(Method::POST, token, user_id).await?;
        tracing::info!(user_id, "token granted");
        Ok(())
    }

    /// Revoke `token`.
    pub async fn revoke(&self, token: &str) -> ClientResult<()> {
        self.send(Method::DELETE, token, "").await?;
        tracing::info!("token revoked");
        Ok(())
    }

    async fn send(&self, method: Method, token: &str, user_id: &str) -> ClientResult<()> {
        let url = endpoint(&self.base_url, "/token", &[])?;
        let form = Form::new()
            .text("sk", self.service_key.clone())
            .text("token", token.to_string())
            .text("id", user_id.to_string());

        let response = self.http.request(method, url).multipart(form).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::Token { status });
        }
        Ok(())
    }
}

impl std::fmt::Debug for TokenAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAdmin")
            .field("base_url", &self.base_url)
            .field("service_key", &"<redacted>")
            .finish()
    }
}
