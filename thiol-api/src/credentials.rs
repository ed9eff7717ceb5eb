use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::convert::error_message;
use crate::error::ApiError;

/// Supplies the `Authorization` header value for backend calls.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn authorization(&self) -> Result<String, ApiError>;
}

/// A bearer token known up front, typically the identity provider's access token.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn authorization(&self) -> Result<String, ApiError> {
        if self.token.is_empty() {
            return Err(ApiError::Credentials("empty bearer token".to_string()));
        }
        Ok(format!("Bearer {}", self.token))
    }
}

/// Exchanges the identity token for an API secret at a token endpoint.
///
/// The endpoint answers `{ "secret": "..." }`. The secret is fetched once and
/// reused for the lifetime of the provider.
pub struct TokenEndpoint {
    http: reqwest::Client,
    url: String,
    identity_token: String,
    secret: OnceCell<String>,
}

impl TokenEndpoint {
    pub fn new(url: impl Into<String>, identity_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            identity_token: identity_token.into(),
            secret: OnceCell::new(),
        }
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_secret(&self) -> Result<String, ApiError> {
        debug!("Requesting API secret");

        let response = self
            .http
            .get(&self.url)
            .header("Authorization", format!("Bearer {}", self.identity_token))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: error_message(&body)
                    .unwrap_or_else(|| "Failed to get API token".to_string()),
            });
        }

        body.get("secret")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .ok_or_else(|| ApiError::Credentials("token endpoint returned no secret".to_string()))
    }
}

#[async_trait]
impl CredentialProvider for TokenEndpoint {
    async fn authorization(&self) -> Result<String, ApiError> {
        let secret = self
            .secret
            .get_or_try_init(|| self.fetch_secret())
            .await?;
        Ok(format!("Bearer {}", secret))
    }
}
