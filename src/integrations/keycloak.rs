//! M2M access tokens via the OAuth2 `client_credentials` grant.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::OAuthClientConfig;
use crate::domain::DomainError;

/// Tokens are refreshed this long before the provider says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    60
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

struct Inner {
    client: reqwest::Client,
    config: OAuthClientConfig,
    cache: Mutex<Option<CachedToken>>,
}

/// Shared, cloneable source of M2M tokens for one client.
#[derive(Clone)]
pub struct TokenProvider {
    inner: Arc<Inner>,
}

impl TokenProvider {
    pub fn new(config: OAuthClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                config,
                cache: Mutex::new(None),
            }),
        })
    }

    /// A valid access token, from cache when possible.
    pub async fn access_token(&self) -> Result<String, DomainError> {
        let mut cache = self.inner.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let config = &self.inner.config;
        let (Some(token_url), Some(client_id), Some(client_secret)) = (
            config.token_url(),
            config.client_id.as_deref(),
            config.client_secret.as_deref(),
        ) else {
            tracing::error!("cannot fetch M2M token: identity provider client configuration is incomplete");
            return Err(DomainError::External(
                "Identity provider client configuration is incomplete".to_string(),
            ));
        };

        tracing::debug!(client_id, "fetching M2M access token");
        match self.fetch(&token_url, client_id, client_secret).await {
            Ok(resp) => {
                let lifetime = Duration::from_secs(resp.expires_in).saturating_sub(EXPIRY_MARGIN);
                *cache = Some(CachedToken {
                    token: resp.access_token.clone(),
                    expires_at: Instant::now() + lifetime,
                });
                Ok(resp.access_token)
            }
            Err(e) => {
                *cache = None;
                tracing::error!(token_url = %token_url, error = %e, "failed to fetch M2M access token");
                Err(DomainError::External(format!(
                    "Failed to obtain M2M token: {}",
                    e
                )))
            }
        }
    }

    async fn fetch(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenResponse, reqwest::Error> {
        self.inner
            .client
            .post(token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<TokenResponse>()
            .await
    }
}
