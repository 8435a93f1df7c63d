//! API key minting and caching.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::api::client::HttpClient;
use crate::error::{Error, Result};

/// Used when a token response does not say how long the token lives.
const DEFAULT_VALIDITY_SECS: i64 = 3600;

/// Seconds shaved off a token's advertised lifetime.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// A bearer token together with its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub valid_for: Duration,
}

impl ApiKey {
    pub fn new(token: impl Into<String>, valid_for: Duration) -> Self {
        Self {
            token: token.into(),
            created_at: Utc::now(),
            valid_for,
        }
    }

    /// A key is usable only while `now < created_at + valid_for`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.created_at + self.valid_for
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Parse an OAuth2 style `{"access_token": .., "expires_in": ..}` body.
    pub fn from_token_response(body: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: Option<i64>,
        }

        let parsed: TokenResponse = serde_json::from_str(body)?;
        if parsed.access_token.is_empty() {
            return Err(Error::RequestFailed("Token response without a token".into()));
        }

        let lifetime = parsed.expires_in.unwrap_or(DEFAULT_VALIDITY_SECS);
        let valid_for = Duration::seconds((lifetime - EXPIRY_MARGIN_SECS).max(0));
        Ok(Self::new(parsed.access_token, valid_for))
    }
}

/// Adapter-specific way of obtaining an [`ApiKey`].
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Cache slot for keys minted by this exchange, usually the adapter type.
    fn key_name(&self) -> &str;

    async fn exchange(&self, client: &HttpClient) -> Result<ApiKey>;
}

/// Keys cached per adapter type. Read by every request, written on mint/evict.
#[derive(Debug, Default)]
pub struct ApiKeyCache {
    keys: RwLock<HashMap<String, ApiKey>>,
}

impl ApiKeyCache {
    /// Cached key for `name` if it has not expired.
    pub async fn get(&self, name: &str) -> Option<ApiKey> {
        let keys = self.keys.read().await;
        keys.get(name).filter(|key| key.is_valid()).cloned()
    }

    pub async fn insert(&self, name: &str, key: ApiKey) {
        self.keys.write().await.insert(name.to_string(), key);
    }

    /// Drop the key for `name` so the next request mints a new one.
    pub async fn evict(&self, name: &str) {
        if self.keys.write().await.remove(name).is_some() {
            tracing::debug!("Evicted API key for {}", name);
        }
    }

    /// Return the cached key or mint and cache a new one.
    pub async fn get_or_mint(
        &self,
        exchange: &dyn TokenExchange,
        client: &HttpClient,
    ) -> Result<ApiKey> {
        let name = exchange.key_name();
        if let Some(key) = self.get(name).await {
            return Ok(key);
        }

        // Hold the write lock while minting so concurrent callers share one exchange.
        let mut keys = self.keys.write().await;
        if let Some(key) = keys.get(name).filter(|key| key.is_valid()) {
            return Ok(key.clone());
        }

        tracing::debug!("Requesting new API key for {}", name);
        let key = exchange.exchange(client).await?;
        keys.insert(name.to_string(), key.clone());
        Ok(key)
    }
}

/// OAuth2 client-credentials exchange.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub name: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[async_trait]
impl TokenExchange for ClientCredentials {
    fn key_name(&self) -> &str {
        &self.name
    }

    async fn exchange(&self, client: &HttpClient) -> Result<ApiKey> {
        let response = client
            .fetch_text(|http| {
                http.post(&self.token_url)
                    .basic_auth(&self.client_id, Some(&self.client_secret))
                    .form(&[("grant_type", "client_credentials")])
            })
            .await?;

        if !response.is_success() {
            // Not `AuthExpired`: bad credentials must not trigger another exchange.
            return Err(Error::RequestFailed(format!(
                "Token exchange for {} rejected: HTTP {}",
                self.name, response.status
            )));
        }

        ApiKey::from_token_response(&response.body)
    }
}
