//! Shared HTTP client with rate-limit backoff.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::api::keys::{ApiKey, ApiKeyCache, TokenExchange};
use crate::cancel::CancelToken;
use crate::config::NetworkConfig;
use crate::error::{Error, Result};

/// Statuses that mean "slow down": 429 Too Many Requests and 423 Locked.
pub const RATE_LIMIT_STATUSES: [StatusCode; 2] =
    [StatusCode::TOO_MANY_REQUESTS, StatusCode::LOCKED];

/// Anything that carries an HTTP status the backoff loop can inspect.
pub trait HasStatus {
    fn status_code(&self) -> StatusCode;

    fn is_rate_limited(&self) -> bool {
        RATE_LIMIT_STATUSES.contains(&self.status_code())
    }
}

impl HasStatus for Response {
    fn status_code(&self) -> StatusCode {
        self.status()
    }
}

impl HasStatus for StatusCode {
    fn status_code(&self) -> StatusCode {
        *self
    }
}

/// Pure exponential backoff: `initial_wait * 2^attempt`, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub max_tries: u32,
    pub initial_wait: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_tries: 3,
            initial_wait: Duration::from_secs(2),
        }
    }
}

impl Backoff {
    pub fn new(max_tries: u32, initial_wait: Duration) -> Self {
        Self {
            max_tries,
            initial_wait,
        }
    }

    /// Wait before retrying after the zero-based `attempt` failed.
    pub fn wait_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_wait.saturating_mul(factor)
    }
}

/// Run `attempt` until it yields a response that is not rate limited.
///
/// Rate-limited responses and timed-out requests are retried after
/// [`Backoff::wait_for`]; any other response, including other failure
/// statuses, is returned as is so the caller can inspect it. Other transport
/// errors are returned immediately. Cancellation only cuts a backoff wait
/// short; a request already due is still made.
pub async fn retry_rate_limited<T, F, Fut>(
    backoff: &Backoff,
    cancel: &CancelToken,
    mut attempt: F,
) -> Result<T>
where
    T: HasStatus,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_tries = backoff.max_tries.max(1);
    let mut last_timeout = None;

    for n in 0..max_tries {
        match attempt().await {
            Ok(response) if response.is_rate_limited() => {
                tracing::debug!("Rate limited (HTTP {})", response.status_code());
                last_timeout = None;
            }
            Ok(response) => return Ok(response),
            Err(Error::Http(e)) if e.is_timeout() => {
                tracing::debug!("Request timed out: {}", e);
                last_timeout = Some(Error::Http(e));
            }
            Err(e) => return Err(e),
        }

        if n + 1 == max_tries {
            break;
        }

        let wait = backoff.wait_for(n);
        tracing::warn!(
            "Retrying in {:?} (attempt {}/{})",
            wait,
            n + 2,
            max_tries
        );
        if !cancel.sleep(wait).await {
            return Err(Error::Cancelled);
        }
    }

    Err(last_timeout.unwrap_or(Error::RateLimited {
        attempts: max_tries,
    }))
}

/// Status and body of a completed text request.
#[derive(Debug, Clone)]
pub struct FetchedText {
    pub status: StatusCode,
    pub body: String,
}

impl FetchedText {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 401 or 403; adapters look at the body to tell an expired key apart.
    pub fn is_auth_failure(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED || self.status == StatusCode::FORBIDDEN
    }
}

/// HTTP client shared by adapters, resolvers and the download pipeline.
pub struct HttpClient {
    client: Client,
    backoff: Backoff,
    request_delay: Duration,
    cancel: CancelToken,
    keys: ApiKeyCache,
}

impl HttpClient {
    /// Build a client from the network configuration.
    pub fn new(config: &NetworkConfig, cancel: CancelToken) -> Result<Self> {
        let builder = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout());
        Self::from_builder(builder, config, cancel)
    }

    /// Build from a caller-prepared reqwest builder (proxies, extra headers).
    pub fn from_builder(
        builder: reqwest::ClientBuilder,
        config: &NetworkConfig,
        cancel: CancelToken,
    ) -> Result<Self> {
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            backoff: Backoff::new(config.max_tries, config.initial_wait()),
            request_delay: config.request_delay(),
            cancel,
            keys: ApiKeyCache::default(),
        })
    }

    /// The underlying reqwest client, for building requests.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn keys(&self) -> &ApiKeyCache {
        &self.keys
    }

    /// Send a request built by `make_request`, retrying while rate limited.
    pub async fn send<F>(&self, make_request: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.send_with(make_request, &self.backoff).await
    }

    /// Like [`send`](Self::send) with an explicit backoff policy.
    pub async fn send_with<F>(&self, make_request: F, backoff: &Backoff) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        retry_rate_limited(backoff, &self.cancel, || {
            let request = make_request(&self.client);
            async move { request.send().await.map_err(Error::from) }
        })
        .await
    }

    /// Fetch a text body. Non-rate-limit failures come back as `FetchedText`.
    pub async fn fetch_text<F>(&self, make_request: F) -> Result<FetchedText>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.fetch_text_with(make_request, &self.backoff).await
    }

    /// Like [`fetch_text`](Self::fetch_text) with an explicit backoff policy.
    pub async fn fetch_text_with<F>(&self, make_request: F, backoff: &Backoff) -> Result<FetchedText>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.send_with(make_request, backoff).await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!("Response status: {} ({} bytes)", status, body.len());
        Ok(FetchedText { status, body })
    }

    /// Plain GET used for image downloads.
    pub async fn get(&self, url: &str) -> Result<Response> {
        tracing::debug!("GET {}", url);
        self.send(|client| client.get(url)).await
    }

    /// Pause between consecutive external calls.
    ///
    /// Returns `false` when the run was cancelled during the pause.
    pub async fn pause(&self) -> bool {
        let base_ms = self.request_delay.as_millis() as u64;
        if base_ms == 0 {
            return !self.cancel.is_cancelled();
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=base_ms / 2);
        self.cancel
            .sleep(Duration::from_millis(base_ms + jitter_ms))
            .await
    }

    /// Cached key for `exchange`, minting a new one when missing or expired.
    pub async fn api_key(&self, exchange: &dyn TokenExchange) -> Result<ApiKey> {
        self.keys.get_or_mint(exchange, self).await
    }

    /// Run `op` with a key; on `AuthExpired`, evict, re-mint and retry once.
    pub async fn with_api_key<T, F, Fut>(&self, exchange: &dyn TokenExchange, op: F) -> Result<T>
    where
        F: Fn(ApiKey) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = self.api_key(exchange).await?;
        match op(key).await {
            Err(Error::AuthExpired(message)) => {
                tracing::warn!(
                    "API key for {} rejected ({}), requesting a new one",
                    exchange.key_name(),
                    message
                );
                self.keys.evict(exchange.key_name()).await;
                let key = self.api_key(exchange).await?;
                op(key).await
            }
            other => other,
        }
    }
}
