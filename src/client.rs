//! Pool authority client
//!
//! Credentialed reads of the participant list, leaderboard, chain and open
//! block, plus the one write the game has: submitting a solved puzzle.
//! Non-success responses are normalized into [`Error::Api`], recovering the
//! authority's `error` field from the body whenever one is present.

use crate::types::{
    Block, CurrentBlockResponse, Items, LeaderboardEntry, Participant, SubmitRequest,
    SubmitResponse,
};
use crate::{Error, Result, APP_NAME, APP_VERSION};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, ClientBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};
use url::Url;

/// Operations the game needs from the authority.
///
/// Controllers only ever talk to this trait, which keeps the state machine
/// testable against an in-memory authority.
#[async_trait]
pub trait PoolApi: Send + Sync {
    /// Registered participants, at most `limit`
    async fn participants(&self, limit: usize) -> Result<Vec<Participant>>;

    /// Ranked miners
    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>>;

    /// The most recent `limit` blocks, oldest first
    async fn blocks(&self, limit: usize) -> Result<Vec<Block>>;

    /// The block currently accepting submissions
    async fn current_block(&self) -> Result<CurrentBlockResponse>;

    /// Submit a solved puzzle. Never retried.
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse>;
}

/// Exponential backoff configuration for idempotent reads
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_retries: usize,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_retries: 2,
        }
    }
}

/// Error body the authority attaches to 4xx/5xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the pool authority
pub struct PoolClient {
    client: Client,
    base_url: Url,
    backoff_config: BackoffConfig,
}

impl PoolClient {
    /// Create a new pool client.
    ///
    /// Cookies set by the authority are kept for the lifetime of the client;
    /// `session_cookie` seeds the participant session when the client did not
    /// go through the join page itself.
    pub fn new(
        base_url: impl AsRef<str>,
        timeout: Duration,
        insecure: bool,
        session_cookie: Option<&str>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| Error::config(format!("Invalid server URL: {}", e)))?;

        let mut headers = HeaderMap::new();
        if let Some(cookie) = session_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| Error::config(format!("Invalid session cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let client = ClientBuilder::new()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure)
            .cookie_store(true)
            .default_headers(headers)
            .user_agent(format!("{}/{}", APP_NAME, APP_VERSION))
            .build()
            .map_err(Error::from)?;

        Ok(Self {
            client,
            base_url,
            backoff_config: BackoffConfig::default(),
        })
    }

    /// Set custom backoff configuration
    pub fn with_backoff_config(mut self, config: BackoffConfig) -> Self {
        self.backoff_config = config;
        self
    }

    /// Base URL of the authority
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::config(format!("Failed to build {} URL: {}", path, e)))
    }

    /// GET with exponential backoff on retryable failures
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let mut delay = self.backoff_config.initial_delay;
        let mut attempts = 0;

        loop {
            let result = match self.client.get(url.clone()).send().await {
                Ok(response) => decode_response(response).await,
                Err(e) => Err(Error::from(e)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempts < self.backoff_config.max_retries => {
                    let jitter = delay.as_millis() as f64 * 0.1 * rand::random::<f64>();
                    let actual_delay = delay + Duration::from_millis(jitter as u64);
                    warn!(
                        "GET {} failed: {}, retrying in {:?} (attempt {}/{})",
                        url.path(),
                        e,
                        actual_delay,
                        attempts + 1,
                        self.backoff_config.max_retries
                    );
                    sleep(actual_delay).await;

                    delay = Duration::from_millis(
                        (delay.as_millis() as f64 * self.backoff_config.multiplier) as u64,
                    )
                    .min(self.backoff_config.max_delay);
                    attempts += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Single-shot POST
    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::from)?;
        decode_response(response).await
    }
}

/// Decode a JSON body, turning non-success statuses into [`Error::Api`].
///
/// The body is read and parsed even on error status so the authority's
/// `error` message reaches the user instead of a bare status code.
async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(Error::from)?;

    if !status.is_success() {
        let reason = serde_json::from_slice::<ErrorBody>(&bytes)
            .ok()
            .and_then(|body| body.error)
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        debug!("Authority answered {}: {}", status, reason);
        return Err(Error::api(status.as_u16(), reason));
    }

    serde_json::from_slice(&bytes).map_err(Error::from)
}

#[async_trait]
impl PoolApi for PoolClient {
    #[instrument(skip(self))]
    async fn participants(&self, limit: usize) -> Result<Vec<Participant>> {
        let mut url = self.endpoint("api/participants")?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        let items: Items<Participant> = self.get_json(url).await?;
        Ok(items.items)
    }

    #[instrument(skip(self))]
    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        let url = self.endpoint("api/leaderboard")?;
        let items: Items<LeaderboardEntry> = self.get_json(url).await?;
        Ok(items.items)
    }

    #[instrument(skip(self))]
    async fn blocks(&self, limit: usize) -> Result<Vec<Block>> {
        let mut url = self.endpoint("api/blocks")?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        let items: Items<Block> = self.get_json(url).await?;
        Ok(items.items)
    }

    #[instrument(skip(self))]
    async fn current_block(&self) -> Result<CurrentBlockResponse> {
        let url = self.endpoint("api/block/current")?;
        self.get_json(url).await
    }

    #[instrument(skip(self, request), fields(positions = request.positions.len()))]
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse> {
        let url = self.endpoint("api/block/submit")?;
        debug!("Submitting solution to: {}", url);
        self.post_json(url, request).await
    }
}
