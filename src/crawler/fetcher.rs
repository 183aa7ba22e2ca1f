//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building one HTTP client per configured client identity
//! - Rotating identities across attempts
//! - Retry with exponential backoff for transient failures
//! - Error classification

use crate::config::{RetryConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

/// A fetched listing page or document body
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// Last-Modified header value
    pub last_modified: Option<String>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl FetchedResource {
    /// Body decoded as UTF-8, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Errors raised while fetching a URL
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Gave up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Whether another attempt may succeed (timeouts, 5xx, 429, connection failures)
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            Self::RetriesExhausted { .. } | Self::Client(_) => false,
        }
    }
}

/// Retrieves listing pages and document bodies
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError>;
}

/// Computes the delay before the next attempt
///
/// `min(base * 2^(attempt-1), max)`, where `attempt` is the 1-based number of
/// the attempt that just failed.
pub fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(62);
    let delay = retry.base_delay_ms.saturating_mul(2_u64.pow(exponent));
    Duration::from_millis(delay.min(retry.max_delay_ms))
}

/// Builds an HTTP client presenting the given user agent
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed [`Fetcher`] with retries and identity rotation
pub struct HttpFetcher {
    clients: Vec<Client>,
    next_client: AtomicUsize,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Creates a fetcher with one client per configured identity
    pub fn new(
        user_agent: &UserAgentConfig,
        retry: RetryConfig,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let clients = user_agent
            .identities
            .iter()
            .map(|identity| build_http_client(identity, timeout))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        if clients.is_empty() {
            return Err(FetchError::Client(
                "at least one client identity is required".to_string(),
            ));
        }

        Ok(Self {
            clients,
            next_client: AtomicUsize::new(0),
            retry,
        })
    }

    fn rotate(&self) -> &Client {
        let index = self.next_client.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[index]
    }

    async fn fetch_once(&self, client: &Client, url: &str) -> Result<FetchedResource, FetchError> {
        let response = client.get(url).send().await.map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let header_value = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header_value(header::CONTENT_TYPE);
        let last_modified = header_value(header::LAST_MODIFIED);

        let body = response.bytes().await.map_err(|e| classify(url, e))?;

        Ok(FetchedResource {
            url: final_url,
            status: status.as_u16(),
            content_type,
            last_modified,
            body: body.to_vec(),
        })
    }
}

fn classify(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let client = self.rotate();
            match self.fetch_once(client, url).await {
                Ok(resource) => return Ok(resource),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    tracing::warn!(url = %url, attempts = attempt, "Retries exhausted: {}", e);
                    return Err(FetchError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = backoff_delay(&self.retry, attempt);
                    tracing::debug!(
                        url = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient fetch failure, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
