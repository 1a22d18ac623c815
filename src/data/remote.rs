//! Upstream challenge API client
//!
//! Performs the single outbound GET against the upstream URL. Every failure
//! (timeout, connection error, non-2xx status) comes back as a
//! [`TransportError`] value for the caller to branch on.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::logging::DIAGNOSTICS_TARGET;

/// Default upstream endpoint serving the challenge table
pub const DEFAULT_UPSTREAM_URL: &str = "https://cspf-dev-challenge.herokuapp.com/";

/// Default request timeout for the upstream call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw, not yet validated upstream response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub body: String,
}

impl RawPayload {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// The upstream could not be reached or answered with a failure status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    /// Human-readable description of the failure
    pub message: String,
    /// HTTP status, when the upstream answered at all
    pub status: Option<u16>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Whether the failure was the request timing out
    pub fn is_timeout(&self) -> bool {
        self.message.starts_with("request timed out")
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else if let Some(code) = status {
            format!("upstream responded with HTTP {}", code)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            format!("HTTP request failed: {}", err)
        };
        Self { message, status }
    }
}

/// Source of raw upstream payloads
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Performs one fetch; never retries
    async fn fetch(&self) -> Result<RawPayload, TransportError>;
}

/// Client for the upstream challenge API
#[derive(Debug, Clone)]
pub struct RemoteDataSource {
    client: Client,
    url: String,
    timeout: Duration,
}

impl RemoteDataSource {
    /// Creates a client for `url` whose requests give up after `timeout`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    /// Creates a client for the default upstream URL and timeout
    pub fn with_defaults() -> Result<Self, TransportError> {
        Self::new(DEFAULT_UPSTREAM_URL, DEFAULT_TIMEOUT)
    }

    /// The upstream URL this client calls
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The configured request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl DataSource for RemoteDataSource {
    async fn fetch(&self) -> Result<RawPayload, TransportError> {
        debug!("GET {} (timeout {:?})", self.url, self.timeout);

        let result = async {
            let response = self.client.get(&self.url).send().await?.error_for_status()?;
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(body)
        }
        .await;

        match result {
            Ok(body) => {
                debug!("upstream returned {} bytes", body.len());
                Ok(RawPayload { body })
            }
            Err(err) => {
                let err = TransportError::from(err);
                warn!(target: DIAGNOSTICS_TARGET, "upstream fetch failed: {}", err);
                Err(err)
            }
        }
    }
}
