//! Page fetching for platform probes.

use crate::error::{PlatformError, Result};
use async_trait::async_trait;
use lookout_core::HttpConfig;
use std::time::Duration;
use thiserror::Error;

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
    /// Address the body was served from after redirects, when known
    pub final_url: Option<String>,
}

/// Transport-level fetch failure.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport failure
    #[error("request failed: {0}")]
    Request(String),
}

/// Retrieves pages over the network.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`, following redirects, and return its status and body.
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError>;
}

/// [`PageFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher using the configured user agent and timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PlatformError::Http(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError> {
        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(classify)?;

        tracing::debug!(url, status, final_url, bytes = body.len(), "fetched page");

        Ok(FetchedPage {
            status,
            body,
            final_url: Some(final_url),
        })
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(error.to_string())
    } else if error.is_connect() {
        FetchError::Connect(error.to_string())
    } else {
        FetchError::Request(error.to_string())
    }
}
