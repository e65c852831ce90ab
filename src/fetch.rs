//! Plain HTTP page fetching for platforms that need no JavaScript rendering.

use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::HttpConfig;

/// Maximum response body size read from a landing page (10 MB).
/// Larger bodies are truncated rather than rejected.
const MAX_HTTP_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Non-success status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to read response body from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// A fetched page after redirects were followed.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: String,
    pub status: u16,
    pub html: String,
}

#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client })
    }

    /// GET `url`, following redirects. Any non-2xx final status is an error.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        debug!("Fetching landing page: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let final_url = response.url().to_string();
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: final_url,
                status: status.as_u16(),
            });
        }

        if final_url != url {
            debug!("Redirected {} -> {}", url, final_url);
        }

        let html = read_response_body_capped(response, MAX_HTTP_BODY_BYTES)
            .await
            .map_err(|reason| FetchError::Body {
                url: final_url.clone(),
                reason,
            })?;

        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            html,
        })
    }
}

/// Read an HTTP response body, stopping at `max_bytes`.
async fn read_response_body_capped(response: reqwest::Response, max_bytes: usize) -> Result<String, String> {
    let mut body = Vec::with_capacity(max_bytes.min(256 * 1024));
    let mut stream = response.bytes_stream();
    let mut total = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| format!("Stream read error: {}", e))?;
        let remaining = max_bytes.saturating_sub(total);
        if remaining == 0 {
            debug!("HTTP response truncated at {} bytes (limit: {})", total, max_bytes);
            break;
        }
        let take = chunk.len().min(remaining);
        body.extend_from_slice(&chunk[..take]);
        total += take;
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}
