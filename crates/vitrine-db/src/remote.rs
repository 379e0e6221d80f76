//! HTTP fetch of legacy media that only exists at a remote URL.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::debug;

use vitrine_core::{defaults, Error, Result};

/// Default timeout for a remote media download.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Downloads media bytes over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpMediaFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, max_bytes })
    }

    /// Fetcher with the default timeout and upload limit.
    pub fn with_defaults() -> Result<Self> {
        Self::new(
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            defaults::MAX_UPLOAD_BYTES,
        )
    }

    /// True for URLs this fetcher will try.
    pub fn supports(url: &str) -> bool {
        let lower = url.trim_start().to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }

    /// Download `url`. A 404 or 410 is `Ok(None)`.
    pub async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            debug!(subsystem = "remote", op = "fetch", url, %status, "Remote media missing");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Request(format!("GET {} returned {}", url, status)));
        }
        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(Error::InvalidInput(format!(
                    "remote media is {} bytes, limit is {}",
                    length, self.max_bytes
                )));
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(Error::InvalidInput(format!(
                "remote media is {} bytes, limit is {}",
                bytes.len(),
                self.max_bytes
            )));
        }
        debug!(subsystem = "remote", op = "fetch", url, size = bytes.len(), "Remote media fetched");
        Ok(Some(bytes.to_vec()))
    }
}
