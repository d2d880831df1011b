use std::time::Duration;

use tracing::debug;

use crate::error::PlaybackError;

/// Source of reply audio bytes
#[async_trait::async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Download the complete file behind `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PlaybackError>;
}

/// Plain HTTP GET via reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, PlaybackError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlaybackError::Fetch(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl AudioFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PlaybackError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PlaybackError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlaybackError::HttpStatus(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PlaybackError::Fetch(e.to_string()))?;

        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}
