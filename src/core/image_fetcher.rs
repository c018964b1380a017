// Candidate image download and decoding

use crate::core::config::FetchConfig;
use crate::models::image::{DecodedImage, FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, ClientBuilder, Url};
use std::time::Duration;

/// Source of decoded candidate images.
///
/// Every failure resolves to a `FetchError`; implementations must never
/// panic on bad input since a single broken URL must not stop a batch.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult<DecodedImage>;
}

/// Reject anything without both a scheme and a network location
pub fn validate_url(url: &str) -> FetchResult<Url> {
    if url.trim().is_empty() {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }

    let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(FetchError::InvalidUrl(url.to_string())),
    }
}

// ==============================================================================
// HTTP Fetcher
// ==============================================================================

/// Client settings shared by every candidate request
pub fn client_builder(config: &FetchConfig) -> FetchResult<ClientBuilder> {
    let mut headers = HeaderMap::new();
    let agent = HeaderValue::from_str(&config.user_agent)
        .map_err(|e| FetchError::Transport(format!("Invalid user agent: {}", e)))?;
    headers.insert(USER_AGENT, agent);

    Ok(Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs)))
}

pub struct HttpImageFetcher {
    client: Client,
    max_image_bytes: u64,
}

impl HttpImageFetcher {
    pub fn new(config: &FetchConfig) -> FetchResult<Self> {
        let client = client_builder(config)?.build()?;
        Ok(Self::with_client(client, config.max_image_bytes))
    }

    pub fn with_client(client: Client, max_image_bytes: u64) -> Self {
        Self {
            client,
            max_image_bytes,
        }
    }

    /// Stream the response body, stopping as soon as the size cap is crossed
    async fn download(&self, url: Url) -> FetchResult<Vec<u8>> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_image_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_image_bytes,
                });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (body.len() + chunk.len()) as u64 > self.max_image_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_image_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<DecodedImage> {
        let parsed = validate_url(url)?;
        let body = self.download(parsed).await?;

        // Decoding sniffs the format from the bytes, not the served content type
        let pixels = image::load_from_memory(&body)?.to_rgb8();
        Ok(DecodedImage::new(url, pixels))
    }
}
