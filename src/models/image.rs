// Data models for downloaded candidate images

use image::RgbImage;
use reqwest::StatusCode;
use thiserror::Error;

/// Decoded RGB pixels (height x width x 3) plus the URL they came from
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub url: String,
    pub pixels: RgbImage,
}

impl DecodedImage {
    pub fn new(url: impl Into<String>, pixels: RgbImage) -> Self {
        Self {
            url: url.into(),
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

// ==============================================================================
// Errors
// ==============================================================================

/// Why a candidate image could not be obtained. Never fatal to a batch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0:?}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(StatusCode),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Image body exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

impl FetchError {
    /// Stable short name used in run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl(_) => "invalid_url",
            FetchError::Http(_) => "http_error",
            FetchError::Transport(_) => "transport_error",
            FetchError::TooLarge { .. } => "too_large",
            FetchError::Decode(_) => "decode_error",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Http(status),
            None => FetchError::Transport(err.to_string()),
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
