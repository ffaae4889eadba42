//! Image generation upstream (Pollinations). Single endpoint, no credentials.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{StatusCode, Url};

/// Text prepended to every prompt before it is sent upstream.
pub const PROMPT_PREFIX: &str = "high quality, detailed, professional: ";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImageError {
    /// The upstream model is still warming up (HTTP 503).
    #[error("image service is loading")]
    ServiceLoading,
    #[error("request timed out")]
    Timeout,
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Image generation upstream trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageUpstream: Send + Sync {
    /// Generate an image for `prompt`. `seed` varies the output between identical prompts.
    async fn generate(&self, prompt: &str, seed: u64) -> Result<Vec<u8>, ImageError>;
}

pub const DEFAULT_BASE_URL: &str = "https://image.pollinations.ai";

/// Pollinations implementation of ImageUpstream.
pub struct PollinationsClient {
    http: reqwest::Client,
    base_url: Url,
    size: u32,
}

impl PollinationsClient {
    pub fn new(base_url: &str, size: u32, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("image base url must be hierarchical: {}", base_url);
        }

        Ok(Self {
            http,
            base_url,
            size,
        })
    }

    /// `{base}/prompt/{encoded prompt}?width=..&height=..&seed=..&nologo=true&enhance=true`
    fn request_url(&self, prompt: &str, seed: u64) -> Url {
        let mut url = self.base_url.clone();
        let enhanced = format!("{}{}", PROMPT_PREFIX, prompt);
        let size = self.size.to_string();

        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("prompt").push(&enhanced);
        }
        url.query_pairs_mut()
            .append_pair("width", &size)
            .append_pair("height", &size)
            .append_pair("seed", &seed.to_string())
            .append_pair("nologo", "true")
            .append_pair("enhance", "true");

        url
    }
}

#[async_trait]
impl ImageUpstream for PollinationsClient {
    async fn generate(&self, prompt: &str, seed: u64) -> Result<Vec<u8>, ImageError> {
        let response = self
            .http
            .get(self.request_url(prompt, seed))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::SERVICE_UNAVAILABLE => return Err(ImageError::ServiceLoading),
            status if !status.is_success() => return Err(ImageError::Status(status.as_u16())),
            _ => {}
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}

fn transport_error(err: reqwest::Error) -> ImageError {
    if err.is_timeout() {
        ImageError::Timeout
    } else {
        ImageError::Transport(err.without_url().to_string())
    }
}

/// Millisecond timestamp plus a random offset, so repeated prompts differ.
pub fn random_seed() -> u64 {
    let millis = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
    millis + rand::rng().random_range(0..=100_000)
}
