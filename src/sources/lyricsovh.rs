//! lyrics.ovh client - first link in the lyric source chain.
//!
//! A single unauthenticated JSON endpoint keyed by artist and title. It
//! knows far fewer songs than Genius but costs nothing to try, so the
//! chain consults it first.

use async_trait::async_trait;
use serde::Deserialize;

use crate::sources::{FetchError, LyricApi};

/// lyrics.ovh API client
pub struct LyricsOvhClient {
    http_client: reqwest::Client,
    base_url: String,
}

/// Response body: `{"lyrics": "..."}` on success.
#[derive(Debug, Deserialize)]
struct LyricsResponse {
    lyrics: String,
}

impl LyricsOvhClient {
    /// Create a new client
    pub fn new() -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| FetchError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: "https://api.lyrics.ovh/v1".to_string(),
        })
    }

    /// Create a client for testing with custom base URL
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LyricApi for LyricsOvhClient {
    fn id(&self) -> &'static str {
        "lyrics.ovh"
    }

    async fn fetch_lyric(&self, artist: &str, title: &str) -> Result<String, FetchError> {
        let url = format!("{}/{}/{}", self.base_url, artist, title);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();

        // lyrics.ovh answers 404 for any song it does not know
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }

        if !status.is_success() {
            return Err(FetchError::Api(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response
            .json::<LyricsResponse>()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        if body.lyrics.trim().is_empty() {
            return Err(FetchError::NotFound);
        }

        Ok(body.lyrics)
    }
}
