//! Genius HTTP client
//!
//! Handles both the authenticated API search and the public song-page fetch.
//! Genius rate limits aggressively; 429 responses surface as
//! [`FetchError::RateLimited`] so the retry executor can apply the wide
//! backoff tier.

use async_trait::async_trait;

use super::{adapter, dto};
use crate::sources::{FetchError, LyricApi, SongSearchApi};

/// Genius API client
pub struct GeniusClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

// Manual impl: the api_key must never reach logs or error output.
impl std::fmt::Debug for GeniusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeniusClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

const USER_AGENT: &str = concat!(
    "LyricHarvest/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/lyric-harvest)"
);

impl GeniusClient {
    /// Create a new client with the given API token.
    pub fn new(api_key: impl Into<String>) -> Result<Self, FetchError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(FetchError::Config("Genius API key is empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: "https://api.genius.com".to_string(),
        })
    }

    /// Create a client for testing with custom base URL
    #[cfg(test)]
    pub fn with_base_url(api_key: &str, base_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http_client,
            api_key: api_key.to_string(),
            base_url: base_url.into(),
        }
    }

    /// Run an API search and parse the response.
    async fn search(&self, query: &str) -> Result<dto::SearchResponse, FetchError> {
        let url = format!("{}/search", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FetchError::Auth(format!("HTTP {status}")));
        }

        if !status.is_success() {
            return Err(FetchError::Api(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .json::<dto::SearchResponse>()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }

    /// Fetch a public song page and return its raw body.
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }

        if !status.is_success() {
            return Err(FetchError::Api(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}

#[async_trait]
impl SongSearchApi for GeniusClient {
    async fn search_songs(&self, artist: &str) -> Result<Vec<String>, FetchError> {
        let response = self.search(artist).await?;
        Ok(adapter::to_titles(response))
    }
}

#[async_trait]
impl LyricApi for GeniusClient {
    fn id(&self) -> &'static str {
        "genius"
    }

    async fn fetch_lyric(&self, artist: &str, title: &str) -> Result<String, FetchError> {
        let response = self.search(&format!("{artist} {title}")).await?;
        let Some(url) = adapter::first_song_url(&response) else {
            return Err(FetchError::NotFound);
        };
        let url = url.to_string();

        let page = self.fetch_page(&url).await?;
        adapter::extract_lyric_text(&page).ok_or(FetchError::NotFound)
    }
}
