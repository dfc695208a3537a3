//! MusicBrainz HTTP client
//!
//! Handles communication with the MusicBrainz web service.
//! See: https://musicbrainz.org/doc/MusicBrainz_API
//!
//! IMPORTANT: MusicBrainz requires a User-Agent header and rate limits to 1 req/sec.

use async_trait::async_trait;

use super::{adapter, dto};
use crate::sources::{ArtistSearchApi, FetchError};

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
}

/// User agent string - MusicBrainz requires this
const USER_AGENT: &str = concat!(
    "LyricHarvest/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/lyric-harvest)"
);

impl MusicBrainzClient {
    /// Create a new client
    pub fn new() -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| FetchError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: "https://musicbrainz.org/ws/2".to_string(),
        })
    }

    /// Create a client for testing with custom base URL
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    /// Search artists by keyword, one page at a time.
    pub async fn search_artists(
        &self,
        query: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<String>, FetchError> {
        let response = self.send_search_request(query, offset, limit).await?;
        Ok(adapter::to_names(response))
    }

    /// Send the HTTP request and parse the response
    async fn send_search_request(
        &self,
        query: &str,
        offset: u32,
        limit: u32,
    ) -> Result<dto::ArtistSearchResponse, FetchError> {
        let url = format!("{}/artist/", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("query", query),
                ("offset", &offset.to_string()),
                ("limit", &limit.to_string()),
                ("fmt", "json"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FetchError::Auth(format!("HTTP {status}")));
        }

        if !status.is_success() {
            // Try to parse error response
            if let Ok(error) = response.json::<dto::ApiError>().await {
                return Err(FetchError::Api(error.error));
            }
            return Err(FetchError::Api(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .json::<dto::ArtistSearchResponse>()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ArtistSearchApi for MusicBrainzClient {
    async fn search(
        &self,
        query: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<String>, FetchError> {
        self.search_artists(query, offset, limit).await
    }
}
