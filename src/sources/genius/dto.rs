//! Genius API Data Transfer Objects
//!
//! These types match EXACTLY what the Genius /search endpoint returns
//! (the subset we read). DO NOT use these types outside the genius module -
//! convert to plain records at the adapter.
//!
//! API Reference: https://docs.genius.com/#search-h2

use serde::{Deserialize, Serialize};

/// Top-level search response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResponse {
    pub response: SearchBody,
}

/// Search body wrapping the hit list
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchBody {
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// One search hit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Hit {
    pub result: SongResult,
}

/// The song behind a hit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SongResult {
    /// Genius song ID
    pub id: u64,
    /// Song title
    pub title: Option<String>,
    /// Full display title ("Song by Artist")
    pub full_title: Option<String>,
    /// Public song page URL (where the lyric lives)
    pub url: Option<String>,
}

// ============================================================================
// CONTRACT TESTS
// These verify our DTOs match what the real API returns.
// ============================================================================
