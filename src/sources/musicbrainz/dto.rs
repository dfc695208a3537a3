//! MusicBrainz API Data Transfer Objects
//!
//! These types match EXACTLY what the MusicBrainz API returns.
//! DO NOT add fields that aren't in the API response.
//! DO NOT use these types outside the musicbrainz module - convert to plain
//! records at the adapter.
//!
//! API Reference: https://musicbrainz.org/doc/MusicBrainz_API/Search

use serde::{Deserialize, Serialize};

/// Artist search response (paginated)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistSearchResponse {
    /// Total number of matches known to the server
    pub count: Option<u64>,
    /// Offset of this page
    pub offset: Option<u64>,
    /// Artists on this page, in result order
    #[serde(default)]
    pub artists: Vec<ArtistResult>,
}

/// One artist search hit
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArtistResult {
    /// MusicBrainz artist ID
    pub id: String,
    /// Official artist name
    pub name: String,
    /// Sort name (e.g., "Beatles, The")
    pub sort_name: Option<String>,
    /// Search score (0-100)
    pub score: Option<u32>,
}

/// Error response from MusicBrainz API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub error: String,
    pub help: Option<String>,
}

// ============================================================================
// CONTRACT TESTS
// These verify our DTOs match what the real API returns.
// If these fail, the API has changed and we need to update our DTOs.
// ============================================================================

#[cfg(test)]
mod contract_tests {
    use super::*;

    #[test]
    fn test_parse_minimal_search_response() {
        let json = r#"{
            "count": 0,
            "offset": 0,
            "artists": []
        }"#;

        let response: ArtistSearchResponse =
            serde_json::from_str(json).expect("Should parse empty search response");

        assert_eq!(response.count, Some(0));
        assert!(response.artists.is_empty());
    }

    #[test]
    fn test_parse_search_response_with_artists() {
        let json = r#"{
            "created": "2024-01-01T00:00:00.000Z",
            "count": 3124,
            "offset": 100,
            "artists": [
                {
                    "id": "art-1",
                    "name": "Aretha Franklin",
                    "sort-name": "Franklin, Aretha",
                    "score": 100
                },
                {
                    "id": "art-2",
                    "name": "Arcade Fire",
                    "sort-name": "Arcade Fire",
                    "score": 98
                }
            ]
        }"#;

        let response: ArtistSearchResponse =
            serde_json::from_str(json).expect("Should parse search response");

        assert_eq!(response.offset, Some(100));
        assert_eq!(response.artists.len(), 2);
        assert_eq!(response.artists[0].name, "Aretha Franklin");
        assert_eq!(response.artists[0].score, Some(100));
        assert_eq!(
            response.artists[1].sort_name,
            Some("Arcade Fire".to_string())
        );
    }

    #[test]
    fn test_parse_error_response() {
        let json = r#"{
            "error": "Not Found",
            "help": "For usage, please see: https://musicbrainz.org/doc/MusicBrainz_API"
        }"#;

        let error: ApiError = serde_json::from_str(json).expect("Should parse error");
        assert_eq!(error.error, "Not Found");
        assert!(error.help.is_some());
    }
}
