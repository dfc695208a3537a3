//! Adapter layer: Convert MusicBrainz DTOs to canonical records
//!
//! This is the ONLY place where DTO types leave the musicbrainz module.
//! If MusicBrainz changes their response format, only this file and dto.rs
//! need to change.

use super::dto;

/// Extract the ordered list of canonical artist names from a search page.
///
/// Order is preserved because the stage's raw-page-cursor offset semantics
/// depend on stable result ordering across re-fetches.
pub fn to_names(response: dto::ArtistSearchResponse) -> Vec<String> {
    response.artists.into_iter().map(|a| a.name).collect()
}
