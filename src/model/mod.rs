//! Core data models for the ingestion pipeline.
//!
//! Defines the primary entities: [`Artist`], [`Song`], and [`Lyric`].
//! These are derived from SQLx for database mapping.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `artists` - Discovered artists with unique names
//! - `songs` - Songs owned by an artist, unique per `(artist_id, title)`
//! - `lyrics` - At most one lyric per song

use sqlx::FromRow;

/// Sentinel lyric text recording "attempted, nothing found".
///
/// Distinguishes a song whose lyric lookup was exhausted without a result
/// from one that was never attempted (no `lyrics` row at all).
pub const NO_LYRIC: &str = "no lyric";

/// A discovered artist.
#[derive(Debug, Clone, FromRow)]
pub struct Artist {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Artist name (unique, case-sensitive)
    pub name: String,
    /// When the artist was first persisted (RFC 3339)
    pub discovered_at: String,
    /// The search query that produced this artist
    pub source_query: String,
}

/// A song discovered for an artist.
#[derive(Debug, Clone, FromRow)]
pub struct Song {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Foreign key to artists table (cascades on artist deletion)
    pub artist_id: i64,
    /// Song title (unique per artist)
    pub title: String,
    /// When the song was first persisted (RFC 3339)
    pub discovered_at: String,
}

/// A lyric fetched for a song.
#[derive(Debug, Clone, FromRow)]
pub struct Lyric {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Foreign key to songs table (unique - at most one lyric per song)
    pub song_id: i64,
    /// Lyric text, or [`NO_LYRIC`] when every source came up empty
    pub text: String,
    /// Identifier of the adapter that supplied the text
    pub source: String,
    /// When the lyric was fetched (RFC 3339)
    pub fetched_at: String,
}

/// A song joined with its owning artist's name.
///
/// Used by the lyric stage, which needs both identity (for progress) and
/// the names (for the external lookups).
#[derive(Debug, Clone, FromRow)]
pub struct SongForLyrics {
    /// Song database ID
    pub id: i64,
    /// Owning artist's database ID
    pub artist_id: i64,
    /// Owning artist's name
    pub artist_name: String,
    /// Song title
    pub title: String,
}
