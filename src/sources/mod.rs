//! External source adapters and their shared failure taxonomy.
//!
//! Each ingestion stage consumes one or more pluggable fetchers through the
//! traits defined here. Concrete clients live in submodules; their internal
//! response shapes never leak past the adapter boundary - every fetch
//! returns canonical records or a [`FetchError`].
//!
//! The traits enable dependency injection and mocking for tests. Production
//! code uses the real client implementations, while tests substitute mocks.

pub mod genius;
pub mod lyricsovh;
pub mod musicbrainz;

use async_trait::async_trait;

use crate::retry::{Classify, FailureClass};

/// Failure taxonomy shared by every stage adapter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Source signaled throttling (HTTP 429)
    #[error("rate limited - try again later")]
    RateLimited,

    /// Connectivity/timeout failure
    #[error("network error: {0}")]
    Network(String),

    /// The queried entity does not exist at the source. A normal,
    /// non-error empty result - never retried.
    #[error("not found at source")]
    NotFound,

    /// Bad or missing credentials - fatal for the whole stage
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Malformed configuration - fatal for the whole stage
    #[error("configuration error: {0}")]
    Config(String),

    /// Response arrived but could not be decoded
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Source returned an error payload (5xx and friends)
    #[error("API request failed: {0}")]
    Api(String),
}

impl Classify for FetchError {
    fn classify(&self) -> FailureClass {
        match self {
            Self::RateLimited => FailureClass::RateLimited,
            Self::Network(_) | Self::Api(_) => FailureClass::Transient,
            Self::NotFound | Self::Auth(_) | Self::Config(_) | Self::Parse(_) => {
                FailureClass::Permanent
            }
        }
    }
}

impl FetchError {
    /// Whether this failure must abort the enclosing stage rather than be
    /// recorded as a per-item failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Config(_))
    }
}

/// One page of an artist keyword search.
///
/// Implement this trait to create mock implementations for testing.
#[async_trait]
pub trait ArtistSearchApi: Send + Sync {
    /// Search artists matching `query`, returning an ordered list of
    /// canonical names (may be empty).
    async fn search(&self, query: &str, offset: u32, limit: u32)
    -> Result<Vec<String>, FetchError>;
}

/// Per-artist song discovery.
#[async_trait]
pub trait SongSearchApi: Send + Sync {
    /// Return song titles known for the artist.
    async fn search_songs(&self, artist: &str) -> Result<Vec<String>, FetchError>;
}

/// One link in the lyric source chain.
#[async_trait]
pub trait LyricApi: Send + Sync {
    /// Stable identifier stored in `lyrics.source`.
    fn id(&self) -> &'static str;

    /// Fetch the lyric text for a song, or [`FetchError::NotFound`].
    async fn fetch_lyric(&self, artist: &str, title: &str) -> Result<String, FetchError>;
}
