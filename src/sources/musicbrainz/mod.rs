//! MusicBrainz API integration
//!
//! Drives the artist-discovery stage: paginated keyword search over the
//! artist index, returning canonical names in result order.
//!
//! API docs: https://musicbrainz.org/doc/MusicBrainz_API

pub mod dto;
mod adapter;
mod client;

pub use adapter::to_names;
pub use client::MusicBrainzClient;
