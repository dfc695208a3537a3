//! Genius API integration
//!
//! Serves two stages: per-artist song discovery (API search) and lyric
//! acquisition (API search for the song page, then a narrow text extraction
//! from it). Genius requires a bearer token for all API calls.
//!
//! API docs: https://docs.genius.com/

pub mod dto;
mod adapter;
mod client;

pub use adapter::{extract_lyric_text, to_titles};
pub use client::GeniusClient;
