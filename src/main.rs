//! Lyric Harvest - a staged music-metadata ingestion pipeline.
//!
//! Discovers artists by keyword search, discovers each artist's songs, and
//! acquires a lyric per song from a chain of sources, checkpointing every
//! step so any run can be interrupted and resumed.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod sources;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("lyric_harvest=info".parse().unwrap()))
        .init();

    cli::run_command(&args)
}
