//! Command-line interface for lyric-harvest.
//!
//! This module provides the pipeline commands (full run or a single stage)
//! and the catalog commands (status, single-song fetch, batch fill).

mod commands;

pub use commands::{Cli, Commands, run_command};
