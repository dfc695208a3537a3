//! CLI command definitions and handlers.
//!
//! Each subcommand is implemented as a function that takes the parsed
//! arguments and returns an `anyhow::Result<()>`. Pipeline commands install
//! a Ctrl+C handler that requests shutdown; the running stage notices at the
//! next item or page boundary and checkpoints before returning.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Runtime;

use crate::config::{self, Config};
use crate::db;
use crate::pipeline::{
    ArtistStage, LyricService, LyricStage, Orchestrator, SongStage, StageAdapters,
};
use crate::progress::{ProgressStore, TaskType};
use crate::retry::RetryPolicy;
use crate::sources::genius::GeniusClient;
use crate::sources::lyricsovh::LyricsOvhClient;
use crate::sources::musicbrainz::MusicBrainzClient;
use crate::sources::{ArtistSearchApi, LyricApi, SongSearchApi};

/// Lyric Harvest CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the config file (default: OS config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database file
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Genius API token (or set in the config file)
    #[arg(long, env = "GENIUS_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline: artists, then songs, then lyrics
    Run {
        /// Seed query for artist discovery (overrides config)
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Run only the artist-discovery stage
    Artists {
        /// Seed query for artist discovery (overrides config)
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Run only the song-discovery stage
    Songs,
    /// Run only the lyric-acquisition stage
    Lyrics,
    /// Show per-task progress and table counts
    Status,
    /// Fetch one song's lyric, adding the artist and song if needed
    FetchLyric {
        /// Artist name
        #[arg(long)]
        artist: String,
        /// Song title
        #[arg(long)]
        title: String,
    },
    /// Resolve a batch of songs that have no lyric row yet
    ProcessMissing {
        /// Maximum songs to attempt in this batch
        #[arg(long, default_value = "100")]
        limit: i64,
        /// Songs to skip from the front of the missing list
        #[arg(long, default_value = "0")]
        offset: i64,
    },
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(db_path) = &cli.db {
        config.database.path = db_path.clone();
    }
    if let Some(key) = &cli.api_key {
        config.credentials.genius_api_key = Some(key.clone());
    }

    match &cli.command {
        Commands::Run { query } => {
            apply_query(&mut config, query);
            cmd_run(&rt, &config)
        }
        Commands::Artists { query } => {
            apply_query(&mut config, query);
            cmd_artists(&rt, &config)
        }
        Commands::Songs => cmd_songs(&rt, &config),
        Commands::Lyrics => cmd_lyrics(&rt, &config),
        Commands::Status => cmd_status(&rt, &config),
        Commands::FetchLyric { artist, title } => cmd_fetch_lyric(&rt, &config, artist, title),
        Commands::ProcessMissing { limit, offset } => {
            cmd_process_missing(&rt, &config, *limit, *offset)
        }
    }
}

fn apply_query(config: &mut Config, query: &Option<String>) {
    if let Some(q) = query {
        config.ingest.search_query = q.clone();
    }
}

/// Flag flipped by Ctrl+C; stages poll it between items and pages.
fn shutdown_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nShutdown requested, finishing current item...");
            handler_flag.store(true, Ordering::Relaxed);
        }
    });
    flag
}

fn lyric_chain(config: &Config) -> anyhow::Result<Vec<Arc<dyn LyricApi>>> {
    let genius = GeniusClient::new(config.require_genius_api_key()?)?;
    Ok(vec![
        Arc::new(LyricsOvhClient::new()?),
        Arc::new(genius),
    ])
}

// ============================================================================
// Individual command implementations
// ============================================================================

fn cmd_run(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    // Resolve the credential before any stage runs.
    let genius = Arc::new(GeniusClient::new(config.require_genius_api_key()?)?);

    let adapters = StageAdapters {
        artist_search: Arc::new(MusicBrainzClient::new()?),
        song_search: genius.clone() as Arc<dyn SongSearchApi>,
        lyric_chain: vec![
            Arc::new(LyricsOvhClient::new()?),
            genius as Arc<dyn LyricApi>,
        ],
    };

    rt.block_on(async {
        let pool = db::init_db(&db::db_url(Some(&config.database.path))).await?;
        let shutdown = shutdown_flag();
        let orchestrator = Orchestrator::new(pool, config, adapters, shutdown);
        orchestrator.run().await?;
        Ok(())
    })
}

fn cmd_artists(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    let adapter: Arc<dyn ArtistSearchApi> = Arc::new(MusicBrainzClient::new()?);

    rt.block_on(async {
        let pool = db::init_db(&db::db_url(Some(&config.database.path))).await?;
        let stage = ArtistStage::new(
            pool.clone(),
            ProgressStore::new(pool),
            adapter,
            config.retry.policy(),
            config.ingest.search_query.clone(),
            config.ingest.page_limit,
            shutdown_flag(),
        );
        let summary = stage.run().await?;
        println!(
            "Done: {} pages, {} new artists, offset {}",
            summary.pages, summary.new_artists, summary.final_offset
        );
        Ok(())
    })
}

fn cmd_songs(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    let adapter: Arc<dyn SongSearchApi> =
        Arc::new(GeniusClient::new(config.require_genius_api_key()?)?);

    rt.block_on(async {
        let pool = db::init_db(&db::db_url(Some(&config.database.path))).await?;
        let stage = SongStage::new(
            pool.clone(),
            ProgressStore::new(pool),
            adapter,
            config.retry.policy(),
            shutdown_flag(),
        );
        let summary = stage.run().await?;
        println!(
            "Done: {} artists processed, {} new songs, {} failed",
            summary.artists_processed, summary.new_songs, summary.failed
        );
        Ok(())
    })
}

fn cmd_lyrics(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    let chain = lyric_chain(config)?;

    rt.block_on(async {
        let pool = db::init_db(&db::db_url(Some(&config.database.path))).await?;
        let stage = LyricStage::new(
            pool.clone(),
            ProgressStore::new(pool),
            chain,
            config.retry.policy(),
            shutdown_flag(),
        );
        let summary = stage.run().await?;
        println!(
            "Done: {} songs processed, {} saved, {} missing, {} failed",
            summary.songs_processed, summary.saved, summary.missing, summary.failed
        );
        Ok(())
    })
}

fn cmd_status(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = db::init_db(&db::db_url(Some(&config.database.path))).await?;

        println!("Catalog");
        println!("  artists: {}", db::count_artists(&pool).await?);
        println!("  songs:   {}", db::count_songs(&pool).await?);
        println!();

        println!("Tasks");
        let store = ProgressStore::new(pool);
        for task in TaskType::all() {
            let record = store.get(task).await?;
            let total = record
                .total_items
                .map(|t| format!("/{t}"))
                .unwrap_or_default();
            print!(
                "  {:<8} {:<10} offset {}{}",
                task.to_string(),
                record.status,
                record.current_offset,
                total
            );
            if let Some(err) = &record.error_message {
                print!("  ({err})");
            }
            println!();
        }
        Ok(())
    })
}

fn cmd_fetch_lyric(rt: &Runtime, config: &Config, artist: &str, title: &str) -> anyhow::Result<()> {
    let chain = lyric_chain(config)?;
    let policy = config.retry.policy();

    rt.block_on(async {
        let pool = db::init_db(&db::db_url(Some(&config.database.path))).await?;
        let service = LyricService::new(pool, chain, policy);
        let text = service.fetch_and_save(artist, title).await?;
        println!("{text}");
        Ok(())
    })
}

fn cmd_process_missing(
    rt: &Runtime,
    config: &Config,
    limit: i64,
    offset: i64,
) -> anyhow::Result<()> {
    let chain = lyric_chain(config)?;
    let policy: RetryPolicy = config.retry.policy();

    rt.block_on(async {
        let pool = db::init_db(&db::db_url(Some(&config.database.path))).await?;
        let service = LyricService::new(pool, chain, policy);
        let summary = service.process_missing(limit, offset).await?;

        println!(
            "Done: {} processed, {} saved, {} failed",
            summary.processed,
            summary.saved,
            summary.failed.len()
        );
        for failure in &summary.failed {
            println!("  song {}: {}", failure.song_id, failure.reason);
        }
        Ok(())
    })
}
