//! Stage orchestration for the three-stage ingestion pipeline.
//!
//! The orchestrator walks a fixed state machine:
//!
//! ```text
//! Init -> RunningArtists -> WaitingArtistThreshold -> RunningSongs
//!      -> WaitingSongThreshold -> RunningLyrics -> Done
//! ```
//!
//! The `Waiting*` states poll a row-count threshold at a fixed interval
//! before advancing. This is a soft dependency, not a lock: it tolerates
//! the upstream stage still filling the table from another process.
//!
//! Each stage checkpoints through [`ProgressStore`] as it goes, so the
//! pipeline can be interrupted between items or pages and resumed with at
//! most one in-flight page of rework.

mod artists;
mod lyrics;
mod songs;

pub use artists::{ArtistStage, ArtistStageSummary};
pub use lyrics::{BatchSummary, ItemFailure, LyricService, LyricStage, LyricStageSummary};
pub use songs::{SongStage, SongStageSummary};

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::error::{Error, Result};
use crate::progress::ProgressStore;
use crate::sources::{ArtistSearchApi, LyricApi, SongSearchApi};

/// The adapters each stage pulls from, injected so tests can substitute
/// mocks for the real clients.
pub struct StageAdapters {
    pub artist_search: Arc<dyn ArtistSearchApi>,
    pub song_search: Arc<dyn SongSearchApi>,
    pub lyric_chain: Vec<Arc<dyn LyricApi>>,
}

/// Pipeline state machine positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    RunningArtists,
    WaitingArtistThreshold,
    RunningSongs,
    WaitingSongThreshold,
    RunningLyrics,
    Done,
}

/// Sequences the three stages with threshold gates in between.
pub struct Orchestrator {
    pool: SqlitePool,
    artist_stage: ArtistStage,
    song_stage: SongStage,
    lyric_stage: LyricStage,
    artist_threshold: i64,
    song_threshold: i64,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        pool: SqlitePool,
        config: &Config,
        adapters: StageAdapters,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let progress = ProgressStore::new(pool.clone());
        let policy = config.retry.policy();

        let artist_stage = ArtistStage::new(
            pool.clone(),
            progress.clone(),
            adapters.artist_search,
            policy.clone(),
            config.ingest.search_query.clone(),
            config.ingest.page_limit,
            shutdown.clone(),
        );
        let song_stage = SongStage::new(
            pool.clone(),
            progress.clone(),
            adapters.song_search,
            policy.clone(),
            shutdown.clone(),
        );
        let lyric_stage = LyricStage::new(
            pool.clone(),
            progress,
            adapters.lyric_chain,
            policy,
            shutdown.clone(),
        );

        Self {
            pool,
            artist_stage,
            song_stage,
            lyric_stage,
            artist_threshold: config.ingest.artist_threshold,
            song_threshold: config.ingest.song_threshold,
            poll_interval: Duration::from_secs(config.ingest.poll_interval_secs),
            shutdown,
        }
    }

    /// Drive the state machine from `Init` to `Done`.
    ///
    /// A fatal stage error stops the pipeline; an early shutdown request
    /// simply stops advancing, leaving the checkpoints as the resume point.
    pub async fn run(&self) -> Result<()> {
        let mut stage = Stage::Init;

        while stage != Stage::Done && !self.shutdown.load(Ordering::Relaxed) {
            stage = self.step(stage).await?;
        }

        if stage == Stage::Done {
            tracing::info!("pipeline complete");
        } else {
            tracing::info!(?stage, "pipeline interrupted, checkpoints saved");
        }
        Ok(())
    }

    /// Execute one state and return the next.
    async fn step(&self, stage: Stage) -> Result<Stage> {
        match stage {
            Stage::Init => Ok(Stage::RunningArtists),
            Stage::RunningArtists => {
                let summary = self.artist_stage.run().await?;
                tracing::info!(
                    pages = summary.pages,
                    new_artists = summary.new_artists,
                    offset = summary.final_offset,
                    "artist stage finished"
                );
                Ok(Stage::WaitingArtistThreshold)
            }
            Stage::WaitingArtistThreshold => {
                self.wait_for_count(
                    "artists",
                    self.artist_threshold,
                    || db::count_artists(&self.pool),
                )
                .await?;
                Ok(Stage::RunningSongs)
            }
            Stage::RunningSongs => {
                let summary = self.song_stage.run().await?;
                tracing::info!(
                    artists_processed = summary.artists_processed,
                    new_songs = summary.new_songs,
                    failed = summary.failed,
                    "song stage finished"
                );
                Ok(Stage::WaitingSongThreshold)
            }
            Stage::WaitingSongThreshold => {
                self.wait_for_count("songs", self.song_threshold, || db::count_songs(&self.pool))
                    .await?;
                Ok(Stage::RunningLyrics)
            }
            Stage::RunningLyrics => {
                let summary = self.lyric_stage.run().await?;
                tracing::info!(
                    songs_processed = summary.songs_processed,
                    saved = summary.saved,
                    missing = summary.missing,
                    failed = summary.failed,
                    "lyric stage finished"
                );
                Ok(Stage::Done)
            }
            Stage::Done => Ok(Stage::Done),
        }
    }

    async fn wait_for_count<F, Fut>(&self, what: &str, min: i64, count: F) -> Result<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = sqlx::Result<i64>>,
    {
        wait_for_count(
            what,
            min,
            self.poll_interval,
            &self.shutdown,
            count,
        )
        .await
    }
}

/// Poll `count` until it reaches `min` or shutdown is requested.
pub(crate) async fn wait_for_count<F, Fut>(
    what: &str,
    min: i64,
    poll_interval: Duration,
    shutdown: &AtomicBool,
    count: F,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = sqlx::Result<i64>>,
{
    loop {
        let current = count().await.map_err(Error::Database)?;
        if current >= min {
            tracing::info!(what, current, min, "stage gate open");
            return Ok(());
        }
        if shutdown.load(Ordering::Relaxed) {
            return Ok(());
        }
        tracing::info!(what, current, min, "waiting for stage gate");
        tokio::time::sleep(poll_interval).await;
    }
}
