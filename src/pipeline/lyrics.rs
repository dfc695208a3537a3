//! Lyric-acquisition stage and the single-song lyric service.
//!
//! Both walk the same source chain: each configured [`LyricApi`] is tried in
//! order and the first hit wins. A song every source denies knowing gets the
//! sentinel row so it is never asked about again; a song that only failed
//! transiently gets no row at all and stays eligible for the next pass.
//!
//! Offset semantics for the stage are a processed-index into the stable
//! song list ((artist_id, id) order), checkpointed after every song.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sqlx::SqlitePool;

use crate::db;
use crate::error::{Error, Result};
use crate::model::{NO_LYRIC, SongForLyrics};
use crate::progress::{ProgressStore, ProgressUpdate, TaskStatus, TaskType};
use crate::retry::{RetryError, RetryPolicy};
use crate::sources::{FetchError, LyricApi};

/// `lyrics.source` value for the sentinel row, which no single source owns.
const MISSING_SOURCE: &str = "none";

/// What a lyric stage run accomplished.
#[derive(Debug, Default)]
pub struct LyricStageSummary {
    /// Songs consumed this run (includes already-resolved skips)
    pub songs_processed: u32,
    /// Real lyric rows written
    pub saved: u32,
    /// Sentinel rows written (every source confirmed absence)
    pub missing: u32,
    /// Songs left without a row after transient failures
    pub failed: u32,
}

/// Per-song outcome of one batch call.
#[derive(Debug)]
pub struct ItemFailure {
    pub song_id: i64,
    pub reason: String,
}

/// What one `process_missing` batch accomplished.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub processed: u32,
    pub saved: u32,
    pub failed: Vec<ItemFailure>,
}

/// Resolution of a full walk of the source chain for one song.
enum ChainOutcome {
    Found { text: String, source: &'static str },
    /// Every source answered "not found"
    Missing,
    /// No source found it and at least one failed for another reason,
    /// so absence is not confirmed
    Failed(String),
}

/// Walk the chain in order; first successful fetch wins.
///
/// Only fatal failures (bad credentials, bad configuration) surface as
/// errors. Anything else falls through to the next source.
async fn fetch_via_chain(
    chain: &[Arc<dyn LyricApi>],
    policy: &RetryPolicy,
    artist: &str,
    title: &str,
) -> std::result::Result<ChainOutcome, FetchError> {
    let mut last_error: Option<String> = None;

    for api in chain {
        match policy
            .run(api.id(), || api.fetch_lyric(artist, title))
            .await
        {
            Ok(text) => {
                return Ok(ChainOutcome::Found {
                    text,
                    source: api.id(),
                });
            }
            Err(RetryError::Permanent(FetchError::NotFound)) => {
                tracing::debug!(source = api.id(), artist, title, "lyric not found");
            }
            Err(RetryError::Permanent(e)) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(source = api.id(), artist, title, error = %e, "lyric source failed");
                last_error = Some(format!("{}: {e}", api.id()));
            }
        }
    }

    match last_error {
        None => Ok(ChainOutcome::Missing),
        Some(reason) => Ok(ChainOutcome::Failed(reason)),
    }
}

/// Walks the song table and resolves a lyric (or its absence) per song.
pub struct LyricStage {
    pool: SqlitePool,
    progress: ProgressStore,
    chain: Vec<Arc<dyn LyricApi>>,
    policy: RetryPolicy,
    shutdown: Arc<AtomicBool>,
}

impl LyricStage {
    pub fn new(
        pool: SqlitePool,
        progress: ProgressStore,
        chain: Vec<Arc<dyn LyricApi>>,
        policy: RetryPolicy,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            pool,
            progress,
            chain,
            policy,
            shutdown,
        }
    }

    /// Process every song past the checkpointed index.
    pub async fn run(&self) -> Result<LyricStageSummary> {
        let songs = db::list_songs_for_lyrics(&self.pool).await?;
        let total = songs.len() as i64;
        let record = self.progress.get(TaskType::Lyrics).await?;
        let start = usize::try_from(record.current_offset)
            .unwrap_or(0)
            .min(songs.len());
        let mut summary = LyricStageSummary::default();
        let mut last_processed_id = record.last_processed_id;

        tracing::info!(total, start, "starting lyric acquisition");

        for (index, song) in songs.iter().enumerate().skip(start) {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!(index, "lyric stage interrupted");
                return Ok(summary);
            }

            summary.songs_processed += 1;

            // A row (real or sentinel) means this song is already resolved.
            if db::lyric_exists(&self.pool, song.id).await? {
                last_processed_id = Some(song.id);
                self.checkpoint_item(index as i64 + 1, total, song.id).await?;
                continue;
            }

            match fetch_via_chain(&self.chain, &self.policy, &song.artist_name, &song.title).await
            {
                Ok(ChainOutcome::Found { text, source }) => {
                    db::insert_lyric_if_absent(&self.pool, song.id, &text, source).await?;
                    summary.saved += 1;
                }
                Ok(ChainOutcome::Missing) => {
                    db::insert_lyric_if_absent(&self.pool, song.id, NO_LYRIC, MISSING_SOURCE)
                        .await?;
                    summary.missing += 1;
                }
                Ok(ChainOutcome::Failed(reason)) => {
                    // No row: the song stays eligible for a later pass.
                    tracing::warn!(song_id = song.id, reason, "lyric unresolved this pass");
                    summary.failed += 1;
                }
                Err(e) => {
                    self.progress
                        .fail(TaskType::Lyrics, index as i64, &e.to_string())
                        .await?;
                    return Err(Error::stage_failed("lyrics", e.to_string()));
                }
            }

            last_processed_id = Some(song.id);
            self.checkpoint_item(index as i64 + 1, total, song.id).await?;
        }

        // The upsert overwrites last_processed_id, so the completion write
        // must carry it forward.
        self.progress
            .update(
                TaskType::Lyrics,
                songs.len() as i64,
                ProgressUpdate {
                    total_items: Some(total),
                    last_processed_id,
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await?;
        Ok(summary)
    }

    async fn checkpoint_item(&self, offset: i64, total: i64, song_id: i64) -> Result<()> {
        self.progress
            .update(
                TaskType::Lyrics,
                offset,
                ProgressUpdate {
                    total_items: Some(total),
                    last_processed_id: Some(song_id),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }
}

/// On-demand lyric operations outside the staged pipeline.
///
/// Backs the `fetch-lyric` and `process-missing` commands, which work
/// directly against the catalog without touching the progress table.
pub struct LyricService {
    pool: SqlitePool,
    chain: Vec<Arc<dyn LyricApi>>,
    policy: RetryPolicy,
}

impl LyricService {
    pub fn new(pool: SqlitePool, chain: Vec<Arc<dyn LyricApi>>, policy: RetryPolicy) -> Self {
        Self {
            pool,
            chain,
            policy,
        }
    }

    /// Fetch one song's lyric, creating catalog rows as needed.
    ///
    /// If a real lyric is already stored it is returned without a fetch.
    /// A song no source knows yields [`FetchError::NotFound`] and writes no
    /// sentinel, so a later attempt starts clean. A chain pass where a
    /// source failed transiently is not a confirmed absence and surfaces as
    /// the fetch error instead, so the caller can retry.
    pub async fn fetch_and_save(&self, artist: &str, title: &str) -> Result<String> {
        db::insert_artist_if_absent(&self.pool, artist, "manual").await?;
        let artist_row = db::get_artist_by_name(&self.pool, artist)
            .await?
            .ok_or_else(|| Error::config(format!("artist row vanished: {artist}")))?;

        db::insert_song_if_absent(&self.pool, artist_row.id, title).await?;
        let song = db::get_song(&self.pool, artist_row.id, title)
            .await?
            .ok_or_else(|| Error::config(format!("song row vanished: {title}")))?;

        if let Some(existing) = db::get_lyric(&self.pool, song.id).await? {
            if existing.text != NO_LYRIC {
                return Ok(existing.text);
            }
            // Sentinel rows do not satisfy an explicit request.
            return Err(Error::Fetch(FetchError::NotFound));
        }

        match fetch_via_chain(&self.chain, &self.policy, artist, title).await {
            Ok(ChainOutcome::Found { text, source }) => {
                db::insert_lyric_if_absent(&self.pool, song.id, &text, source).await?;
                Ok(text)
            }
            Ok(ChainOutcome::Missing) => Err(Error::Fetch(FetchError::NotFound)),
            Ok(ChainOutcome::Failed(reason)) => Err(Error::Fetch(FetchError::Api(reason))),
            Err(e) => Err(Error::Fetch(e)),
        }
    }

    /// Resolve a batch of songs that have no lyric row yet.
    ///
    /// Songs every source denies get the sentinel row and count only as
    /// processed; transient failures are reported per item and retried on
    /// the next batch.
    pub async fn process_missing(&self, limit: i64, offset: i64) -> Result<BatchSummary> {
        let songs = db::songs_missing_lyrics(&self.pool, limit, offset).await?;
        let mut summary = BatchSummary::default();

        for song in &songs {
            summary.processed += 1;
            match self.resolve(song).await? {
                None => {}
                Some(failure) => summary.failed.push(failure),
            }
            if let Some(lyric) = db::get_lyric(&self.pool, song.id).await? {
                if lyric.text != NO_LYRIC {
                    summary.saved += 1;
                }
            }
        }

        tracing::info!(
            processed = summary.processed,
            saved = summary.saved,
            failed = summary.failed.len(),
            "batch complete"
        );
        Ok(summary)
    }

    async fn resolve(&self, song: &SongForLyrics) -> Result<Option<ItemFailure>> {
        match fetch_via_chain(&self.chain, &self.policy, &song.artist_name, &song.title).await {
            Ok(ChainOutcome::Found { text, source }) => {
                db::insert_lyric_if_absent(&self.pool, song.id, &text, source).await?;
                Ok(None)
            }
            Ok(ChainOutcome::Missing) => {
                db::insert_lyric_if_absent(&self.pool, song.id, NO_LYRIC, MISSING_SOURCE).await?;
                Ok(None)
            }
            Ok(ChainOutcome::Failed(reason)) => Ok(Some(ItemFailure {
                song_id: song.id,
                reason,
            })),
            Err(e) => Err(Error::Fetch(e)),
        }
    }
}
