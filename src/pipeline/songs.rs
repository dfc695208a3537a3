//! Song-discovery stage: one search per known artist.
//!
//! Offset semantics are a processed-index into the stable artist list
//! (id order): offset N means the first N artists are done. An artist whose
//! search fails after retries is still counted as processed, so one broken
//! artist cannot wedge the stage; the failure lands in the summary and the
//! log instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sqlx::SqlitePool;

use crate::db;
use crate::error::{Error, Result};
use crate::progress::{ProgressStore, ProgressUpdate, TaskType};
use crate::retry::{RetryError, RetryPolicy};
use crate::sources::{FetchError, SongSearchApi};

/// What a song stage run accomplished.
#[derive(Debug, Default)]
pub struct SongStageSummary {
    /// Artists consumed this run (includes per-artist failures)
    pub artists_processed: u32,
    /// Songs persisted this run (excludes dedup skips)
    pub new_songs: u32,
    /// Artists whose search failed after retries
    pub failed: u32,
}

/// Walks the artist table and records each artist's known songs.
pub struct SongStage {
    pool: SqlitePool,
    progress: ProgressStore,
    adapter: Arc<dyn SongSearchApi>,
    policy: RetryPolicy,
    shutdown: Arc<AtomicBool>,
}

impl SongStage {
    pub fn new(
        pool: SqlitePool,
        progress: ProgressStore,
        adapter: Arc<dyn SongSearchApi>,
        policy: RetryPolicy,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            pool,
            progress,
            adapter,
            policy,
            shutdown,
        }
    }

    /// Process every artist past the checkpointed index.
    pub async fn run(&self) -> Result<SongStageSummary> {
        let artists = db::list_artists(&self.pool).await?;
        let total = artists.len() as i64;
        let record = self.progress.get(TaskType::Songs).await?;
        let start = usize::try_from(record.current_offset)
            .unwrap_or(0)
            .min(artists.len());
        let mut summary = SongStageSummary::default();
        let mut last_processed_id = record.last_processed_id;

        tracing::info!(total, start, "starting song discovery");

        for (index, artist) in artists.iter().enumerate().skip(start) {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!(index, "song stage interrupted");
                return Ok(summary);
            }

            let titles = match self
                .policy
                .run("genius song search", || {
                    self.adapter.search_songs(&artist.name)
                })
                .await
            {
                Ok(titles) => titles,
                // An artist the source has never heard of is an empty
                // result, not a failure.
                Err(RetryError::Permanent(FetchError::NotFound)) => vec![],
                Err(RetryError::Permanent(e)) if e.is_fatal() => {
                    self.progress
                        .fail(TaskType::Songs, index as i64, &e.to_string())
                        .await?;
                    return Err(Error::stage_failed("songs", e.to_string()));
                }
                Err(e) => {
                    tracing::warn!(artist = %artist.name, error = %e, "song search failed");
                    summary.failed += 1;
                    summary.artists_processed += 1;
                    last_processed_id = Some(artist.id);
                    self.checkpoint_item(index as i64 + 1, total, artist.id)
                        .await?;
                    continue;
                }
            };

            let mut new = 0u32;
            for title in &titles {
                if db::insert_song_if_absent(&self.pool, artist.id, title)
                    .await?
                    .is_some()
                {
                    new += 1;
                }
            }
            summary.new_songs += new;
            summary.artists_processed += 1;
            last_processed_id = Some(artist.id);

            self.checkpoint_item(index as i64 + 1, total, artist.id)
                .await?;

            tracing::debug!(artist = %artist.name, titles = titles.len(), new, "artist songs recorded");
        }

        // The upsert overwrites last_processed_id, so the completion write
        // must carry it forward.
        self.progress
            .update(
                TaskType::Songs,
                artists.len() as i64,
                ProgressUpdate {
                    total_items: Some(total),
                    last_processed_id,
                    status: Some(crate::progress::TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await?;
        Ok(summary)
    }

    async fn checkpoint_item(&self, offset: i64, total: i64, artist_id: i64) -> Result<()> {
        self.progress
            .update(
                TaskType::Songs,
                offset,
                ProgressUpdate {
                    total_items: Some(total),
                    last_processed_id: Some(artist_id),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }
}
