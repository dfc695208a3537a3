//! Artist-discovery stage: paginated keyword search.
//!
//! Offset semantics are a raw page cursor: after each page the offset
//! advances by the number of items the page returned, not by the number of
//! rows actually persisted. Resuming after a crash therefore re-fetches at
//! most one page whose already-seen names the dedup check silently skips.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sqlx::SqlitePool;

use crate::db;
use crate::error::{Error, Result};
use crate::progress::{ProgressStore, TaskType};
use crate::retry::{RetryError, RetryPolicy};
use crate::sources::ArtistSearchApi;

/// What an artist stage run accomplished.
#[derive(Debug, Default)]
pub struct ArtistStageSummary {
    /// Pages fetched this run
    pub pages: u32,
    /// Artists persisted this run (excludes dedup skips)
    pub new_artists: u32,
    /// Page cursor after the run
    pub final_offset: i64,
}

/// Drives the artist-discovery pagination loop.
pub struct ArtistStage {
    pool: SqlitePool,
    progress: ProgressStore,
    adapter: Arc<dyn ArtistSearchApi>,
    policy: RetryPolicy,
    query: String,
    page_limit: u32,
    shutdown: Arc<AtomicBool>,
    /// Pause between full pages, as backpressure against the source
    pause: Duration,
}

impl ArtistStage {
    pub fn new(
        pool: SqlitePool,
        progress: ProgressStore,
        adapter: Arc<dyn ArtistSearchApi>,
        policy: RetryPolicy,
        query: String,
        page_limit: u32,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            pool,
            progress,
            adapter,
            policy,
            query,
            page_limit,
            shutdown,
            pause: Duration::from_secs(1),
        }
    }

    #[cfg(test)]
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Run the pagination loop from the checkpointed offset to the last page.
    pub async fn run(&self) -> Result<ArtistStageSummary> {
        let mut offset = self.progress.get(TaskType::Artists).await?.current_offset;
        let mut summary = ArtistStageSummary::default();

        tracing::info!(
            query = %self.query,
            offset,
            "starting artist discovery"
        );

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!(offset, "artist stage interrupted");
                summary.final_offset = offset;
                return Ok(summary);
            }

            // Clamp rather than truncate: a cursor past u32::MAX can only
            // come from a corrupt checkpoint, and the source answers an
            // out-of-range offset with an empty page.
            let page_offset = u32::try_from(offset).unwrap_or(u32::MAX);
            let page = match self
                .policy
                .run("musicbrainz artist search", || {
                    self.adapter
                        .search(&self.query, page_offset, self.page_limit)
                })
                .await
            {
                Ok(page) => page,
                Err(RetryError::Permanent(e)) if e.is_fatal() => {
                    self.progress
                        .fail(TaskType::Artists, offset, &e.to_string())
                        .await?;
                    return Err(Error::stage_failed("artists", e.to_string()));
                }
                Err(e) => {
                    // End of results and adapter failure end the loop the
                    // same way; the checkpoint lets a later run retry the
                    // page.
                    tracing::warn!(offset, error = %e, "artist search failed, stopping pass");
                    break;
                }
            };

            if page.is_empty() {
                tracing::info!(offset, "no more artists returned");
                break;
            }

            let page_len = page.len();
            summary.pages += 1;

            let mut new = 0u32;
            for name in &page {
                if db::insert_artist_if_absent(&self.pool, name, &self.query)
                    .await?
                    .is_some()
                {
                    new += 1;
                }
            }
            summary.new_artists += new;

            // Raw page cursor: advance by what the page returned, checkpoint
            // per page so a crash loses at most this page.
            offset += page_len as i64;
            self.progress.checkpoint(TaskType::Artists, offset).await?;

            tracing::info!(offset, page_len, new, "artist page persisted");

            if page_len < self.page_limit as usize {
                break;
            }

            tokio::time::sleep(self.pause).await;
        }

        self.progress.complete(TaskType::Artists, offset).await?;
        summary.final_offset = offset;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::sources::FetchError;
    use crate::sources::mocks::MockArtistSearch;

    fn stage(pool: SqlitePool, adapter: MockArtistSearch, limit: u32) -> ArtistStage {
        ArtistStage::new(
            pool.clone(),
            ProgressStore::new(pool),
            Arc::new(adapter),
            RetryPolicy {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                backoff: 2.0,
                rate_limit_wait: Duration::from_millis(1)..=Duration::from_millis(2),
            },
            "a".to_string(),
            limit,
            Arc::new(AtomicBool::new(false)),
        )
        .with_pause(Duration::ZERO)
    }

    fn page_of(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix} {i}")).collect()
    }

    #[tokio::test]
    async fn test_pagination_ends_on_short_page() {
        let (_dir, pool) = test_pool().await;
        // Pages of 100, 100, 50 at limit 100.
        let adapter = MockArtistSearch::with_pages(vec![
            page_of("First", 100),
            page_of("Second", 100),
            page_of("Third", 50),
        ]);
        let stage = stage(pool.clone(), adapter, 100);

        let summary = stage.run().await.unwrap();

        assert_eq!(summary.pages, 3);
        assert_eq!(summary.final_offset, 250);
        assert_eq!(db::count_artists(&pool).await.unwrap(), 250);

        let record = ProgressStore::new(pool).get(TaskType::Artists).await.unwrap();
        assert_eq!(record.current_offset, 250);
        assert_eq!(record.status, "completed");
    }

    #[tokio::test]
    async fn test_offset_advances_by_page_length_not_new_rows() {
        let (_dir, pool) = test_pool().await;

        // Seed half the first page; dedup skips them but the cursor still
        // moves by the full page length.
        for i in 0..2 {
            db::insert_artist_if_absent(&pool, &format!("Known {i}"), "a")
                .await
                .unwrap();
        }

        let adapter = MockArtistSearch::with_pages(vec![vec![
            "Known 0".to_string(),
            "Known 1".to_string(),
            "Fresh 0".to_string(),
        ]]);
        let stage = stage(pool.clone(), adapter, 100);

        let summary = stage.run().await.unwrap();
        assert_eq!(summary.new_artists, 1);
        assert_eq!(summary.final_offset, 3);
        assert_eq!(db::count_artists(&pool).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_resumes_from_checkpoint() {
        let (_dir, pool) = test_pool().await;
        let progress = ProgressStore::new(pool.clone());
        progress.checkpoint(TaskType::Artists, 200).await.unwrap();

        let adapter = MockArtistSearch::with_pages(vec![page_of("Tail", 10)]);
        let stage = stage(pool.clone(), adapter, 100);

        let summary = stage.run().await.unwrap();
        // 200 from the checkpoint plus the one short page.
        assert_eq!(summary.final_offset, 210);
    }

    #[tokio::test]
    async fn test_oversized_checkpoint_offset_is_clamped() {
        struct CaptureOffsets(std::sync::Mutex<Vec<u32>>);

        #[async_trait::async_trait]
        impl ArtistSearchApi for CaptureOffsets {
            async fn search(
                &self,
                _query: &str,
                offset: u32,
                _limit: u32,
            ) -> std::result::Result<Vec<String>, FetchError> {
                self.0.lock().unwrap().push(offset);
                Ok(vec![])
            }
        }

        let (_dir, pool) = test_pool().await;
        ProgressStore::new(pool.clone())
            .checkpoint(TaskType::Artists, i64::from(u32::MAX) + 10)
            .await
            .unwrap();

        let adapter = Arc::new(CaptureOffsets(std::sync::Mutex::new(Vec::new())));
        let stage = ArtistStage::new(
            pool.clone(),
            ProgressStore::new(pool),
            adapter.clone(),
            RetryPolicy::default(),
            "a".to_string(),
            100,
            Arc::new(AtomicBool::new(false)),
        )
        .with_pause(Duration::ZERO);

        stage.run().await.unwrap();
        assert_eq!(*adapter.0.lock().unwrap(), vec![u32::MAX]);
    }

    #[tokio::test]
    async fn test_fatal_error_marks_progress_failed() {
        struct AuthFails;

        #[async_trait::async_trait]
        impl ArtistSearchApi for AuthFails {
            async fn search(
                &self,
                _query: &str,
                _offset: u32,
                _limit: u32,
            ) -> std::result::Result<Vec<String>, FetchError> {
                Err(FetchError::Auth("HTTP 401".to_string()))
            }
        }

        let (_dir, pool) = test_pool().await;
        let stage = ArtistStage::new(
            pool.clone(),
            ProgressStore::new(pool.clone()),
            Arc::new(AuthFails),
            RetryPolicy::default(),
            "a".to_string(),
            100,
            Arc::new(AtomicBool::new(false)),
        )
        .with_pause(Duration::ZERO);

        let err = stage.run().await.unwrap_err();
        assert!(err.to_string().contains("artists"));

        let record = ProgressStore::new(pool).get(TaskType::Artists).await.unwrap();
        assert_eq!(record.status, "failed");
        assert!(record.error_message.unwrap().contains("401"));
    }
}
