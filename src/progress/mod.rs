//! Durable per-task checkpoints.
//!
//! Each ingestion task owns one row in `progress_tracking`, keyed by
//! [`TaskType`] and updated in place with upsert semantics. Reading a task
//! that has never checkpointed returns a zero-value record rather than an
//! error, so "start from scratch" and "resume" are the same code path.
//!
//! The store does not enforce offset monotonicity - callers supply
//! non-decreasing offsets by convention, and may legitimately reset to zero
//! for reprocessing.

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};

/// The resumable tasks tracked in the progress table.
///
/// `Vectors` belongs to the downstream vectorization job; it shares the
/// table but no stage here drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    Artists,
    Songs,
    Lyrics,
    Vectors,
}

impl TaskType {
    /// The key stored in `progress_tracking.task_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Artists => "artists",
            Self::Songs => "songs",
            Self::Lyrics => "lyrics",
            Self::Vectors => "vectors",
        }
    }

    /// All task types, for status display.
    pub fn all() -> [TaskType; 4] {
        [Self::Artists, Self::Songs, Self::Lyrics, Self::Vectors]
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One row of the progress table.
#[derive(Debug, Clone, FromRow)]
pub struct ProgressRecord {
    /// How far the task has progressed; semantics are per-stage (raw page
    /// cursor for artists, processed-index for songs/lyrics)
    pub current_offset: i64,
    /// Last known candidate count, if the stage publishes one
    pub total_items: Option<i64>,
    /// Identity of the last item confirmed processed
    pub last_processed_id: Option<i64>,
    /// running | completed | failed
    pub status: String,
    /// Populated when status is failed
    pub error_message: Option<String>,
    /// Write time of the last update (RFC 3339)
    pub updated_at: String,
}

impl ProgressRecord {
    /// The record a task gets before its first checkpoint.
    fn fresh() -> Self {
        Self {
            current_offset: 0,
            total_items: None,
            last_processed_id: None,
            status: TaskStatus::Running.as_str().to_string(),
            error_message: None,
            updated_at: String::new(),
        }
    }
}

/// Optional fields of a progress update.
///
/// `total_items` is preserved from the existing row unless a new value is
/// supplied here; the other fields always overwrite.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub total_items: Option<i64>,
    pub last_processed_id: Option<i64>,
    pub status: Option<TaskStatus>,
    pub error_message: Option<String>,
}

/// Handle to the progress table.
///
/// Cheap to clone; each operation acquires a pooled connection for just the
/// one statement, never across an external fetch.
#[derive(Clone)]
pub struct ProgressStore {
    pool: SqlitePool,
}

impl ProgressStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read the checkpoint for a task.
    ///
    /// Never fails on a missing row - returns the zero-value record instead.
    pub async fn get(&self, task: TaskType) -> sqlx::Result<ProgressRecord> {
        let row: Option<ProgressRecord> = sqlx::query_as(
            r#"
            SELECT current_offset, total_items, last_processed_id, status, error_message, updated_at
            FROM progress_tracking
            WHERE task_type = ?
            "#,
        )
        .bind(task.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.unwrap_or_else(ProgressRecord::fresh))
    }

    /// Atomically upsert the checkpoint for a task.
    ///
    /// Safe to call repeatedly with the same offset; `updated_at` is set to
    /// the write time on every call.
    pub async fn update(
        &self,
        task: TaskType,
        current_offset: i64,
        fields: ProgressUpdate,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO progress_tracking
                (task_type, current_offset, total_items, last_processed_id, status, error_message, updated_at)
            VALUES (?, ?, ?, ?, COALESCE(?, 'running'), ?, ?)
            ON CONFLICT(task_type) DO UPDATE SET
                current_offset = excluded.current_offset,
                total_items = COALESCE(excluded.total_items, progress_tracking.total_items),
                last_processed_id = excluded.last_processed_id,
                status = excluded.status,
                error_message = excluded.error_message,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(task.as_str())
        .bind(current_offset)
        .bind(fields.total_items)
        .bind(fields.last_processed_id)
        .bind(fields.status.map(|s| s.as_str()))
        .bind(fields.error_message)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Shorthand for a plain offset checkpoint.
    pub async fn checkpoint(&self, task: TaskType, current_offset: i64) -> sqlx::Result<()> {
        self.update(task, current_offset, ProgressUpdate::default())
            .await
    }

    /// Mark a task completed at its final offset.
    pub async fn complete(&self, task: TaskType, current_offset: i64) -> sqlx::Result<()> {
        self.update(
            task,
            current_offset,
            ProgressUpdate {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
        )
        .await
    }

    /// Mark a task failed, keeping its last good offset.
    pub async fn fail(
        &self,
        task: TaskType,
        current_offset: i64,
        error_message: &str,
    ) -> sqlx::Result<()> {
        self.update(
            task,
            current_offset,
            ProgressUpdate {
                status: Some(TaskStatus::Failed),
                error_message: Some(error_message.to_string()),
                ..Default::default()
            },
        )
        .await
    }
}
