//! Database module for artist, song, and lyric persistence.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage.
//! Every insert goes through an `insert_*_if_absent` helper: the natural key
//! is checked immediately before the insert, and a uniqueness violation on
//! the insert itself is treated as "row already present" rather than an
//! error. The UNIQUE constraints are the safety net for check/insert races,
//! not the primary dedup mechanism.
//!
//! # Example
//!
//! ```ignore
//! use lyric_harvest::db::{init_db, insert_artist_if_absent};
//!
//! let pool = init_db("sqlite:lyric_harvest.db").await?;
//! let created = insert_artist_if_absent(&pool, "Fleetwood Mac", "a").await?;
//! ```

use chrono::Utc;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::model::{Artist, SongForLyrics};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "lyric_harvest.db";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
///
/// # Errors
///
/// Returns an error if database creation fails, a connection cannot be
/// established, or a migration fails.
pub async fn init_db(db_url: &str) -> crate::error::Result<SqlitePool> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Whether an insert failed because the row's natural key already exists.
fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.kind() == sqlx::error::ErrorKind::UniqueViolation)
        .unwrap_or(false)
}

// ============================================================================
// Artists
// ============================================================================

/// Check whether an artist with this exact name exists.
pub async fn artist_exists(pool: &SqlitePool, name: &str) -> sqlx::Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM artists WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Insert an artist unless the name is already present.
///
/// Returns `Some(id)` when a new row was created, `None` when the artist was
/// already there (either the existence check or the UNIQUE constraint said
/// so). Losing a check/insert race is not an error.
pub async fn insert_artist_if_absent(
    pool: &SqlitePool,
    name: &str,
    source_query: &str,
) -> sqlx::Result<Option<i64>> {
    if artist_exists(pool, name).await? {
        return Ok(None);
    }

    let result = sqlx::query(
        "INSERT INTO artists (name, discovered_at, source_query) VALUES (?, ?, ?)",
    )
    .bind(name)
    .bind(Utc::now().to_rfc3339())
    .bind(source_query)
    .execute(pool)
    .await;

    match result {
        Ok(r) => Ok(Some(r.last_insert_rowid())),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Look up an artist by exact name.
pub async fn get_artist_by_name(pool: &SqlitePool, name: &str) -> sqlx::Result<Option<Artist>> {
    sqlx::query_as::<_, Artist>(
        "SELECT id, name, discovered_at, source_query FROM artists WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await
}

/// All artists in id order - the stable iteration order for the song stage.
pub async fn list_artists(pool: &SqlitePool) -> sqlx::Result<Vec<Artist>> {
    sqlx::query_as::<_, Artist>(
        "SELECT id, name, discovered_at, source_query FROM artists ORDER BY id",
    )
    .fetch_all(pool)
    .await
}

/// Number of artist rows (used by the stage gate).
pub async fn count_artists(pool: &SqlitePool) -> sqlx::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM artists")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Delete an artist; songs and their lyrics cascade.
pub async fn delete_artist(pool: &SqlitePool, artist_id: i64) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM artists WHERE id = ?")
        .bind(artist_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ============================================================================
// Songs
// ============================================================================

/// Check whether a song exists for `(artist_id, title)`.
pub async fn song_exists(pool: &SqlitePool, artist_id: i64, title: &str) -> sqlx::Result<bool> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM songs WHERE artist_id = ? AND title = ?")
            .bind(artist_id)
            .bind(title)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

/// Insert a song unless `(artist_id, title)` is already present.
///
/// Same contract as [`insert_artist_if_absent`].
pub async fn insert_song_if_absent(
    pool: &SqlitePool,
    artist_id: i64,
    title: &str,
) -> sqlx::Result<Option<i64>> {
    if song_exists(pool, artist_id, title).await? {
        return Ok(None);
    }

    let result =
        sqlx::query("INSERT INTO songs (artist_id, title, discovered_at) VALUES (?, ?, ?)")
            .bind(artist_id)
            .bind(title)
            .bind(Utc::now().to_rfc3339())
            .execute(pool)
            .await;

    match result {
        Ok(r) => Ok(Some(r.last_insert_rowid())),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Look up a song by its natural key.
pub async fn get_song(
    pool: &SqlitePool,
    artist_id: i64,
    title: &str,
) -> sqlx::Result<Option<crate::model::Song>> {
    sqlx::query_as::<_, crate::model::Song>(
        "SELECT id, artist_id, title, discovered_at FROM songs WHERE artist_id = ? AND title = ?",
    )
    .bind(artist_id)
    .bind(title)
    .fetch_optional(pool)
    .await
}

/// Number of song rows (used by the stage gate).
pub async fn count_songs(pool: &SqlitePool) -> sqlx::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM songs")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// All songs joined with their artist name, in (artist_id, id) order.
///
/// This is the lyric stage's candidate list; the order must be stable so a
/// processed-index offset means the same thing across restarts.
pub async fn list_songs_for_lyrics(pool: &SqlitePool) -> sqlx::Result<Vec<SongForLyrics>> {
    sqlx::query_as::<_, SongForLyrics>(
        r#"
        SELECT s.id, s.artist_id, a.name AS artist_name, s.title
        FROM songs s
        JOIN artists a ON a.id = s.artist_id
        ORDER BY s.artist_id, s.id
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Songs with no lyric row at all (not even the sentinel), paginated.
///
/// Serves `process_missing`: a song whose lookup was already attempted and
/// recorded as "no lyric" does not reappear here.
pub async fn songs_missing_lyrics(
    pool: &SqlitePool,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<SongForLyrics>> {
    sqlx::query_as::<_, SongForLyrics>(
        r#"
        SELECT s.id, s.artist_id, a.name AS artist_name, s.title
        FROM songs s
        JOIN artists a ON a.id = s.artist_id
        LEFT JOIN lyrics l ON l.song_id = s.id
        WHERE l.id IS NULL
        ORDER BY s.artist_id, s.id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

// ============================================================================
// Lyrics
// ============================================================================

/// Check whether a lyric row (real text or sentinel) exists for a song.
pub async fn lyric_exists(pool: &SqlitePool, song_id: i64) -> sqlx::Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM lyrics WHERE song_id = ?")
        .bind(song_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Insert a lyric unless the song already has one.
///
/// Same contract as [`insert_artist_if_absent`].
pub async fn insert_lyric_if_absent(
    pool: &SqlitePool,
    song_id: i64,
    text: &str,
    source: &str,
) -> sqlx::Result<Option<i64>> {
    if lyric_exists(pool, song_id).await? {
        return Ok(None);
    }

    let result =
        sqlx::query("INSERT INTO lyrics (song_id, text, source, fetched_at) VALUES (?, ?, ?, ?)")
            .bind(song_id)
            .bind(text)
            .bind(source)
            .bind(Utc::now().to_rfc3339())
            .execute(pool)
            .await;

    match result {
        Ok(r) => Ok(Some(r.last_insert_rowid())),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Fetch the lyric for a song, if one has been recorded.
pub async fn get_lyric(
    pool: &SqlitePool,
    song_id: i64,
) -> sqlx::Result<Option<crate::model::Lyric>> {
    sqlx::query_as::<_, crate::model::Lyric>(
        "SELECT id, song_id, text, source, fetched_at FROM lyrics WHERE song_id = ?",
    )
    .bind(song_id)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
pub(crate) async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());
    let pool = init_db(&db_url).await.expect("Failed to init db");
    (temp_dir, pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NO_LYRIC;

    #[tokio::test]
    async fn test_init_db_creates_schema() {
        let (_dir, pool) = test_pool().await;
        assert_eq!(count_artists(&pool).await.unwrap(), 0);
        assert_eq!(count_songs(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_artist_insert_is_idempotent() {
        let (_dir, pool) = test_pool().await;

        let first = insert_artist_if_absent(&pool, "Fleetwood Mac", "a")
            .await
            .unwrap();
        assert!(first.is_some());

        let second = insert_artist_if_absent(&pool, "Fleetwood Mac", "a")
            .await
            .unwrap();
        assert!(second.is_none());

        assert_eq!(count_artists(&pool).await.unwrap(), 1);

        let artist = get_artist_by_name(&pool, "Fleetwood Mac")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(artist.source_query, "a");
    }

    #[tokio::test]
    async fn test_artist_names_are_case_sensitive() {
        let (_dir, pool) = test_pool().await;

        insert_artist_if_absent(&pool, "abba", "a").await.unwrap();
        insert_artist_if_absent(&pool, "ABBA", "a").await.unwrap();

        // Exact-name idempotence only; case variants are distinct rows.
        assert_eq!(count_artists(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_insert_leaves_one_row() {
        let (_dir, pool) = test_pool().await;

        let (a, b) = tokio::join!(
            insert_artist_if_absent(&pool, "Queen", "q"),
            insert_artist_if_absent(&pool, "Queen", "q"),
        );

        // Both calls succeed; at most one reports a new row.
        let created = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|r| r.is_some())
            .count();
        assert!(created <= 1);
        assert_eq!(count_artists(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_song_unique_per_artist_and_title() {
        let (_dir, pool) = test_pool().await;

        let artist_id = insert_artist_if_absent(&pool, "Queen", "q")
            .await
            .unwrap()
            .unwrap();
        let other_id = insert_artist_if_absent(&pool, "ABBA", "a")
            .await
            .unwrap()
            .unwrap();

        assert!(
            insert_song_if_absent(&pool, artist_id, "Don't Stop Me Now")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            insert_song_if_absent(&pool, artist_id, "Don't Stop Me Now")
                .await
                .unwrap()
                .is_none()
        );
        // Same title under a different artist is a different natural key.
        assert!(
            insert_song_if_absent(&pool, other_id, "Don't Stop Me Now")
                .await
                .unwrap()
                .is_some()
        );

        assert_eq!(count_songs(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lyric_sentinel_counts_as_attempted() {
        let (_dir, pool) = test_pool().await;

        let artist_id = insert_artist_if_absent(&pool, "Queen", "q")
            .await
            .unwrap()
            .unwrap();
        let song_id = insert_song_if_absent(&pool, artist_id, "Bijou")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(songs_missing_lyrics(&pool, 10, 0).await.unwrap().len(), 1);

        insert_lyric_if_absent(&pool, song_id, NO_LYRIC, "genius")
            .await
            .unwrap();

        // Sentinel row means "attempted": the song no longer shows as missing
        // and a second insert is refused.
        assert!(songs_missing_lyrics(&pool, 10, 0).await.unwrap().is_empty());
        assert!(
            insert_lyric_if_absent(&pool, song_id, "real text", "lyrics.ovh")
                .await
                .unwrap()
                .is_none()
        );

        let lyric = get_lyric(&pool, song_id).await.unwrap().unwrap();
        assert_eq!(lyric.text, NO_LYRIC);
        assert_eq!(lyric.source, "genius");
    }

    #[tokio::test]
    async fn test_lyric_candidates_are_stably_ordered() {
        let (_dir, pool) = test_pool().await;

        let a1 = insert_artist_if_absent(&pool, "B Artist", "b")
            .await
            .unwrap()
            .unwrap();
        let a2 = insert_artist_if_absent(&pool, "A Artist", "a")
            .await
            .unwrap()
            .unwrap();

        insert_song_if_absent(&pool, a2, "Later Song").await.unwrap();
        insert_song_if_absent(&pool, a1, "First Song").await.unwrap();

        let songs = list_songs_for_lyrics(&pool).await.unwrap();
        // Ordered by artist id then song id, not by name or insert order.
        assert_eq!(songs[0].artist_id, a1);
        assert_eq!(songs[1].artist_id, a2);
    }

    #[tokio::test]
    async fn test_delete_artist_cascades() {
        let (_dir, pool) = test_pool().await;

        let artist_id = insert_artist_if_absent(&pool, "Queen", "q")
            .await
            .unwrap()
            .unwrap();
        let song_id = insert_song_if_absent(&pool, artist_id, "'39")
            .await
            .unwrap()
            .unwrap();
        insert_lyric_if_absent(&pool, song_id, "In the year of '39", "genius")
            .await
            .unwrap();

        assert_eq!(delete_artist(&pool, artist_id).await.unwrap(), 1);
        assert_eq!(count_songs(&pool).await.unwrap(), 0);
        assert!(get_lyric(&pool, song_id).await.unwrap().is_none());
    }
}
