//! Video repository — the durable job store driving the processing pipeline.
//!
//! Every status write refreshes `updated_at`, which is the basis for the
//! stuck-job staleness computation. The `id` PRIMARY KEY makes duplicate
//! creation a race-safe no-op.

use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// Maximum automatic attempts before a stuck video is failed permanently.
pub const MAX_RETRIES: i64 = 3;

/// Processing status of a video. Closed set, stored as snake_case text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStatus {
    Pending,
    FetchingMetadata,
    FetchingTranscript,
    GeneratingSummary,
    SendingEmail,
    Success,
    FailedTranscript,
    FailedAi,
    FailedEmail,
    FailedStopped,
    FailedPermanent,
}

impl VideoStatus {
    /// The in-flight states a crashed processor can leave behind.
    pub const IN_FLIGHT: [VideoStatus; 4] = [
        VideoStatus::FetchingMetadata,
        VideoStatus::FetchingTranscript,
        VideoStatus::GeneratingSummary,
        VideoStatus::SendingEmail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::FetchingMetadata => "fetching_metadata",
            VideoStatus::FetchingTranscript => "fetching_transcript",
            VideoStatus::GeneratingSummary => "generating_summary",
            VideoStatus::SendingEmail => "sending_email",
            VideoStatus::Success => "success",
            VideoStatus::FailedTranscript => "failed_transcript",
            VideoStatus::FailedAi => "failed_ai",
            VideoStatus::FailedEmail => "failed_email",
            VideoStatus::FailedStopped => "failed_stopped",
            VideoStatus::FailedPermanent => "failed_permanent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(VideoStatus::Pending),
            "fetching_metadata" => Some(VideoStatus::FetchingMetadata),
            "fetching_transcript" => Some(VideoStatus::FetchingTranscript),
            "generating_summary" => Some(VideoStatus::GeneratingSummary),
            "sending_email" => Some(VideoStatus::SendingEmail),
            "success" => Some(VideoStatus::Success),
            "failed_transcript" => Some(VideoStatus::FailedTranscript),
            "failed_ai" => Some(VideoStatus::FailedAi),
            "failed_email" => Some(VideoStatus::FailedEmail),
            "failed_stopped" => Some(VideoStatus::FailedStopped),
            "failed_permanent" => Some(VideoStatus::FailedPermanent),
            _ => None,
        }
    }

    /// True for states that mean a processor was mid-pipeline at its
    /// last status write.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            VideoStatus::FetchingMetadata
                | VideoStatus::FetchingTranscript
                | VideoStatus::GeneratingSummary
                | VideoStatus::SendingEmail
        )
    }

    /// True for states the pipeline never leaves within one attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VideoStatus::Success
                | VideoStatus::FailedTranscript
                | VideoStatus::FailedAi
                | VideoStatus::FailedEmail
                | VideoStatus::FailedStopped
                | VideoStatus::FailedPermanent
        )
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromSql for VideoStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        VideoStatus::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown video status '{}'", s).into()))
    }
}

impl ToSql for VideoStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

/// How a video entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOrigin {
    /// Discovered by the channel sweep.
    Channel,
    /// Submitted manually; metadata is enriched on first pickup.
    Manual,
}

impl VideoOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoOrigin::Channel => "via_channel",
            VideoOrigin::Manual => "via_manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "via_channel" => Some(VideoOrigin::Channel),
            "via_manual" => Some(VideoOrigin::Manual),
            _ => None,
        }
    }
}

impl FromSql for VideoOrigin {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        VideoOrigin::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown video origin '{}'", s).into()))
    }
}

impl ToSql for VideoOrigin {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

/// A video row from the database.
#[derive(Debug, Clone)]
pub struct VideoRow {
    pub id: String,
    pub channel_id: String,
    pub channel_name: Option<String>,
    pub title: String,
    pub duration_seconds: Option<i64>,
    pub view_count: Option<i64>,
    pub upload_date: Option<String>,
    pub status: VideoStatus,
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub summary_text: Option<String>,
    pub summary_length: Option<i64>,
    pub email_sent: bool,
    pub origin: VideoOrigin,
    pub transcript_source: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl VideoRow {
    /// Builds a fresh row with `pending` status and current timestamps.
    pub fn new(id: &str, channel_id: &str, channel_name: Option<&str>, title: &str) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: id.to_string(),
            channel_id: channel_id.to_string(),
            channel_name: channel_name.map(str::to_string),
            title: title.to_string(),
            duration_seconds: None,
            view_count: None,
            upload_date: None,
            status: VideoStatus::Pending,
            error_message: None,
            retry_count: 0,
            summary_text: None,
            summary_length: None,
            email_sent: false,
            origin: VideoOrigin::Channel,
            transcript_source: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            channel_id: row.get("channel_id")?,
            channel_name: row.get("channel_name")?,
            title: row.get("title")?,
            duration_seconds: row.get("duration_seconds")?,
            view_count: row.get("view_count")?,
            upload_date: row.get("upload_date")?,
            status: row.get("status")?,
            error_message: row.get("error_message")?,
            retry_count: row.get("retry_count")?,
            summary_text: row.get("summary_text")?,
            summary_length: row.get("summary_length")?,
            email_sent: row.get::<_, i64>("email_sent")? != 0,
            origin: row.get("origin")?,
            transcript_source: row.get("transcript_source")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Metadata fields refreshed after the metadata stage. `None` fields are
/// left untouched.
#[derive(Debug, Default, Clone)]
pub struct MetadataUpdate {
    pub title: Option<String>,
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub duration_seconds: Option<i64>,
    pub view_count: Option<i64>,
    pub upload_date: Option<String>,
}

/// Query filter parameters for video listing.
#[derive(Debug, Default, Clone)]
pub struct VideoFilter {
    pub status: Option<VideoStatus>,
    pub channel_id: Option<String>,
    pub origin: Option<VideoOrigin>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Inserts a new video row. Returns false when the id is already tracked;
/// the PRIMARY KEY resolves create races between the existence check and
/// the insert.
pub fn insert(db: &Database, video: &VideoRow) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO videos (id, channel_id, channel_name, title,
             duration_seconds, view_count, upload_date, status, error_message, retry_count,
             summary_text, summary_length, email_sent, origin, transcript_source,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                video.id,
                video.channel_id,
                video.channel_name,
                video.title,
                video.duration_seconds,
                video.view_count,
                video.upload_date,
                video.status,
                video.error_message,
                video.retry_count,
                video.summary_text,
                video.summary_length,
                video.email_sent as i64,
                video.origin,
                video.transcript_source,
                video.created_at,
                video.updated_at,
            ],
        )?;
        Ok(inserted > 0)
    })
}

/// Finds a video by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<VideoRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM videos WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], VideoRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// True if the id is already tracked, whatever its status.
pub fn exists(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM videos WHERE id = ?1", params![id], |r| {
                r.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    })
}

/// Writes a status (and optional error message), refreshing `updated_at`.
pub fn update_status(
    db: &Database,
    id: &str,
    status: VideoStatus,
    error_message: Option<&str>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE videos SET status = ?2, error_message = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, status, error_message, now()],
        )?;
        Ok(())
    })
}

/// Moves an existing video into a new processing attempt: increments
/// `retry_count`, clears the previous error and enters `fetching_metadata`.
pub fn restart_attempt(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE videos
             SET status = ?2, retry_count = retry_count + 1, error_message = NULL, updated_at = ?3
             WHERE id = ?1",
            params![id, VideoStatus::FetchingMetadata, now()],
        )?;
        Ok(())
    })
}

/// Applies fetched metadata. Only provided fields are overwritten.
pub fn update_metadata(
    db: &Database,
    id: &str,
    update: &MetadataUpdate,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let mut sets = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(id.to_string())];

        if let Some(ref title) = update.title {
            sets.push(format!("title = ?{}", values.len() + 1));
            values.push(Box::new(title.clone()));
        }
        if let Some(ref channel_id) = update.channel_id {
            sets.push(format!("channel_id = ?{}", values.len() + 1));
            values.push(Box::new(channel_id.clone()));
        }
        if let Some(ref channel_name) = update.channel_name {
            sets.push(format!("channel_name = ?{}", values.len() + 1));
            values.push(Box::new(channel_name.clone()));
        }
        if let Some(duration) = update.duration_seconds {
            sets.push(format!("duration_seconds = ?{}", values.len() + 1));
            values.push(Box::new(duration));
        }
        if let Some(views) = update.view_count {
            sets.push(format!("view_count = ?{}", values.len() + 1));
            values.push(Box::new(views));
        }
        if let Some(ref upload_date) = update.upload_date {
            sets.push(format!("upload_date = ?{}", values.len() + 1));
            values.push(Box::new(upload_date.clone()));
        }

        if sets.is_empty() {
            return Ok(());
        }

        let sql = format!("UPDATE videos SET {} WHERE id = ?1", sets.join(", "));
        let params_ref: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        conn.execute(&sql, params_ref.as_slice())?;
        Ok(())
    })
}

/// Commits a finished summary as `success`. This write happens before any
/// email attempt so the summary survives delivery failures.
pub fn store_summary(
    db: &Database,
    id: &str,
    summary_text: &str,
    transcript_source: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE videos
             SET status = ?2, summary_text = ?3, summary_length = ?4,
                 transcript_source = ?5, error_message = NULL, updated_at = ?6
             WHERE id = ?1",
            params![
                id,
                VideoStatus::Success,
                summary_text,
                summary_text.chars().count() as i64,
                transcript_source,
                now(),
            ],
        )?;
        Ok(())
    })
}

/// Records a successful email delivery.
pub fn mark_email_sent(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE videos SET status = ?2, email_sent = 1, updated_at = ?3 WHERE id = ?1",
            params![id, VideoStatus::Success, now()],
        )?;
        Ok(())
    })
}

/// Records a failed email delivery. The stored summary is left untouched;
/// this is a partial success, not a hard failure.
pub fn mark_email_failed(db: &Database, id: &str, message: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE videos
             SET status = ?2, email_sent = 0, error_message = ?3, updated_at = ?4
             WHERE id = ?1",
            params![id, VideoStatus::FailedEmail, message, now()],
        )?;
        Ok(())
    })
}

/// All pending videos, oldest first, so resets and manual submissions are
/// serviced before new discovery.
pub fn pending(db: &Database) -> Result<Vec<VideoRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM videos WHERE status = ?1 ORDER BY created_at ASC")?;
        let rows: Vec<VideoRow> = stmt
            .query_map(params![VideoStatus::Pending], VideoRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// All videos in an in-flight state, for the stuck-job sweeper.
pub fn in_flight(db: &Database) -> Result<Vec<VideoRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM videos WHERE status IN (?1, ?2, ?3, ?4) ORDER BY updated_at ASC",
        )?;
        let [a, b, c, d] = VideoStatus::IN_FLIGHT;
        let rows: Vec<VideoRow> = stmt
            .query_map(params![a, b, c, d], VideoRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Force-resets a video to `pending` with `retry_count = 0`. This is the
/// only path that decreases the retry counter. The cached transcript
/// availability is invalidated so the next attempt re-probes every
/// method. Returns false when the id is unknown.
pub fn force_reset(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE videos
             SET status = ?2, retry_count = 0, error_message = NULL, updated_at = ?3
             WHERE id = ?1",
            params![id, VideoStatus::Pending, now()],
        )?;
        if changed > 0 {
            conn.execute(
                "DELETE FROM transcript_cache WHERE video_id = ?1",
                params![id],
            )?;
        }
        Ok(changed > 0)
    })
}

/// Marks a non-terminal video as externally stopped. Terminal rows are
/// left untouched; returns whether a row changed.
pub fn mark_stopped(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE videos
             SET status = ?2, error_message = ?3, updated_at = ?4
             WHERE id = ?1 AND status IN (?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                VideoStatus::FailedStopped,
                "Processing stopped by request",
                now(),
                VideoStatus::Pending,
                VideoStatus::FetchingMetadata,
                VideoStatus::FetchingTranscript,
                VideoStatus::GeneratingSummary,
                VideoStatus::SendingEmail,
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Creates a manually submitted video with placeholder metadata; the
/// metadata stage enriches it on first pickup. Returns false when the id
/// is already tracked.
pub fn submit_manual(db: &Database, video_id: &str) -> Result<bool, DatabaseError> {
    let mut row = VideoRow::new(video_id, "unknown", None, &format!("Video {}", video_id));
    row.origin = VideoOrigin::Manual;
    insert(db, &row)
}

/// Deletes a video. Never called automatically; removal is an explicit
/// external operation. Returns false when the id is unknown.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM videos WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Counts videos with the given status.
pub fn count_by_status(db: &Database, status: VideoStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM videos WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Queries videos with filters, newest first, returning (rows, total_count).
pub fn query(db: &Database, filter: &VideoFilter) -> Result<(Vec<VideoRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status));
        }
        if let Some(ref channel_id) = filter.channel_id {
            conditions.push(format!("channel_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(channel_id.clone()));
        }
        if let Some(origin) = filter.origin {
            conditions.push(format!("origin = ?{}", param_values.len() + 1));
            param_values.push(Box::new(origin));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Count total matching rows.
        let count_sql = format!("SELECT COUNT(*) FROM videos {}", where_clause);
        let params_ref: Vec<&dyn ToSql> = param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        // Fetch paginated results.
        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM videos {} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn ToSql> = param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<VideoRow> = stmt
            .query_map(params_ref.as_slice(), VideoRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Overall statistics across all channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalStats {
    pub total_videos: u64,
    pub total_channels: u64,
    pub total_duration_seconds: u64,
}

pub fn global_stats(db: &Database) -> Result<GlobalStats, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT channel_id), COALESCE(SUM(duration_seconds), 0)
             FROM videos",
            [],
            |r| {
                Ok(GlobalStats {
                    total_videos: r.get(0)?,
                    total_channels: r.get(1)?,
                    total_duration_seconds: r.get(2)?,
                })
            },
        )
        .map_err(DatabaseError::Sqlite)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_video(id: &str) -> VideoRow {
        VideoRow::new(id, "channel-1", Some("Tech Channel"), "How it works")
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        assert!(insert(&db, &sample_video("v1")).unwrap());

        let found = find_by_id(&db, "v1").unwrap().unwrap();
        assert_eq!(found.title, "How it works");
        assert_eq!(found.status, VideoStatus::Pending);
        assert_eq!(found.retry_count, 0);
        assert!(!found.email_sent);
    }

    #[test]
    fn test_insert_duplicate_is_noop() {
        let db = test_db();
        assert!(insert(&db, &sample_video("v1")).unwrap());

        let mut second = sample_video("v1");
        second.title = "Different title".to_string();
        assert!(!insert(&db, &second).unwrap());

        // The original row wins.
        let found = find_by_id(&db, "v1").unwrap().unwrap();
        assert_eq!(found.title, "How it works");
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "missing").unwrap().is_none());
        assert!(!exists(&db, "missing").unwrap());
    }

    #[test]
    fn test_update_status_refreshes_updated_at() {
        let db = test_db();
        insert(&db, &sample_video("v1")).unwrap();

        // Backdate the row, then write a status.
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE videos SET updated_at = '2020-01-01T00:00:00+00:00' WHERE id = 'v1'",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        update_status(&db, "v1", VideoStatus::FetchingTranscript, None).unwrap();

        let found = find_by_id(&db, "v1").unwrap().unwrap();
        assert_eq!(found.status, VideoStatus::FetchingTranscript);
        assert!(found.updated_at > "2020-01-02".to_string());
    }

    #[test]
    fn test_restart_attempt_increments_retry_count() {
        let db = test_db();
        insert(&db, &sample_video("v1")).unwrap();
        update_status(&db, "v1", VideoStatus::FailedAi, Some("boom")).unwrap();

        restart_attempt(&db, "v1").unwrap();
        let found = find_by_id(&db, "v1").unwrap().unwrap();
        assert_eq!(found.status, VideoStatus::FetchingMetadata);
        assert_eq!(found.retry_count, 1);
        assert!(found.error_message.is_none());

        restart_attempt(&db, "v1").unwrap();
        assert_eq!(find_by_id(&db, "v1").unwrap().unwrap().retry_count, 2);
    }

    #[test]
    fn test_update_metadata_partial() {
        let db = test_db();
        insert(&db, &sample_video("v1")).unwrap();

        update_metadata(
            &db,
            "v1",
            &MetadataUpdate {
                duration_seconds: Some(600),
                upload_date: Some("2026-05-01".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let found = find_by_id(&db, "v1").unwrap().unwrap();
        assert_eq!(found.duration_seconds, Some(600));
        assert_eq!(found.upload_date.as_deref(), Some("2026-05-01"));
        // Untouched fields keep their values.
        assert_eq!(found.title, "How it works");
        assert!(found.view_count.is_none());
    }

    #[test]
    fn test_store_summary_sets_success_and_length() {
        let db = test_db();
        insert(&db, &sample_video("v1")).unwrap();

        store_summary(&db, "v1", "A short summary.", "yt-dlp").unwrap();

        let found = find_by_id(&db, "v1").unwrap().unwrap();
        assert_eq!(found.status, VideoStatus::Success);
        assert_eq!(found.summary_text.as_deref(), Some("A short summary."));
        assert_eq!(found.summary_length, Some(16));
        assert_eq!(found.transcript_source.as_deref(), Some("yt-dlp"));
    }

    #[test]
    fn test_email_failure_keeps_summary() {
        let db = test_db();
        insert(&db, &sample_video("v1")).unwrap();
        store_summary(&db, "v1", "Kept summary", "timedtext").unwrap();

        mark_email_failed(&db, "v1", "SMTP unreachable").unwrap();

        let found = find_by_id(&db, "v1").unwrap().unwrap();
        assert_eq!(found.status, VideoStatus::FailedEmail);
        assert!(!found.email_sent);
        assert_eq!(found.summary_text.as_deref(), Some("Kept summary"));
        assert_eq!(found.error_message.as_deref(), Some("SMTP unreachable"));
    }

    #[test]
    fn test_mark_email_sent() {
        let db = test_db();
        insert(&db, &sample_video("v1")).unwrap();
        store_summary(&db, "v1", "Summary", "yt-dlp").unwrap();

        mark_email_sent(&db, "v1").unwrap();

        let found = find_by_id(&db, "v1").unwrap().unwrap();
        assert_eq!(found.status, VideoStatus::Success);
        assert!(found.email_sent);
    }

    #[test]
    fn test_pending_ordered_oldest_first() {
        let db = test_db();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            let mut video = sample_video(id);
            video.created_at = format!("2026-01-0{}T00:00:00+00:00", 3 - i);
            insert(&db, &video).unwrap();
        }

        let rows = pending(&db).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_in_flight_selects_only_processing_states() {
        let db = test_db();
        for (id, status) in [
            ("p", VideoStatus::Pending),
            ("m", VideoStatus::FetchingMetadata),
            ("t", VideoStatus::FetchingTranscript),
            ("g", VideoStatus::GeneratingSummary),
            ("e", VideoStatus::SendingEmail),
            ("s", VideoStatus::Success),
            ("f", VideoStatus::FailedAi),
        ] {
            insert(&db, &sample_video(id)).unwrap();
            update_status(&db, id, status, None).unwrap();
        }

        let mut ids: Vec<String> = in_flight(&db).unwrap().into_iter().map(|r| r.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["e", "g", "m", "t"]);
    }

    #[test]
    fn test_force_reset_zeroes_retry_count() {
        let db = test_db();
        insert(&db, &sample_video("v1")).unwrap();
        restart_attempt(&db, "v1").unwrap();
        restart_attempt(&db, "v1").unwrap();
        update_status(&db, "v1", VideoStatus::FailedPermanent, Some("Max retries")).unwrap();

        assert!(force_reset(&db, "v1").unwrap());

        let found = find_by_id(&db, "v1").unwrap().unwrap();
        assert_eq!(found.status, VideoStatus::Pending);
        assert_eq!(found.retry_count, 0);
        assert!(found.error_message.is_none());
    }

    #[test]
    fn test_force_reset_invalidates_transcript_cache() {
        let db = test_db();
        insert(&db, &sample_video("v1")).unwrap();
        crate::db::transcript_repo::set(
            &db,
            "v1",
            crate::db::transcript_repo::Availability::Unavailable,
            Some("no captions"),
        )
        .unwrap();

        assert!(force_reset(&db, "v1").unwrap());
        assert!(crate::db::transcript_repo::get(&db, "v1").unwrap().is_none());
    }

    #[test]
    fn test_force_reset_unknown_id() {
        let db = test_db();
        assert!(!force_reset(&db, "missing").unwrap());
    }

    #[test]
    fn test_mark_stopped_only_non_terminal() {
        let db = test_db();
        insert(&db, &sample_video("active")).unwrap();
        update_status(&db, "active", VideoStatus::GeneratingSummary, None).unwrap();

        insert(&db, &sample_video("done")).unwrap();
        update_status(&db, "done", VideoStatus::Success, None).unwrap();

        assert!(mark_stopped(&db, "active").unwrap());
        assert!(!mark_stopped(&db, "done").unwrap());

        assert_eq!(
            find_by_id(&db, "active").unwrap().unwrap().status,
            VideoStatus::FailedStopped
        );
        assert_eq!(
            find_by_id(&db, "done").unwrap().unwrap().status,
            VideoStatus::Success
        );
    }

    #[test]
    fn test_submit_manual() {
        let db = test_db();
        assert!(submit_manual(&db, "manual12345").unwrap());
        assert!(!submit_manual(&db, "manual12345").unwrap());

        let found = find_by_id(&db, "manual12345").unwrap().unwrap();
        assert_eq!(found.origin, VideoOrigin::Manual);
        assert_eq!(found.status, VideoStatus::Pending);
        assert_eq!(found.title, "Video manual12345");
        assert_eq!(found.channel_id, "unknown");
    }

    #[test]
    fn test_delete() {
        let db = test_db();
        insert(&db, &sample_video("v1")).unwrap();
        assert!(delete(&db, "v1").unwrap());
        assert!(!delete(&db, "v1").unwrap());
        assert!(find_by_id(&db, "v1").unwrap().is_none());
    }

    #[test]
    fn test_count_by_status() {
        let db = test_db();
        insert(&db, &sample_video("a")).unwrap();
        insert(&db, &sample_video("b")).unwrap();
        insert(&db, &sample_video("c")).unwrap();
        update_status(&db, "c", VideoStatus::FailedTranscript, Some("none")).unwrap();

        assert_eq!(count_by_status(&db, VideoStatus::Pending).unwrap(), 2);
        assert_eq!(
            count_by_status(&db, VideoStatus::FailedTranscript).unwrap(),
            1
        );
        assert_eq!(count_by_status(&db, VideoStatus::Success).unwrap(), 0);
    }

    #[test]
    fn test_query_with_status_filter() {
        let db = test_db();
        insert(&db, &sample_video("a")).unwrap();
        insert(&db, &sample_video("b")).unwrap();
        update_status(&db, "b", VideoStatus::Success, None).unwrap();

        let (rows, total) = query(
            &db,
            &VideoFilter {
                status: Some(VideoStatus::Success),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, "b");
    }

    #[test]
    fn test_query_pagination() {
        let db = test_db();
        for i in 0..10 {
            let mut video = sample_video(&format!("v{}", i));
            video.created_at = format!("2026-01-{:02}T00:00:00+00:00", i + 1);
            insert(&db, &video).unwrap();
        }

        let (rows, total) = query(
            &db,
            &VideoFilter {
                limit: Some(3),
                offset: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 10);
        assert_eq!(rows.len(), 3);
        // Newest first.
        assert_eq!(rows[0].id, "v9");
    }

    #[test]
    fn test_global_stats() {
        let db = test_db();
        let mut a = sample_video("a");
        a.duration_seconds = Some(600);
        insert(&db, &a).unwrap();

        let mut b = sample_video("b");
        b.channel_id = "channel-2".to_string();
        b.duration_seconds = Some(900);
        insert(&db, &b).unwrap();

        let stats = global_stats(&db).unwrap();
        assert_eq!(stats.total_videos, 2);
        assert_eq!(stats.total_channels, 2);
        assert_eq!(stats.total_duration_seconds, 1500);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            VideoStatus::Pending,
            VideoStatus::FetchingMetadata,
            VideoStatus::FetchingTranscript,
            VideoStatus::GeneratingSummary,
            VideoStatus::SendingEmail,
            VideoStatus::Success,
            VideoStatus::FailedTranscript,
            VideoStatus::FailedAi,
            VideoStatus::FailedEmail,
            VideoStatus::FailedStopped,
            VideoStatus::FailedPermanent,
        ] {
            assert_eq!(VideoStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VideoStatus::parse("processing"), None);
    }

    #[test]
    fn test_in_flight_and_terminal_are_disjoint() {
        let all = [
            VideoStatus::Pending,
            VideoStatus::FetchingMetadata,
            VideoStatus::FetchingTranscript,
            VideoStatus::GeneratingSummary,
            VideoStatus::SendingEmail,
            VideoStatus::Success,
            VideoStatus::FailedTranscript,
            VideoStatus::FailedAi,
            VideoStatus::FailedEmail,
            VideoStatus::FailedStopped,
            VideoStatus::FailedPermanent,
        ];
        for status in all {
            assert!(
                !(status.is_in_flight() && status.is_terminal()),
                "{status} is both in-flight and terminal"
            );
        }
        assert!(!VideoStatus::Pending.is_in_flight());
        assert!(!VideoStatus::Pending.is_terminal());
    }
}
