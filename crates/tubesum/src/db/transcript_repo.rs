//! Transcript availability cache.
//!
//! Remembers which videos have no obtainable transcript so the extraction
//! cascade does not re-probe them on every retry. Cleared when a video is
//! force-reset.

use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// Cached transcript availability for a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Unavailable => "unavailable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(Availability::Available),
            "unavailable" => Some(Availability::Unavailable),
            _ => None,
        }
    }
}

impl FromSql for Availability {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Availability::parse(s).ok_or_else(|| {
            FromSqlError::Other(format!("unknown transcript availability '{}'", s).into())
        })
    }
}

impl ToSql for Availability {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

/// A transcript cache row.
#[derive(Debug, Clone)]
pub struct CacheRow {
    pub video_id: String,
    pub status: Availability,
    pub reason: Option<String>,
    pub last_checked: String,
}

impl CacheRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            video_id: row.get("video_id")?,
            status: row.get("status")?,
            reason: row.get("reason")?,
            last_checked: row.get("last_checked")?,
        })
    }
}

/// Looks up the cached availability for a video.
pub fn get(db: &Database, video_id: &str) -> Result<Option<CacheRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM transcript_cache WHERE video_id = ?1",
                params![video_id],
                CacheRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Upserts the availability for a video.
pub fn set(
    db: &Database,
    video_id: &str,
    status: Availability,
    reason: Option<&str>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO transcript_cache (video_id, status, reason, last_checked)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(video_id) DO UPDATE SET
                 status = excluded.status,
                 reason = excluded.reason,
                 last_checked = excluded.last_checked",
            params![video_id, status, reason, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    })
}

/// Clears the cached entry for a video.
pub fn clear(db: &Database, video_id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM transcript_cache WHERE video_id = ?1",
            params![video_id],
        )?;
        Ok(())
    })
}
