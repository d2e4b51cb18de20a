//! Channel repository — the monitored sources videos are discovered from.
//!
//! A channel's `added_at` anchors the upload-date eligibility filter, so
//! replacing the channel list must preserve it for surviving channels.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A channel row from the database.
#[derive(Debug, Clone)]
pub struct ChannelRow {
    pub channel_id: String,
    pub channel_name: String,
    pub enabled: bool,
    pub added_at: String,
    pub updated_at: String,
}

impl ChannelRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            channel_id: row.get("channel_id")?,
            channel_name: row.get("channel_name")?,
            enabled: row.get::<_, i64>("enabled")? != 0,
            added_at: row.get("added_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Adds a channel. Returns false when the id is already enrolled.
pub fn insert(db: &Database, channel_id: &str, channel_name: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let ts = now();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO channels (channel_id, channel_name, enabled, added_at, updated_at)
             VALUES (?1, ?2, 1, ?3, ?3)",
            params![channel_id, channel_name, ts],
        )?;
        Ok(inserted > 0)
    })
}

/// Removes a channel. Returns false when not found.
pub fn remove(db: &Database, channel_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "DELETE FROM channels WHERE channel_id = ?1",
            params![channel_id],
        )?;
        Ok(changed > 0)
    })
}

/// Updates name and/or enabled flag. Returns false when not found.
pub fn update(
    db: &Database,
    channel_id: &str,
    channel_name: Option<&str>,
    enabled: Option<bool>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let mut sets = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(channel_id.to_string())];

        if let Some(name) = channel_name {
            sets.push(format!("channel_name = ?{}", values.len() + 1));
            values.push(Box::new(name.to_string()));
        }
        if let Some(enabled) = enabled {
            sets.push(format!("enabled = ?{}", values.len() + 1));
            values.push(Box::new(enabled as i64));
        }

        if sets.is_empty() {
            return Ok(false);
        }

        sets.push(format!("updated_at = ?{}", values.len() + 1));
        values.push(Box::new(now()));

        let sql = format!(
            "UPDATE channels SET {} WHERE channel_id = ?1",
            sets.join(", ")
        );
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            values.iter().map(|v| v.as_ref()).collect();
        let changed = conn.execute(&sql, params_ref.as_slice())?;
        Ok(changed > 0)
    })
}

/// All channels, ordered by name.
pub fn list_all(db: &Database) -> Result<Vec<ChannelRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM channels ORDER BY channel_name")?;
        let rows: Vec<ChannelRow> = stmt
            .query_map([], ChannelRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Enabled channels only, ordered by name — the discovery sweep's input.
pub fn list_enabled(db: &Database) -> Result<Vec<ChannelRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM channels WHERE enabled = 1 ORDER BY channel_name")?;
        let rows: Vec<ChannelRow> = stmt
            .query_map([], ChannelRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Finds a channel by its ID.
pub fn find_by_id(db: &Database, channel_id: &str) -> Result<Option<ChannelRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM channels WHERE channel_id = ?1",
                params![channel_id],
                ChannelRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Replaces the channel list. Channels that survive the replacement keep
/// their original `added_at`, so upload-date filtering stays anchored to
/// first enrollment.
pub fn set_all(db: &Database, channels: &[(String, String)]) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let mut existing = std::collections::HashMap::new();
        {
            let mut stmt = conn.prepare("SELECT channel_id, added_at FROM channels")?;
            let rows = stmt.query_map([], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (id, added_at) = row?;
                existing.insert(id, added_at);
            }
        }

        conn.execute("DELETE FROM channels", [])?;

        let ts = now();
        for (channel_id, channel_name) in channels {
            let added_at = existing.get(channel_id).cloned().unwrap_or_else(|| ts.clone());
            conn.execute(
                "INSERT INTO channels (channel_id, channel_name, enabled, added_at, updated_at)
                 VALUES (?1, ?2, 1, ?3, ?4)",
                params![channel_id, channel_name, added_at, ts],
            )?;
        }

        Ok(())
    })
}
