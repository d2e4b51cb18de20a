//! Settings repository — the database-backed configuration store.
//!
//! Defaults are seeded by the settings migration; reads never fail on a
//! missing key, they return `None` and callers fall back to defaults.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// Replacement shown instead of non-empty `secret` values on masked reads.
const SECRET_MASK: &str = "********";

/// A settings row from the database.
#[derive(Debug, Clone)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
    pub kind: String,
    pub description: Option<String>,
}

impl SettingRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            key: row.get("key")?,
            value: row.get("value")?,
            kind: row.get("kind")?,
            description: row.get("description")?,
        })
    }
}

/// Gets a single setting value.
pub fn get(db: &Database, key: &str) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(value)
    })
}

/// Gets a setting value, falling back to a default when missing or empty.
pub fn get_or(db: &Database, key: &str, default: &str) -> Result<String, DatabaseError> {
    Ok(get(db, key)?
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string()))
}

/// Gets a boolean setting (`"true"` / anything else).
pub fn get_bool(db: &Database, key: &str, default: bool) -> Result<bool, DatabaseError> {
    Ok(match get(db, key)? {
        Some(v) if !v.is_empty() => v.eq_ignore_ascii_case("true"),
        _ => default,
    })
}

/// Gets an integer setting, falling back on missing or unparsable values.
pub fn get_i64(db: &Database, key: &str, default: i64) -> Result<i64, DatabaseError> {
    Ok(get(db, key)?
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default))
}

/// Upserts a setting value. Keys created this way get kind `text`.
pub fn set(db: &Database, key: &str, value: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO settings (key, value, kind, updated_at) VALUES (?1, ?2, 'text', ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    })
}

/// Deletes a setting. Returns false when not found.
pub fn delete(db: &Database, key: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(changed > 0)
    })
}

/// All settings ordered by key. With `mask_secrets`, non-empty `secret`
/// values are replaced for display.
pub fn get_all(db: &Database, mask_secrets: bool) -> Result<Vec<SettingRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT key, value, kind, description FROM settings ORDER BY key")?;
        let mut rows: Vec<SettingRow> = stmt
            .query_map([], SettingRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        if mask_secrets {
            for row in &mut rows {
                if row.kind == "secret" && !row.value.is_empty() {
                    row.value = SECRET_MASK.to_string();
                }
            }
        }

        Ok(rows)
    })
}
