//! Typed view over the database-backed settings store.
//!
//! The sweep loads one snapshot per run so configuration changes apply at
//! sweep boundaries, never mid-video.

use std::time::Duration;

use crate::db::{settings_repo, Database, DatabaseError};

/// Prompt used when `SUMMARY_PROMPT` is unset. Placeholders: `{title}`,
/// `{channel}`, `{duration}`, `{transcript}`.
pub const DEFAULT_PROMPT: &str = "\
You are summarizing a YouTube video for a busy reader.

Video: {title}
Channel: {channel}
Duration: {duration}

Transcript:
{transcript}

Write a concise summary of the key points. Close with notable quotes or
numbers when the video contains any.";

/// Fallback sweep cadence when the setting is missing or unreadable.
pub const DEFAULT_CHECK_INTERVAL_MINUTES: i64 = 240;

/// Per-sweep configuration snapshot.
#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub send_email: bool,
    pub skip_shorts: bool,
    pub max_feed_entries: usize,
    pub prompt_template: String,
    pub max_summary_tokens: Option<u32>,
}

impl SweepSettings {
    pub fn load(db: &Database) -> Result<Self, DatabaseError> {
        let use_length = settings_repo::get_bool(db, "USE_SUMMARY_LENGTH", false)?;
        let max_summary_tokens = if use_length {
            Some(settings_repo::get_i64(db, "SUMMARY_LENGTH", 500)?.max(1) as u32)
        } else {
            None
        };

        Ok(Self {
            send_email: settings_repo::get_bool(db, "SEND_EMAIL_SUMMARIES", true)?,
            skip_shorts: settings_repo::get_bool(db, "SKIP_SHORTS", true)?,
            max_feed_entries: settings_repo::get_i64(db, "MAX_FEED_ENTRIES", 20)?.clamp(1, 100)
                as usize,
            prompt_template: settings_repo::get_or(db, "SUMMARY_PROMPT", DEFAULT_PROMPT)?,
            max_summary_tokens,
        })
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            send_email: true,
            skip_shorts: true,
            max_feed_entries: 20,
            prompt_template: DEFAULT_PROMPT.to_string(),
            max_summary_tokens: None,
        }
    }
}

/// Time between sweeps, re-read by the scheduler every cycle.
pub fn check_interval(db: &Database) -> Duration {
    let minutes = settings_repo::get_i64(db, "CHECK_INTERVAL_MINUTES", DEFAULT_CHECK_INTERVAL_MINUTES)
        .unwrap_or(DEFAULT_CHECK_INTERVAL_MINUTES)
        .max(1);
    Duration::from_secs(minutes as u64 * 60)
}
