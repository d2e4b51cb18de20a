//! External collaborator seams.
//!
//! The pipeline only sees these traits; production implementations live in
//! the submodules and tests substitute fakes.

pub mod email;
pub mod openai;
pub mod transcript;
pub mod ytdlp;

use thiserror::Error;

use crate::db::video_repo::VideoRow;

/// Errors from collaborator calls. The pipeline downgrades these to
/// persisted per-video statuses; they never abort a sweep.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Failed to parse provider output: {0}")]
    Parse(String),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Provider misconfigured: {0}")]
    Config(String),
}

/// A video surfaced by channel discovery.
#[derive(Debug, Clone)]
pub struct DiscoveredVideo {
    pub id: String,
    pub title: String,
    /// `YYYYMMDD` or `YYYY-MM-DD` when the listing carries it.
    pub upload_date: Option<String>,
}

/// Rich metadata for a single video.
#[derive(Debug, Clone, Default)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub duration_seconds: Option<i64>,
    pub view_count: Option<i64>,
    pub upload_date: Option<String>,
}

impl VideoMetadata {
    /// `H:MM:SS` / `M:SS` label for prompts and email bodies.
    pub fn duration_label(&self) -> Option<String> {
        let total = self.duration_seconds?;
        if total < 0 {
            return None;
        }
        let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
        Some(if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{}:{:02}", minutes, seconds)
        })
    }
}

/// An extracted transcript and the method that produced it.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub method: String,
}

/// Everything the summarizer needs for one video.
#[derive(Debug, Clone)]
pub struct SummaryRequest<'a> {
    pub title: &'a str,
    pub channel_name: &'a str,
    pub duration_label: &'a str,
    pub transcript: &'a str,
    pub prompt_template: &'a str,
    pub max_tokens: Option<u32>,
}

/// Channel discovery and per-video metadata.
pub trait VideoDirectory: Send + Sync {
    /// Most recent uploads of a channel, newest first.
    fn list_recent(
        &self,
        channel_id: &str,
        max_items: usize,
        skip_shorts: bool,
    ) -> Result<Vec<DiscoveredVideo>, ProviderError>;

    /// Rich metadata for one video. `Ok(None)` when the platform has
    /// nothing to offer; metadata is best-effort for callers.
    fn fetch_metadata(&self, video_id: &str) -> Result<Option<VideoMetadata>, ProviderError>;
}

/// Transcript extraction. `Ok(None)` means no transcript is obtainable.
pub trait TranscriptSource: Send + Sync {
    fn fetch(&self, video_id: &str) -> Result<Option<Transcript>, ProviderError>;
}

/// Summary generation.
pub trait SummaryEngine: Send + Sync {
    fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String, ProviderError>;
}

/// Summary delivery.
pub trait Mailer: Send + Sync {
    fn deliver(
        &self,
        video: &VideoRow,
        summary: &str,
        channel_name: &str,
    ) -> Result<(), ProviderError>;
}
