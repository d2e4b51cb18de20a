//! Channel discovery and metadata via the `yt-dlp` binary.
//!
//! Listings use `--flat-playlist` (one JSON object per line, cheap, no
//! per-video page fetch); metadata uses a full `--dump-json` for a single
//! video. A missing or broken binary surfaces as `ProviderError::Command`;
//! a video the platform will not describe is `Ok(None)`.

use std::process::Command;

use log::debug;
use serde::Deserialize;

use super::{DiscoveredVideo, ProviderError, VideoDirectory, VideoMetadata};

/// Videos shorter than this are treated as Shorts when filtering.
const SHORTS_MAX_SECONDS: f64 = 60.0;

pub struct YtDlpClient {
    binary: String,
}

impl YtDlpClient {
    pub fn new() -> Self {
        Self::with_binary("yt-dlp")
    }

    pub fn with_binary(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<std::process::Output, ProviderError> {
        Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| ProviderError::Command(format!("failed to run {}: {}", self.binary, e)))
    }
}

impl Default for YtDlpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct FlatEntry {
    id: String,
    title: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
    upload_date: Option<String>,
}

#[derive(Deserialize)]
struct FullEntry {
    title: Option<String>,
    channel_id: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    view_count: Option<i64>,
    upload_date: Option<String>,
}

/// Parses a `--flat-playlist --dump-json` listing (one JSON object per
/// line). Unparsable lines are skipped.
fn parse_flat_listing(raw: &str, skip_shorts: bool) -> Vec<DiscoveredVideo> {
    let mut videos = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: FlatEntry = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unparsable listing line: {}", e);
                continue;
            }
        };

        if skip_shorts {
            let is_short_url = entry
                .url
                .as_deref()
                .map(|u| u.contains("/shorts/"))
                .unwrap_or(false);
            let is_short_duration = entry
                .duration
                .map(|d| d > 0.0 && d < SHORTS_MAX_SECONDS)
                .unwrap_or(false);
            if is_short_url || is_short_duration {
                continue;
            }
        }

        let title = entry
            .title
            .unwrap_or_else(|| format!("Video {}", entry.id));
        videos.push(DiscoveredVideo {
            id: entry.id,
            title,
            upload_date: entry.upload_date,
        });
    }

    videos
}

/// Parses a full `--dump-json` metadata object.
fn parse_metadata(raw: &str) -> Result<VideoMetadata, ProviderError> {
    let entry: FullEntry = serde_json::from_str(raw.trim())
        .map_err(|e| ProviderError::Parse(format!("metadata JSON: {}", e)))?;

    Ok(VideoMetadata {
        title: entry.title,
        channel_id: entry.channel_id,
        // `channel` first, `uploader` as fallback.
        channel_name: entry.channel.or(entry.uploader),
        duration_seconds: entry.duration.map(|d| d as i64),
        view_count: entry.view_count,
        upload_date: entry.upload_date,
    })
}

impl VideoDirectory for YtDlpClient {
    fn list_recent(
        &self,
        channel_id: &str,
        max_items: usize,
        skip_shorts: bool,
    ) -> Result<Vec<DiscoveredVideo>, ProviderError> {
        let url = format!("https://www.youtube.com/channel/{}/videos", channel_id);
        let end = max_items.to_string();
        let output = self.run(&[
            "--flat-playlist",
            "--dump-json",
            "--playlist-end",
            &end,
            &url,
        ])?;

        if !output.status.success() {
            return Err(ProviderError::Command(format!(
                "yt-dlp listing for {} exited with {}: {}",
                channel_id,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        Ok(parse_flat_listing(&raw, skip_shorts))
    }

    fn fetch_metadata(&self, video_id: &str) -> Result<Option<VideoMetadata>, ProviderError> {
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        let output = self.run(&["--dump-json", "--skip-download", &url])?;

        if !output.status.success() {
            // Removed, private or region-locked videos are absent, not
            // errors — the metadata stage is best-effort.
            debug!(
                "yt-dlp metadata for {} exited with {}: {}",
                video_id,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        parse_metadata(&raw).map(Some)
    }
}
