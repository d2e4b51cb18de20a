//! Transcript extraction cascade.
//!
//! Methods are tried in order until one yields text: yt-dlp subtitle
//! extraction, the YouTube timedtext endpoint, then the optional
//! Supadata.ai API. A single method failing is logged and the cascade
//! moves on; only "every method came up empty" is reported as absent.
//! Availability is cached in the database so known-unavailable videos are
//! not re-probed on every retry.

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;

use crate::db::transcript_repo::{self, Availability};
use crate::db::Database;

use super::{ProviderError, Transcript, TranscriptSource};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const TIMEDTEXT_URL: &str = "https://video.google.com/timedtext";
const SUPADATA_URL: &str = "https://api.supadata.ai/v1/youtube/transcript";

pub struct CascadeExtractor {
    db: Database,
    binary: String,
    http: reqwest::blocking::Client,
    supadata_api_key: Option<String>,
}

impl CascadeExtractor {
    /// Builds the cascade. `supadata_api_key` enables the paid fallback.
    pub fn new(db: Database, supadata_api_key: Option<String>) -> Self {
        Self {
            db,
            binary: "yt-dlp".to_string(),
            http: reqwest::blocking::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
            supadata_api_key: supadata_api_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }

    /// yt-dlp subtitle extraction: download English subs (manual or auto)
    /// as VTT into a scratch directory and flatten them to plain text.
    fn try_ytdlp_subs(&self, video_id: &str) -> Result<Option<String>, ProviderError> {
        let scratch = std::env::temp_dir().join(format!("tubesum-subs-{}", video_id));
        std::fs::create_dir_all(&scratch).map_err(|e| {
            ProviderError::Command(format!("cannot create scratch dir: {}", e))
        })?;

        let outtmpl = scratch.join("%(id)s").to_string_lossy().to_string();
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        let output = Command::new(&self.binary)
            .args([
                "--skip-download",
                "--write-subs",
                "--write-auto-subs",
                "--sub-langs",
                "en.*",
                "--sub-format",
                "vtt",
                "-o",
                &outtmpl,
                &url,
            ])
            .output()
            .map_err(|e| ProviderError::Command(format!("failed to run {}: {}", self.binary, e)));

        let result = output.and_then(|output| {
            if !output.status.success() {
                debug!(
                    "yt-dlp subtitles for {} exited with {}: {}",
                    video_id,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                return Ok(None);
            }
            Ok(first_vtt_text(&scratch))
        });

        let _ = std::fs::remove_dir_all(&scratch);
        result
    }

    /// YouTube timedtext endpoint; only covers videos with published
    /// caption tracks, but needs no subprocess.
    fn try_timedtext(&self, video_id: &str) -> Result<Option<String>, ProviderError> {
        let response = self
            .http
            .get(TIMEDTEXT_URL)
            .query(&[("lang", "en"), ("v", video_id)])
            .send()?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body = response.text()?;
        Ok(parse_timedtext_xml(&body))
    }

    /// Supadata.ai fallback (paid, opt-in).
    fn try_supadata(&self, video_id: &str) -> Result<Option<String>, ProviderError> {
        let Some(ref api_key) = self.supadata_api_key else {
            return Ok(None);
        };

        #[derive(Deserialize)]
        struct SupadataResponse {
            content: Option<String>,
        }

        let response = self
            .http
            .get(SUPADATA_URL)
            .query(&[("videoId", video_id), ("text", "true")])
            .header("x-api-key", api_key)
            .send()?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let parsed: SupadataResponse = response
            .json()
            .map_err(|e| ProviderError::Parse(format!("supadata JSON: {}", e)))?;
        Ok(parsed.content.filter(|c| !c.trim().is_empty()))
    }
}

/// Reads the first `<id>*.vtt` file in the scratch directory.
fn first_vtt_text(scratch: &Path) -> Option<String> {
    let entries = std::fs::read_dir(scratch).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("vtt") {
            if let Ok(raw) = std::fs::read_to_string(&path) {
                let text = parse_vtt(&raw);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// Flattens a WebVTT file to plain text: cue headers, timestamps, inline
/// tags and consecutive duplicate lines are dropped.
fn parse_vtt(raw: &str) -> String {
    static TAG_RE: OnceLock<regex::Regex> = OnceLock::new();
    let tag_re = TAG_RE.get_or_init(|| regex::Regex::new(r"<[^>]+>").expect("static regex"));
    let mut lines: Vec<String> = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with("WEBVTT")
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.starts_with("NOTE")
            || line.contains("-->")
        {
            continue;
        }

        let cleaned = tag_re.replace_all(line, "").trim().to_string();
        if cleaned.is_empty() {
            continue;
        }
        // Auto-generated tracks repeat each line as the cue scrolls.
        if lines.last().map(|l| l == &cleaned).unwrap_or(false) {
            continue;
        }
        lines.push(cleaned);
    }

    lines.join(" ")
}

/// Extracts plain text from a timedtext XML document.
fn parse_timedtext_xml(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }

    static TEXT_RE: OnceLock<regex::Regex> = OnceLock::new();
    let text_re = TEXT_RE
        .get_or_init(|| regex::Regex::new(r"<text[^>]*>([\s\S]*?)</text>").expect("static regex"));
    let mut parts = Vec::new();
    for capture in text_re.captures_iter(raw) {
        let decoded = decode_entities(&capture[1]);
        let trimmed = decoded.trim().to_string();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&amp;#39;", "'")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace('\n', " ")
}

impl TranscriptSource for CascadeExtractor {
    fn fetch(&self, video_id: &str) -> Result<Option<Transcript>, ProviderError> {
        if let Ok(Some(cached)) = transcript_repo::get(&self.db, video_id) {
            if cached.status == Availability::Unavailable {
                debug!("Transcript cache: {} known unavailable", video_id);
                return Ok(None);
            }
        }

        type Method<'a> = (
            &'static str,
            Box<dyn Fn(&str) -> Result<Option<String>, ProviderError> + 'a>,
        );
        let methods: [Method<'_>; 3] = [
            ("yt-dlp", Box::new(|id: &str| self.try_ytdlp_subs(id))),
            ("timedtext", Box::new(|id: &str| self.try_timedtext(id))),
            ("supadata", Box::new(|id: &str| self.try_supadata(id))),
        ];

        for (method, fetch) in methods {
            match fetch(video_id) {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    debug!("Transcript for {} via {}", video_id, method);
                    let _ = transcript_repo::set(&self.db, video_id, Availability::Available, None);
                    return Ok(Some(Transcript {
                        text,
                        method: method.to_string(),
                    }));
                }
                Ok(_) => {}
                Err(e) => {
                    // One failing method must not kill the cascade.
                    warn!("Transcript method {} failed for {}: {}", method, video_id, e);
                }
            }
        }

        let _ = transcript_repo::set(
            &self.db,
            video_id,
            Availability::Unavailable,
            Some("no transcript from any method"),
        );
        Ok(None)
    }
}
