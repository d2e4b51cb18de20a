//! Shared fakes and fixtures for the sweep integration tests.
//!
//! Fakes are cheaply cloneable handles over shared state, so a test can
//! keep one clone for assertions while the orchestrator owns the other.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use tempfile::TempDir;

use tubesum::db::video_repo::{VideoRow, VideoStatus};
use tubesum::db::{channel_repo, Database};
use tubesum::heartbeat::Heartbeat;
use tubesum::lock::{InstanceLock, ProcessProbe, LOCK_FILE_NAME};
use tubesum::provider::{
    DiscoveredVideo, Mailer, ProviderError, SummaryEngine, SummaryRequest, Transcript,
    TranscriptSource, VideoDirectory, VideoMetadata,
};
use tubesum::throttle::RateLimiter;
use tubesum::Orchestrator;

#[derive(Clone, Default)]
pub struct FakeDirectory {
    pub listings: Arc<Mutex<HashMap<String, Vec<DiscoveredVideo>>>>,
    pub metadata: Arc<Mutex<HashMap<String, VideoMetadata>>>,
}

impl FakeDirectory {
    pub fn add_listing(&self, channel_id: &str, videos: Vec<DiscoveredVideo>) {
        self.listings
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), videos);
    }
}

impl VideoDirectory for FakeDirectory {
    fn list_recent(
        &self,
        channel_id: &str,
        _max_items: usize,
        _skip_shorts: bool,
    ) -> Result<Vec<DiscoveredVideo>, ProviderError> {
        Ok(self
            .listings
            .lock()
            .unwrap()
            .get(channel_id)
            .cloned()
            .unwrap_or_default())
    }

    fn fetch_metadata(&self, video_id: &str) -> Result<Option<VideoMetadata>, ProviderError> {
        Ok(self.metadata.lock().unwrap().get(video_id).cloned())
    }
}

#[derive(Clone, Default)]
pub struct ScriptedTranscripts {
    pub unavailable: Arc<Mutex<HashSet<String>>>,
}

impl ScriptedTranscripts {
    pub fn mark_unavailable(&self, video_id: &str) {
        self.unavailable
            .lock()
            .unwrap()
            .insert(video_id.to_string());
    }
}

impl TranscriptSource for ScriptedTranscripts {
    fn fetch(&self, video_id: &str) -> Result<Option<Transcript>, ProviderError> {
        if self.unavailable.lock().unwrap().contains(video_id) {
            return Ok(None);
        }
        Ok(Some(Transcript {
            text: format!("transcript for {}", video_id),
            method: "yt-dlp".to_string(),
        }))
    }
}

#[derive(Clone, Default)]
pub struct RecordingSummarizer {
    pub fail: bool,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingSummarizer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn call_titles(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl SummaryEngine for RecordingSummarizer {
    fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(request.title.to_string());
        if self.fail {
            Err(ProviderError::Parse("model unavailable".into()))
        } else {
            Ok(format!("Summary of {}", request.title))
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingMailer {
    pub fail: bool,
    pub delivered: Arc<Mutex<Vec<String>>>,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }
}

impl Mailer for RecordingMailer {
    fn deliver(
        &self,
        video: &VideoRow,
        _summary: &str,
        _channel_name: &str,
    ) -> Result<(), ProviderError> {
        if self.fail {
            return Err(ProviderError::Smtp("connection refused".into()));
        }
        self.delivered.lock().unwrap().push(video.id.clone());
        Ok(())
    }
}

pub struct FakeProbe {
    alive: HashSet<u32>,
}

impl FakeProbe {
    pub fn new(alive: &[u32]) -> Box<Self> {
        Box::new(Self {
            alive: alive.iter().copied().collect(),
        })
    }
}

impl ProcessProbe for FakeProbe {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive.contains(&pid)
    }
}

/// Isolated environment: temp data directory, file-backed database and
/// injected fakes.
pub struct Harness {
    pub dir: TempDir,
    pub db: Database,
    pub directory: FakeDirectory,
    pub transcripts: ScriptedTranscripts,
    pub summarizer: RecordingSummarizer,
    pub mailer: RecordingMailer,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("tubesum.db")).unwrap();
        Self {
            dir,
            db,
            directory: FakeDirectory::default(),
            transcripts: ScriptedTranscripts::default(),
            summarizer: RecordingSummarizer::default(),
            mailer: RecordingMailer::default(),
        }
    }

    /// Orchestrator over the harness fakes. `alive_pids` seeds the fake
    /// process table used by the instance lock.
    pub fn orchestrator(&self, alive_pids: &[u32]) -> Orchestrator {
        Orchestrator::with_components(
            self.db.clone(),
            InstanceLock::with_probe(
                self.dir.path().join(LOCK_FILE_NAME),
                FakeProbe::new(alive_pids),
            ),
            Heartbeat::new(self.dir.path()),
            Box::new(self.directory.clone()),
            Box::new(self.transcripts.clone()),
            Box::new(self.summarizer.clone()),
            Some(Box::new(self.mailer.clone())),
            RateLimiter::none(),
        )
    }

    /// Enrolls a channel and pins its `added_at`.
    pub fn add_channel(&self, channel_id: &str, name: &str, added_at: Option<&str>) {
        channel_repo::insert(&self.db, channel_id, name).unwrap();
        if let Some(added_at) = added_at {
            self.db
                .with_conn(|conn| {
                    conn.execute(
                        "UPDATE channels SET added_at = ?2 WHERE channel_id = ?1",
                        rusqlite::params![channel_id, added_at],
                    )?;
                    Ok(())
                })
                .unwrap();
        }
    }

    /// Puts an existing video into an in-flight state some minutes in the
    /// past, as a crashed processor would leave it.
    pub fn strand_video(&self, id: &str, status: VideoStatus, minutes_ago: i64, retries: i64) {
        let row = VideoRow::new(id, "UC123", Some("Tech Channel"), &format!("Stranded {}", id));
        tubesum::db::video_repo::insert(&self.db, &row).unwrap();
        let backdated = (Utc::now() - Duration::minutes(minutes_ago)).to_rfc3339();
        self.db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE videos SET status = ?2, retry_count = ?3, updated_at = ?4 WHERE id = ?1",
                    rusqlite::params![id, status.as_str(), retries, backdated],
                )?;
                Ok(())
            })
            .unwrap();
    }

    pub fn video(&self, id: &str) -> VideoRow {
        tubesum::db::video_repo::find_by_id(&self.db, id)
            .unwrap()
            .unwrap_or_else(|| panic!("video {} not found", id))
    }
}

pub fn discovered(id: &str, title: &str, upload_date: Option<&str>) -> DiscoveredVideo {
    DiscoveredVideo {
        id: id.to_string(),
        title: title.to_string(),
        upload_date: upload_date.map(str::to_string),
    }
}
