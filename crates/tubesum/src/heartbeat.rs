//! Processing heartbeat.
//!
//! A timestamp file refreshed at sweep start and before every slow pipeline
//! stage. The stuck-job sweeper reads it to tell "a processor is actively
//! working" apart from "a processor crashed mid-pipeline" — independent of
//! the instance lock, which only says a process exists.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// File name of the heartbeat record inside the data directory.
pub const HEARTBEAT_FILE_NAME: &str = "heartbeat";

/// Age in seconds beyond which the heartbeat no longer counts as alive.
pub const DEFAULT_STALE_SECS: u64 = 120;

/// Liveness beacon over a timestamp file.
#[derive(Clone)]
pub struct Heartbeat {
    path: PathBuf,
}

impl Heartbeat {
    /// Heartbeat at the canonical location inside `data_dir`.
    pub fn new(data_dir: &Path) -> Self {
        Self::at_path(data_dir.join(HEARTBEAT_FILE_NAME))
    }

    /// Heartbeat at an explicit path (tests).
    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Writes the current wall-clock time. Best effort: a failed write is
    /// logged, not propagated, since a missing beat only widens the stuck
    /// window.
    pub fn beat(&self) {
        let result = self
            .path
            .parent()
            .map(std::fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|_| std::fs::write(&self.path, unix_now().to_string()));

        if let Err(e) = result {
            log::warn!("Failed to update heartbeat: {}", e);
        }
    }

    /// True iff the record exists, parses, and is younger than the
    /// threshold. Unreadable records count as dead.
    pub fn is_alive(&self, threshold_secs: u64) -> bool {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return false,
        };

        let written: u64 = match content.trim().parse() {
            Ok(secs) => secs,
            Err(_) => return false,
        };

        unix_now().saturating_sub(written) < threshold_secs
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
