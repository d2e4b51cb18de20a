//! Stuck-video detection and recovery.
//!
//! Runs at the start of each sweep. Any video left in an in-flight status
//! by a crashed or hung processor is classified against tiered staleness
//! thresholds and either reset to `pending` or, once its retry budget is
//! exhausted, failed permanently.

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::db::video_repo::{self, VideoStatus, MAX_RETRIES};
use crate::db::{Database, DatabaseError};
use crate::heartbeat::{Heartbeat, DEFAULT_STALE_SECS};

/// Tier 1: reclaim after this many minutes when no heartbeat is alive.
pub const NO_HEARTBEAT_MINUTES: f64 = 2.0;
/// Tier 2: reclaim after this many minutes regardless of heartbeat.
pub const TIMEOUT_MINUTES: f64 = 5.0;
/// Tier 3: absolute failsafe.
pub const FAILSAFE_MINUTES: f64 = 10.0;

const RESET_MESSAGE: &str = "Reset from stuck processing state";
const PERMANENT_MESSAGE: &str = "Max retries exceeded (3 attempts)";

/// Which tier flagged a video as stuck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckReason {
    NoHeartbeat,
    Timeout,
    Failsafe,
}

/// Outcome counts of one recovery pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub reset: u64,
    pub failed_permanent: u64,
}

/// Classifies an in-flight video. First matching tier wins.
fn classify(minutes_in_flight: f64, processor_alive: bool) -> Option<StuckReason> {
    if minutes_in_flight > NO_HEARTBEAT_MINUTES && !processor_alive {
        return Some(StuckReason::NoHeartbeat);
    }
    if minutes_in_flight > TIMEOUT_MINUTES {
        return Some(StuckReason::Timeout);
    }
    // Shadowed by the timeout tier at the current thresholds; kept as a
    // separate failsafe in case the tiers ever diverge per status.
    if minutes_in_flight > FAILSAFE_MINUTES {
        return Some(StuckReason::Failsafe);
    }
    None
}

/// Scans in-flight videos and reclaims abandoned ones.
pub struct StuckSweeper {
    db: Database,
    heartbeat: Heartbeat,
    stale_threshold_secs: u64,
}

impl StuckSweeper {
    pub fn new(db: Database, heartbeat: Heartbeat) -> Self {
        Self::with_threshold(db, heartbeat, DEFAULT_STALE_SECS)
    }

    pub fn with_threshold(db: Database, heartbeat: Heartbeat, stale_threshold_secs: u64) -> Self {
        Self {
            db,
            heartbeat,
            stale_threshold_secs,
        }
    }

    /// Runs one recovery pass against the current wall clock.
    pub fn run(&self) -> Result<RecoveryReport, DatabaseError> {
        self.run_at(Utc::now())
    }

    /// Runs one recovery pass against an explicit `now` (tests).
    pub fn run_at(&self, now: DateTime<Utc>) -> Result<RecoveryReport, DatabaseError> {
        let in_flight = video_repo::in_flight(&self.db)?;
        if in_flight.is_empty() {
            return Ok(RecoveryReport::default());
        }

        let processor_alive = self.heartbeat.is_alive(self.stale_threshold_secs);
        let mut report = RecoveryReport::default();

        for video in in_flight {
            let last_transition = match DateTime::parse_from_rfc3339(&video.updated_at) {
                Ok(ts) => ts.with_timezone(&Utc),
                Err(e) => {
                    warn!(
                        "Skipping {} with unreadable transition time '{}': {}",
                        video.id, video.updated_at, e
                    );
                    continue;
                }
            };

            let minutes = (now - last_transition).num_seconds() as f64 / 60.0;
            let Some(reason) = classify(minutes, processor_alive) else {
                continue;
            };

            let label = match reason {
                StuckReason::NoHeartbeat => "no heartbeat",
                StuckReason::Timeout => "timeout",
                StuckReason::Failsafe => "absolute",
            };
            warn!(
                "Stuck ({}): {} ({:.1} min in {})",
                label,
                video.title,
                minutes,
                video.status.as_str()
            );

            if video.retry_count >= MAX_RETRIES {
                video_repo::update_status(
                    &self.db,
                    &video.id,
                    VideoStatus::FailedPermanent,
                    Some(PERMANENT_MESSAGE),
                )?;
                info!("Marked as permanent failure: {}", video.id);
                report.failed_permanent += 1;
            } else {
                // The retry counter is bumped when the video is next picked
                // up, not here.
                video_repo::update_status(
                    &self.db,
                    &video.id,
                    VideoStatus::Pending,
                    Some(RESET_MESSAGE),
                )?;
                info!("Reset to pending: {}", video.id);
                report.reset += 1;
            }
        }

        let recovered = report.reset + report.failed_permanent;
        if recovered > 0 {
            info!("Cleaned up {} stuck videos", recovered);
        }

        Ok(report)
    }
}
