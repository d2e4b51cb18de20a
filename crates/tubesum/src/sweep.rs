//! The sweep orchestrator.
//!
//! One sweep = acquire the instance lock, reclaim stuck videos, replay
//! pending rows oldest-first, then discover new uploads per enabled
//! channel. The lock guard releases on every exit path, including
//! propagated store errors.

use std::path::Path;

use chrono::NaiveDate;
use log::{debug, error, info, warn};

use crate::db::video_repo::{self, VideoStatus};
use crate::db::{channel_repo, Database};
use crate::error::Result;
use crate::heartbeat::Heartbeat;
use crate::lock::InstanceLock;
use crate::pipeline::{PipelineRunner, StageOutcome, VideoTask};
use crate::provider::{Mailer, SummaryEngine, TranscriptSource, VideoDirectory};
use crate::recovery::StuckSweeper;
use crate::settings::SweepSettings;
use crate::throttle::RateLimiter;

/// Process-name fragment the instance lock looks for when probing a
/// recorded pid.
pub const PROCESS_NAME_FRAGMENT: &str = "tubesum";

/// Counters reported at the end of a sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    /// Videos whose summary was stored (including partial successes).
    pub summarized: u64,
    pub emails_sent: u64,
    pub emails_failed: u64,
    pub no_transcript: u64,
    pub summary_failures: u64,
    /// Discovery items skipped because they predate channel enrollment.
    pub skipped_old: u64,
    /// Discovery items skipped because they are already tracked.
    pub already_tracked: u64,
    pub stuck_reset: u64,
    pub stuck_permanent: u64,
}

impl SweepStats {
    fn tally(&mut self, outcome: StageOutcome) {
        match outcome {
            StageOutcome::Completed { emailed } => {
                self.summarized += 1;
                if emailed {
                    self.emails_sent += 1;
                }
            }
            StageOutcome::EmailFailed => {
                self.summarized += 1;
                self.emails_failed += 1;
            }
            StageOutcome::NoTranscript => self.no_transcript += 1,
            StageOutcome::SummaryFailed => self.summary_failures += 1,
        }
    }
}

/// How a sweep invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepStats),
    /// Another live orchestrator holds the lock; nothing was touched.
    SkippedLockHeld,
}

pub struct Orchestrator {
    db: Database,
    lock: InstanceLock,
    heartbeat: Heartbeat,
    directory: Box<dyn VideoDirectory>,
    transcripts: Box<dyn TranscriptSource>,
    summarizer: Box<dyn SummaryEngine>,
    mailer: Option<Box<dyn Mailer>>,
    limiter: RateLimiter,
}

impl Orchestrator {
    /// Production constructor — lock, heartbeat and rate limiter at their
    /// defaults inside `data_dir`.
    pub fn new(
        db: Database,
        data_dir: &Path,
        directory: Box<dyn VideoDirectory>,
        transcripts: Box<dyn TranscriptSource>,
        summarizer: Box<dyn SummaryEngine>,
        mailer: Option<Box<dyn Mailer>>,
    ) -> Self {
        Self::with_components(
            db,
            InstanceLock::new(data_dir, PROCESS_NAME_FRAGMENT),
            Heartbeat::new(data_dir),
            directory,
            transcripts,
            summarizer,
            mailer,
            RateLimiter::default(),
        )
    }

    /// Fully injected constructor for tests and unusual deployments.
    #[allow(clippy::too_many_arguments)]
    pub fn with_components(
        db: Database,
        lock: InstanceLock,
        heartbeat: Heartbeat,
        directory: Box<dyn VideoDirectory>,
        transcripts: Box<dyn TranscriptSource>,
        summarizer: Box<dyn SummaryEngine>,
        mailer: Option<Box<dyn Mailer>>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            db,
            lock,
            heartbeat,
            directory,
            transcripts,
            summarizer,
            mailer,
            limiter,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Runs one full sweep.
    pub fn run_sweep(&self) -> Result<SweepOutcome> {
        let Some(_guard) = self.lock.acquire()? else {
            info!("Another processor instance is already running; skipping sweep");
            return Ok(SweepOutcome::SkippedLockHeld);
        };

        info!("Starting sweep");
        self.heartbeat.beat();

        let recovery = StuckSweeper::new(self.db.clone(), self.heartbeat.clone()).run()?;
        let settings = SweepSettings::load(&self.db)?;

        let mut stats = SweepStats {
            stuck_reset: recovery.reset,
            stuck_permanent: recovery.failed_permanent,
            ..Default::default()
        };

        let runner = PipelineRunner::new(
            self.db.clone(),
            self.heartbeat.clone(),
            self.directory.as_ref(),
            self.transcripts.as_ref(),
            self.summarizer.as_ref(),
            self.mailer.as_deref(),
            &settings,
        );

        // Pending rows first: manual submissions and resets must never be
        // starved by discovery.
        let pending = video_repo::pending(&self.db)?;
        if !pending.is_empty() {
            info!("Replaying {} pending videos", pending.len());
        }
        for row in pending {
            let outcome = runner.process(&VideoTask::from_row(&row))?;
            stats.tally(outcome);
            self.limiter.pause();
        }

        for channel in channel_repo::list_enabled(&self.db)? {
            info!("Checking channel: {}", channel.channel_name);
            let videos = match self.directory.list_recent(
                &channel.channel_id,
                settings.max_feed_entries,
                settings.skip_shorts,
            ) {
                Ok(videos) => videos,
                Err(e) => {
                    // One unreachable channel must not abort the sweep.
                    error!("Discovery failed for {}: {}", channel.channel_id, e);
                    continue;
                }
            };

            if videos.is_empty() {
                debug!("No uploads listed for {}", channel.channel_id);
                continue;
            }

            for video in videos {
                if let Some(existing) = video_repo::find_by_id(&self.db, &video.id)? {
                    if existing.status != VideoStatus::Pending {
                        debug!("Skipping {} ({})", video.id, existing.status);
                        stats.already_tracked += 1;
                        continue;
                    }
                }

                // The flat listing often lacks upload dates; fetch metadata
                // once when a date is needed for the enrollment filter.
                let mut upload_date = video.upload_date.clone();
                if upload_date.is_none() {
                    match self.directory.fetch_metadata(&video.id) {
                        Ok(Some(metadata)) => upload_date = metadata.upload_date,
                        Ok(None) => {}
                        Err(e) => debug!("Upload-date lookup failed for {}: {}", video.id, e),
                    }
                }

                if !should_process_upload(upload_date.as_deref(), Some(&channel.added_at)) {
                    info!(
                        "Skipping video uploaded before channel enrollment: {}",
                        video.title
                    );
                    stats.skipped_old += 1;
                    continue;
                }

                let outcome = runner.process(&VideoTask::from_discovery(&video, &channel))?;
                stats.tally(outcome);
                self.limiter.pause();
            }
        }

        info!(
            "Sweep complete: {} summarized, {} emailed, {} email failures, {} without transcript, {} summary failures",
            stats.summarized,
            stats.emails_sent,
            stats.emails_failed,
            stats.no_transcript,
            stats.summary_failures
        );
        if stats.skipped_old + stats.already_tracked > 0 {
            info!(
                "Skipped {} old and {} already-tracked videos",
                stats.skipped_old, stats.already_tracked
            );
        }
        if stats.stuck_reset + stats.stuck_permanent > 0 {
            info!(
                "Recovered {} stuck videos ({} failed permanently)",
                stats.stuck_reset + stats.stuck_permanent,
                stats.stuck_permanent
            );
        }

        Ok(SweepOutcome::Completed(stats))
    }
}

/// Whether a discovered upload should be processed given the channel's
/// enrollment time. Missing or unparsable dates fail open: processing a
/// stray old video is cheaper than silently dropping a new one.
pub fn should_process_upload(upload_date: Option<&str>, channel_added_at: Option<&str>) -> bool {
    let Some(added_raw) = channel_added_at.filter(|s| !s.trim().is_empty()) else {
        return true;
    };
    let Some(upload_raw) = upload_date.filter(|s| !s.trim().is_empty()) else {
        return true;
    };

    let Some(added) = parse_enrollment_date(added_raw) else {
        warn!("Unparsable channel enrollment date '{}'", added_raw);
        return true;
    };
    let Some(uploaded) = parse_video_date(upload_raw) else {
        warn!("Unparsable upload date '{}'", upload_raw);
        return true;
    };

    uploaded >= added
}

/// Upload dates arrive as `YYYYMMDD` (yt-dlp) or `YYYY-MM-DD` (feeds).
fn parse_video_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() == 8 && !raw.contains('-') {
        NaiveDate::parse_from_str(raw, "%Y%m%d").ok()
    } else {
        NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
    }
}

/// Enrollment timestamps are RFC 3339 or `YYYY-MM-DD HH:MM:SS`; only the
/// date part matters for filtering.
fn parse_enrollment_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim().get(..10)?, "%Y-%m-%d").ok()
}
