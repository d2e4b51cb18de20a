//! Periodic sweep scheduler.
//!
//! Runs the orchestrator in a background thread: one sweep immediately,
//! then one per configured interval. A broadcast trigger channel lets the
//! administrative layer request an immediate sweep between ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::broadcast;

use crate::settings;
use crate::sweep::{Orchestrator, SweepOutcome};

/// Periodic sweep scheduler driving an [`Orchestrator`].
pub struct SweepScheduler {
    orchestrator: Arc<Orchestrator>,
    shutdown: Arc<AtomicBool>,
}

impl SweepScheduler {
    /// Creates a new sweep scheduler.
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the sweep loop in a background thread.
    /// Accepts a trigger receiver for manual sweep requests.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let shutdown = Arc::clone(&self.shutdown);

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build scheduler runtime");

            rt.block_on(async {
                loop {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    match orchestrator.run_sweep() {
                        Ok(SweepOutcome::Completed(stats)) => {
                            log::debug!("Sweep stats: {:?}", stats);
                        }
                        Ok(SweepOutcome::SkippedLockHeld) => {
                            log::info!("Sweep skipped; lock held elsewhere");
                        }
                        Err(e) => log::error!("Sweep failed: {}", e),
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    // Re-read the cadence each cycle so setting changes
                    // apply without a restart.
                    let interval = settings::check_interval(orchestrator.db());
                    log::info!("Next sweep in {} minutes", interval.as_secs() / 60);

                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {},
                        Ok(()) = trigger_rx.recv() => {
                            log::info!("Manual sweep triggered");
                        },
                    }
                }
            });
        })
    }

    /// Signals the scheduler to stop after the current sweep.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::video_repo::VideoRow;
    use crate::db::Database;
    use crate::provider::{
        DiscoveredVideo, Mailer, ProviderError, SummaryEngine, SummaryRequest, Transcript,
        TranscriptSource, VideoDirectory, VideoMetadata,
    };
    use crate::throttle::RateLimiter;
    use std::time::Duration;

    struct IdleDirectory;
    impl VideoDirectory for IdleDirectory {
        fn list_recent(
            &self,
            _: &str,
            _: usize,
            _: bool,
        ) -> Result<Vec<DiscoveredVideo>, ProviderError> {
            Ok(vec![])
        }
        fn fetch_metadata(&self, _: &str) -> Result<Option<VideoMetadata>, ProviderError> {
            Ok(None)
        }
    }

    struct NoTranscripts;
    impl TranscriptSource for NoTranscripts {
        fn fetch(&self, _: &str) -> Result<Option<Transcript>, ProviderError> {
            Ok(None)
        }
    }

    struct NoSummaries;
    impl SummaryEngine for NoSummaries {
        fn summarize(&self, _: &SummaryRequest<'_>) -> Result<String, ProviderError> {
            Err(ProviderError::Config("unused in this test".into()))
        }
    }

    struct NoMail;
    impl Mailer for NoMail {
        fn deliver(&self, _: &VideoRow, _: &str, _: &str) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn idle_orchestrator(dir: &tempfile::TempDir) -> Arc<Orchestrator> {
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        Arc::new(Orchestrator::with_components(
            db,
            crate::lock::InstanceLock::new(dir.path(), "tubesum"),
            crate::heartbeat::Heartbeat::new(dir.path()),
            Box::new(IdleDirectory),
            Box::new(NoTranscripts),
            Box::new(NoSummaries),
            Some(Box::new(NoMail)),
            RateLimiter::none(),
        ))
    }

    #[test]
    fn test_scheduler_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = SweepScheduler::new(idle_orchestrator(&dir));

        let (trigger_tx, trigger_rx) = broadcast::channel(16);
        let handle = scheduler.start(trigger_rx);

        // Let the first sweep run, then stop.
        std::thread::sleep(Duration::from_millis(100));
        scheduler.stop();

        // Send a trigger to wake up the select loop so it sees the shutdown.
        let _ = trigger_tx.send(());

        // Should join within a reasonable time.
        handle.join().expect("scheduler thread panicked");
    }

    #[test]
    fn test_trigger_causes_extra_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = idle_orchestrator(&dir);
        // A long interval, so only triggers cause additional sweeps.
        crate::db::settings_repo::set(orchestrator.db(), "CHECK_INTERVAL_MINUTES", "120").unwrap();

        let scheduler = SweepScheduler::new(Arc::clone(&orchestrator));
        let (trigger_tx, trigger_rx) = broadcast::channel(16);
        let handle = scheduler.start(trigger_rx);

        std::thread::sleep(Duration::from_millis(100));
        let _ = trigger_tx.send(());
        std::thread::sleep(Duration::from_millis(100));

        scheduler.stop();
        let _ = trigger_tx.send(());
        handle.join().expect("scheduler thread panicked");

        // The heartbeat file proves at least one sweep ran.
        assert!(dir
            .path()
            .join(crate::heartbeat::HEARTBEAT_FILE_NAME)
            .exists());
    }
}
