use tracing::{debug, info, info_span, warn};

use crate::db::video_repo::{self, MetadataUpdate, VideoRow, VideoStatus};
use crate::db::{Database, DatabaseError};
use crate::heartbeat::Heartbeat;
use crate::provider::{Mailer, SummaryEngine, SummaryRequest, TranscriptSource, VideoDirectory};
use crate::settings::SweepSettings;

use super::VideoTask;

const NO_TRANSCRIPT_MESSAGE: &str = "Transcript not available for this video";
const EMAIL_FAILED_MESSAGE: &str = "Summary generated but email delivery failed";

/// What one pipeline run produced, for sweep statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Summary stored; email delivered, or delivery disabled.
    Completed { emailed: bool },
    /// Summary stored but delivery failed — a partial success.
    EmailFailed,
    /// No transcript obtainable.
    NoTranscript,
    /// Summary generation failed.
    SummaryFailed,
}

/// Drives one video through the staged state machine. Every transition is
/// committed before the next stage starts, so a crash leaves the video in
/// exactly its last stage for the stuck sweeper to reclaim.
pub struct PipelineRunner<'a> {
    db: Database,
    heartbeat: Heartbeat,
    directory: &'a dyn VideoDirectory,
    transcripts: &'a dyn TranscriptSource,
    summarizer: &'a dyn SummaryEngine,
    mailer: Option<&'a dyn Mailer>,
    settings: &'a SweepSettings,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(
        db: Database,
        heartbeat: Heartbeat,
        directory: &'a dyn VideoDirectory,
        transcripts: &'a dyn TranscriptSource,
        summarizer: &'a dyn SummaryEngine,
        mailer: Option<&'a dyn Mailer>,
        settings: &'a SweepSettings,
    ) -> Self {
        Self {
            db,
            heartbeat,
            directory,
            transcripts,
            summarizer,
            mailer,
            settings,
        }
    }

    /// Runs the full pipeline for one video. Collaborator failures are
    /// persisted as statuses and reported in the outcome; only store
    /// errors propagate.
    pub fn process(&self, task: &VideoTask) -> Result<StageOutcome, DatabaseError> {
        let _span = info_span!("pipeline", video_id = %task.id).entered();
        info!("Processing: {}", task.title);
        self.heartbeat.beat();

        // Step 1: enter fetching_metadata, counting the attempt for
        // already-tracked videos.
        if video_repo::exists(&self.db, &task.id)? {
            video_repo::restart_attempt(&self.db, &task.id)?;
        } else {
            let mut row = VideoRow::new(
                &task.id,
                &task.channel_id,
                task.channel_name.as_deref(),
                &task.title,
            );
            row.status = VideoStatus::FetchingMetadata;
            video_repo::insert(&self.db, &row)?;
        }

        // Step 2: metadata, best-effort.
        let (title, channel_name, duration_label) = self.step_metadata(task);

        // Step 3: transcript.
        video_repo::update_status(&self.db, &task.id, VideoStatus::FetchingTranscript, None)?;
        self.heartbeat.beat();
        let transcript = match self.transcripts.fetch(&task.id) {
            Ok(Some(transcript)) if !transcript.text.trim().is_empty() => transcript,
            Ok(_) => {
                info!("No transcript available for {}", task.id);
                video_repo::update_status(
                    &self.db,
                    &task.id,
                    VideoStatus::FailedTranscript,
                    Some(NO_TRANSCRIPT_MESSAGE),
                )?;
                return Ok(StageOutcome::NoTranscript);
            }
            Err(e) => {
                warn!("Transcript extraction failed for {}: {}", task.id, e);
                video_repo::update_status(
                    &self.db,
                    &task.id,
                    VideoStatus::FailedTranscript,
                    Some(NO_TRANSCRIPT_MESSAGE),
                )?;
                return Ok(StageOutcome::NoTranscript);
            }
        };

        // Step 4: summary.
        video_repo::update_status(&self.db, &task.id, VideoStatus::GeneratingSummary, None)?;
        self.heartbeat.beat();
        let request = SummaryRequest {
            title: &title,
            channel_name: &channel_name,
            duration_label: duration_label.as_deref().unwrap_or("Unknown"),
            transcript: &transcript.text,
            prompt_template: &self.settings.prompt_template,
            max_tokens: self.settings.max_summary_tokens,
        };
        let summary = match self.summarizer.summarize(&request) {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Summary generation failed for {}: {}", task.id, e);
                video_repo::update_status(
                    &self.db,
                    &task.id,
                    VideoStatus::FailedAi,
                    Some(&format!("Failed to generate summary: {}", e)),
                )?;
                return Ok(StageOutcome::SummaryFailed);
            }
        };

        // Step 5: commit the summary before any delivery attempt, so it
        // survives email failures.
        video_repo::store_summary(&self.db, &task.id, &summary, &transcript.method)?;
        info!("Summary generated ({} chars)", summary.chars().count());

        // Step 6: delivery.
        let mailer = match self.mailer {
            Some(mailer) if self.settings.send_email => mailer,
            _ => {
                debug!("Email disabled; summary saved only");
                return Ok(StageOutcome::Completed { emailed: false });
            }
        };

        video_repo::update_status(&self.db, &task.id, VideoStatus::SendingEmail, None)?;
        self.heartbeat.beat();

        let row = video_repo::find_by_id(&self.db, &task.id)?.unwrap_or_else(|| {
            // Row was just written; fall back to the task fields.
            VideoRow::new(
                &task.id,
                &task.channel_id,
                task.channel_name.as_deref(),
                &title,
            )
        });

        match mailer.deliver(&row, &summary, &channel_name) {
            Ok(()) => {
                video_repo::mark_email_sent(&self.db, &task.id)?;
                info!("Email sent for {}", task.id);
                Ok(StageOutcome::Completed { emailed: true })
            }
            Err(e) => {
                warn!("Email delivery failed for {}: {}", task.id, e);
                video_repo::mark_email_failed(&self.db, &task.id, EMAIL_FAILED_MESSAGE)?;
                Ok(StageOutcome::EmailFailed)
            }
        }
    }

    /// Fetches and persists metadata. Failure is non-fatal: the pipeline
    /// proceeds with whatever identifying fields it already has.
    fn step_metadata(&self, task: &VideoTask) -> (String, String, Option<String>) {
        let fallback_channel = task
            .channel_name
            .clone()
            .unwrap_or_else(|| task.channel_id.clone());

        let metadata = match self.directory.fetch_metadata(&task.id) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => {
                debug!("No metadata for {}", task.id);
                return (task.title.clone(), fallback_channel, None);
            }
            Err(e) => {
                warn!("Metadata fetch failed for {}: {}", task.id, e);
                return (task.title.clone(), fallback_channel, None);
            }
        };

        let update = MetadataUpdate {
            title: metadata.title.clone(),
            channel_id: metadata.channel_id.clone(),
            channel_name: metadata.channel_name.clone(),
            duration_seconds: metadata.duration_seconds,
            view_count: metadata.view_count,
            upload_date: metadata.upload_date.clone(),
        };
        if let Err(e) = video_repo::update_metadata(&self.db, &task.id, &update) {
            warn!("Failed to persist metadata for {}: {}", task.id, e);
        }

        let title = metadata.title.clone().unwrap_or_else(|| task.title.clone());
        let channel_name = metadata.channel_name.clone().unwrap_or(fallback_channel);
        (title, channel_name, metadata.duration_label())
    }
}
