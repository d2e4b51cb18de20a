//! tubesumd — the periodic summarization daemon.
//!
//! Wires the orchestrator from database-backed settings, runs sweeps on
//! the configured interval and shuts down cleanly on Ctrl-C.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use tubesum::db::{settings_repo, Database};
use tubesum::provider::email::SmtpMailer;
use tubesum::provider::openai::OpenAiSummarizer;
use tubesum::provider::transcript::CascadeExtractor;
use tubesum::provider::ytdlp::YtDlpClient;
use tubesum::provider::ProviderError;
use tubesum::{Orchestrator, SweepScheduler, TubesumError};

fn init_logging() {
    // Route `log` macro output from the library into tracing.
    let _ = tracing_log::LogTracer::init();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// `TUBESUM_DATA_DIR`, or `~/.tubesum/data`, or `./data` as a last resort.
fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TUBESUM_DATA_DIR") {
        return PathBuf::from(dir);
    }
    tubesum::default_database_path()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Builds the orchestrator from settings. Secrets live in the settings
/// table and are configured through the administrative layer.
fn build_orchestrator(db: Database, data_dir: &Path) -> Result<Orchestrator, TubesumError> {
    let openai_key = settings_repo::get(&db, "OPENAI_API_KEY")?.unwrap_or_default();
    let openai_model = settings_repo::get_or(&db, "OPENAI_MODEL", "gpt-4o-mini")?;
    let send_email = settings_repo::get_bool(&db, "SEND_EMAIL_SUMMARIES", true)?;
    let smtp_host = settings_repo::get_or(&db, "SMTP_HOST", "smtp.gmail.com")?;
    let smtp_user = settings_repo::get(&db, "SMTP_USER")?.unwrap_or_default();
    let smtp_pass = settings_repo::get(&db, "SMTP_PASS")?.unwrap_or_default();
    let target_email = settings_repo::get(&db, "TARGET_EMAIL")?.unwrap_or_default();

    let mut missing = Vec::new();
    if openai_key.is_empty() {
        missing.push("OPENAI_API_KEY");
    }
    if send_email {
        if smtp_user.is_empty() {
            missing.push("SMTP_USER");
        }
        if smtp_pass.is_empty() {
            missing.push("SMTP_PASS");
        }
        if target_email.is_empty() {
            missing.push("TARGET_EMAIL");
        }
    }
    if !missing.is_empty() {
        for key in &missing {
            error!("Missing required setting: {}", key);
        }
        error!("Configure the settings listed above and restart");
        return Err(ProviderError::Config(format!(
            "missing required settings: {}",
            missing.join(", ")
        ))
        .into());
    }

    let summarizer = OpenAiSummarizer::new(&openai_key, &openai_model)?;

    let mailer = if send_email {
        Some(Box::new(SmtpMailer::new(
            &smtp_host,
            &smtp_user,
            &smtp_pass,
            &target_email,
        )?) as Box<dyn tubesum::provider::Mailer>)
    } else {
        info!("Email delivery disabled; summaries will be stored only");
        None
    };

    let supadata_key = if settings_repo::get_bool(&db, "ENABLE_SUPADATA_FALLBACK", false)? {
        settings_repo::get(&db, "SUPADATA_API_KEY")?
    } else {
        None
    };
    if supadata_key.is_some() {
        info!("Transcript cascade with Supadata.ai fallback enabled");
    }

    let transcripts = CascadeExtractor::new(db.clone(), supadata_key);

    Ok(Orchestrator::new(
        db,
        data_dir,
        Box::new(YtDlpClient::new()),
        Box::new(transcripts),
        Box::new(summarizer),
        mailer,
    ))
}

fn run() -> Result<(), TubesumError> {
    let data_dir = data_dir();
    info!("Data directory: {}", data_dir.display());

    let db = Database::open(&data_dir.join("tubesum.db"))?;
    let orchestrator = Arc::new(build_orchestrator(db, &data_dir)?);

    let scheduler = Arc::new(SweepScheduler::new(orchestrator));
    let (trigger_tx, trigger_rx) = tokio::sync::broadcast::channel(16);

    {
        let scheduler = Arc::clone(&scheduler);
        let trigger_tx = trigger_tx.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            info!("Shutdown requested");
            scheduler.stop();
            // Wake the scheduler so it notices the shutdown flag.
            let _ = trigger_tx.send(());
        }) {
            error!("Cannot install signal handler: {}", e);
        }
    }

    let handle = scheduler.start(trigger_rx);
    if handle.join().is_err() {
        error!("Scheduler thread panicked");
    }

    info!("tubesum daemon stopped");
    Ok(())
}

fn main() {
    init_logging();
    info!("tubesum daemon starting");

    if let Err(e) = run() {
        error!("Fatal: {}", e);
        std::process::exit(1);
    }
}
