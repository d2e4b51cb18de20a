//! Summary delivery over SMTP via `lettre` with STARTTLS.

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::db::video_repo::VideoRow;
use crate::validators::is_valid_email;

use super::{Mailer, ProviderError};

#[derive(Debug)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    /// Builds a mailer from SMTP settings. Addresses are validated up
    /// front so misconfiguration fails at startup, not mid-sweep.
    pub fn new(
        smtp_host: &str,
        smtp_user: &str,
        smtp_pass: &str,
        target_email: &str,
    ) -> Result<Self, ProviderError> {
        if !is_valid_email(smtp_user) {
            return Err(ProviderError::Config(format!(
                "invalid SMTP_USER address: {}",
                smtp_user
            )));
        }
        if !is_valid_email(target_email) {
            return Err(ProviderError::Config(format!(
                "invalid TARGET_EMAIL address: {}",
                target_email
            )));
        }

        let from: Mailbox = smtp_user
            .parse()
            .map_err(|e: lettre::address::AddressError| ProviderError::Config(e.to_string()))?;
        let to: Mailbox = target_email
            .parse()
            .map_err(|e: lettre::address::AddressError| ProviderError::Config(e.to_string()))?;

        let transport = SmtpTransport::starttls_relay(smtp_host)
            .map_err(|e| ProviderError::Config(e.to_string()))?
            .credentials(Credentials::new(
                smtp_user.to_string(),
                smtp_pass.to_string(),
            ))
            .build();

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

fn format_subject(title: &str, channel_name: &str) -> String {
    format!("[{}] {}", channel_name, title)
}

fn format_body(video: &VideoRow, summary: &str, channel_name: &str) -> String {
    let duration = video
        .duration_seconds
        .map(|total| {
            let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
            if hours > 0 {
                format!("{}:{:02}:{:02}", hours, minutes, seconds)
            } else {
                format!("{}:{:02}", minutes, seconds)
            }
        })
        .unwrap_or_else(|| "Unknown".to_string());

    format!(
        "{title}\n{channel} \u{2022} {duration}\nhttps://www.youtube.com/watch?v={id}\n\n{summary}\n",
        title = video.title,
        channel = channel_name,
        duration = duration,
        id = video.id,
        summary = summary,
    )
}

impl Mailer for SmtpMailer {
    fn deliver(
        &self,
        video: &VideoRow,
        summary: &str,
        channel_name: &str,
    ) -> Result<(), ProviderError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(format_subject(&video.title, channel_name))
            .body(format_body(video, summary, channel_name))
            .map_err(|e| ProviderError::Smtp(e.to_string()))?;

        self.transport
            .send(&email)
            .map_err(|e| ProviderError::Smtp(e.to_string()))?;

        tracing::info!(video_id = %video.id, "summary email delivered");
        Ok(())
    }
}
