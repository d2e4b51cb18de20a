//! Summary generation via the OpenAI chat completions API.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use super::{ProviderError, SummaryEngine, SummaryRequest};

const HTTP_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Transcripts are cut here before prompting to stay inside context
/// limits; roughly 12k tokens of text.
const MAX_TRANSCRIPT_CHARS: usize = 48_000;

#[derive(Debug)]
pub struct OpenAiSummarizer {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiSummarizer {
    pub fn new(api_key: &str, model: &str) -> Result<Self, ProviderError> {
        if api_key.is_empty() {
            return Err(ProviderError::Config("OPENAI_API_KEY is not set".into()));
        }
        Ok(Self {
            http: reqwest::blocking::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Overrides the API base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

/// Fills the prompt template. The transcript is truncated on a char
/// boundary before substitution.
fn render_prompt(request: &SummaryRequest<'_>) -> String {
    request
        .prompt_template
        .replace("{title}", request.title)
        .replace("{channel}", request.channel_name)
        .replace("{duration}", request.duration_label)
        .replace("{transcript}", &truncate_chars(request.transcript, MAX_TRANSCRIPT_CHARS))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl SummaryEngine for OpenAiSummarizer {
    fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String, ProviderError> {
        let prompt = render_prompt(request);

        let mut body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(ProviderError::Parse(format!(
                "completion request returned {}: {}",
                status,
                truncate_chars(detail.trim(), 300)
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .map_err(|e| ProviderError::Parse(format!("completion JSON: {}", e)))?;

        let summary = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if summary.is_empty() {
            return Err(ProviderError::Parse("empty completion".into()));
        }

        Ok(summary)
    }
}
