//! Narrative summaries from an OpenAI-compatible chat completions API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SummaryConfig;
use crate::metrics::Metrics;

/// Shown in place of the summary whenever generation fails.
pub const SUMMARY_FALLBACK: &str = "An error occurred while generating the summary.";

const SYSTEM_PROMPT: &str = "You are a stock performance consultant. You give measured, \
general commentary on how a company's stock has performed and what investors usually watch for.";

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("summary request timed out")]
    Timeout,
    #[error("summary quota or rate limit exceeded")]
    Quota,
    #[error("summary service rejected the API key")]
    Authentication,
    #[error("summary service returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("summary request failed: {0}")]
    Transport(String),
    #[error("malformed summary response: {0}")]
    Malformed(String),
}

impl SummaryError {
    /// Short label used for logs and the failure metric.
    pub fn cause(&self) -> &'static str {
        match self {
            SummaryError::Timeout => "timeout",
            SummaryError::Quota => "quota",
            SummaryError::Authentication => "authentication",
            SummaryError::Upstream { .. } => "upstream",
            SummaryError::Transport(_) => "transport",
            SummaryError::Malformed(_) => "malformed",
        }
    }
}

impl From<reqwest::Error> for SummaryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SummaryError::Timeout
        } else if e.is_decode() {
            SummaryError::Malformed(e.to_string())
        } else {
            SummaryError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

/// The two-message prompt sent for `ticker`.
pub fn build_messages(ticker: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::new("system", SYSTEM_PROMPT),
        ChatMessage::new(
            "user",
            format!(
                "Give general, non-real-time commentary on the stock performance of {ticker}. \
                 You do not need current market data. Finish with a summary of exactly 3 bullet points."
            ),
        ),
    ]
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, ticker: &str) -> Result<String, SummaryError>;
}

pub struct OpenAiSummarizer {
    http: reqwest::Client,
    config: SummaryConfig,
}

impl OpenAiSummarizer {
    pub fn new(config: SummaryConfig) -> Result<Self, SummaryError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SummaryError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, ticker: &str) -> Result<String, SummaryError> {
        let messages = build_messages(ticker);
        let request = ChatRequest {
            model: &self.config.model,
            messages: &messages,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(SummaryError::Quota);
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(SummaryError::Authentication);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummaryError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| SummaryError::Malformed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| SummaryError::Malformed("response has no message content".to_string()))?;

        debug!(ticker = %ticker, chars = content.len(), "Summary generated");
        Ok(content)
    }
}

/// Generated summary for `ticker`, or [`SUMMARY_FALLBACK`] when the call
/// fails for any reason.
pub async fn summary_or_fallback(
    summarizer: &dyn Summarizer,
    ticker: &str,
    metrics: Option<&Metrics>,
) -> String {
    match summarizer.summarize(ticker).await {
        Ok(text) => text,
        Err(e) => {
            match &e {
                SummaryError::Timeout => warn!(ticker = %ticker, "Summary request timed out"),
                SummaryError::Quota => warn!(ticker = %ticker, "Summary quota exhausted"),
                SummaryError::Authentication => {
                    warn!(ticker = %ticker, "Summary service rejected credentials")
                }
                SummaryError::Upstream { status, .. } => {
                    warn!(ticker = %ticker, status = *status, error = %e, "Summary service error")
                }
                SummaryError::Transport(_) => {
                    warn!(ticker = %ticker, error = %e, "Summary transport failure")
                }
                SummaryError::Malformed(_) => {
                    warn!(ticker = %ticker, error = %e, "Malformed summary response")
                }
            }
            if let Some(metrics) = metrics {
                metrics
                    .summary_failures_total
                    .with_label_values(&[e.cause()])
                    .inc();
            }
            SUMMARY_FALLBACK.to_string()
        }
    }
}
