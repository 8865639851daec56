//! Upstream voice-agent API client: wire types, the `VoiceApi` seam, the
//! reqwest-backed implementation, and the retry/pacing policy shared by the
//! paginator and the runner.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// One row from the paginated listing endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_time_unix_secs: Option<i64>,
    #[serde(default)]
    pub end_time_unix_secs: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationPage {
    #[serde(default)]
    pub conversations: Vec<ConversationSummary>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TranscriptTurn {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub time_in_call_secs: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConversationAnalysis {
    #[serde(default)]
    pub transcript_summary: Option<String>,
    #[serde(default)]
    pub call_successful: Option<String>,
    #[serde(default)]
    pub data_collection_results: HashMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PhoneCallInfo {
    #[serde(default)]
    pub external_number: Option<String>,
    #[serde(default)]
    pub agent_number: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(default)]
    pub duration_secs: Option<i64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConversationMetadata {
    #[serde(default)]
    pub start_time_unix_secs: Option<i64>,
    #[serde(default)]
    pub end_time_unix_secs: Option<i64>,
    #[serde(default)]
    pub call_duration_secs: Option<i64>,
    #[serde(default)]
    pub cost: Option<i64>,
    #[serde(default)]
    pub termination_reason: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub external_number: Option<String>,
    #[serde(default)]
    pub agent_number: Option<String>,
    #[serde(default)]
    pub phone_call: Option<PhoneCallInfo>,
    #[serde(default)]
    pub connection: Option<ConnectionInfo>,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub recording_url: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConversationDetail {
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub transcript: Vec<TranscriptTurn>,
    #[serde(default)]
    pub analysis: Option<ConversationAnalysis>,
    #[serde(default)]
    pub metadata: Option<ConversationMetadata>,
    #[serde(default)]
    pub has_audio: bool,
    #[serde(default)]
    pub has_user_audio: bool,
    #[serde(default)]
    pub has_response_audio: bool,
}

impl ConversationDetail {
    /// Transcript turns joined into one searchable text block, one line per
    /// turn with the speaker role as a prefix. Empty messages are dropped.
    pub fn transcript_text(&self) -> String {
        self.transcript
            .iter()
            .filter_map(|turn| {
                let message = turn.message.as_deref()?.trim();
                if message.is_empty() {
                    return None;
                }
                let role = turn.role.as_deref().unwrap_or("unknown");
                Some(format!("{role}: {message}"))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("upstream rate limited (429)")]
    RateLimited,
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

#[async_trait]
pub trait VoiceApi: Send + Sync {
    async fn list_conversations(
        &self,
        agent_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<ConversationPage, ApiError>;

    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationDetail, ApiError>;
}

pub struct HttpVoiceApi {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpVoiceApi {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .get(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ApiError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status: status.as_u16(), body });
        }

        response.json::<T>().await.map_err(|error| ApiError::Decode(error.to_string()))
    }
}

#[async_trait]
impl VoiceApi for HttpVoiceApi {
    async fn list_conversations(
        &self,
        agent_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<ConversationPage, ApiError> {
        let url = format!("{}/v1/convai/conversations", self.base_url);
        let mut query =
            vec![("agent_id", agent_id.to_string()), ("page_size", page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        self.get_json(url, &query).await
    }

    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationDetail, ApiError> {
        let url = format!("{}/v1/convai/conversations/{conversation_id}", self.base_url);
        self.get_json(url, &[]).await
    }
}

/// Injectable sleep seam so retry and pacing behavior is testable without
/// wall-clock delays.
#[async_trait]
pub trait Pacing: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioPacing;

#[async_trait]
impl Pacing for TokioPacing {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

pub struct NoopPacing;

#[async_trait]
impl Pacing for NoopPacing {
    async fn sleep(&self, _duration: Duration) {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 1_000, max_delay_ms: 30_000 }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Runs `op` up to `policy.max_attempts` times, sleeping a doubling backoff
/// between attempts when the error is retryable. Non-retryable errors and the
/// final attempt's error propagate unchanged.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    pacing: &dyn Pacing,
    mut op: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;
    for attempt in 0..attempts {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt, "upstream call succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if error.is_retryable() && attempt + 1 < attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "upstream call rate limited; backing off"
                );
                pacing.sleep(delay).await;
                last_error = Some(error);
            }
            Err(error) => return Err(error),
        }
    }
    // Unreachable unless max_attempts is 0; the loop above runs at least once.
    Err(last_error.unwrap_or(ApiError::RateLimited))
}
