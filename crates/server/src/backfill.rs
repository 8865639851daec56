//! HTTP surface for triggering a backfill run.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use chrono::DateTime;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use linehaul_core::config::AppConfig;
use linehaul_core::domain::account::AccountId;
use linehaul_core::intent::{IntentClassifier, IntentClassifierConfig};
use linehaul_db::repositories::{
    SqlAccountRepository, SqlCallLogRepository, SqlLeadRepository, SqlLoadRepository,
};
use linehaul_db::DbPool;
use linehaul_ingest::client::{HttpVoiceApi, RetryPolicy, TokioPacing};
use linehaul_ingest::runner::{BackfillItem, BackfillRequest, BackfillRunner, RunnerError};
use linehaul_ingest::BackfillMode;

#[derive(Clone)]
pub struct BackfillApiState {
    db_pool: DbPool,
    config: Arc<AppConfig>,
}

pub fn router(db_pool: DbPool, config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/api/v1/backfill", post(run_backfill))
        .with_state(BackfillApiState { db_pool, config })
}

#[derive(Clone, Debug, Deserialize)]
pub struct BackfillRequestBody {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub start_unix: Option<i64>,
    #[serde(default)]
    pub end_unix: Option<i64>,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_mode() -> String {
    "missing_only".to_string()
}

fn default_max_pages() -> u32 {
    50
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BackfillEnvelope {
    pub success: bool,
    pub agent_id: String,
    pub conversations_fetched: u64,
    pub calls_upserted: u64,
    pub leads_created: u64,
    pub leads_skipped_existing: u64,
    pub errors: u64,
    pub items: Vec<BackfillItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackfillEnvelope {
    fn failure(agent_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self { success: false, agent_id: agent_id.into(), error: Some(error.into()), ..Default::default() }
    }
}

pub async fn run_backfill(
    State(state): State<BackfillApiState>,
    Json(body): Json<BackfillRequestBody>,
) -> (StatusCode, Json<BackfillEnvelope>) {
    let config = state.config.as_ref();

    let agent_id = body
        .agent_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| config.voice.agent_id.clone());
    if agent_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(BackfillEnvelope::failure(agent_id, "agent id is required")),
        );
    }

    let Some(api_key) = config.voice_api_key() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(BackfillEnvelope::failure(agent_id, "voice api credential is not configured")),
        );
    };

    let mode = match parse_mode(&body) {
        Ok(mode) => mode,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(BackfillEnvelope::failure(agent_id, message)))
        }
    };

    info!(
        event_name = "api.backfill.requested",
        agent_id = %agent_id,
        mode = mode.as_str(),
        max_pages = body.max_pages,
        "backfill requested"
    );

    let api = Arc::new(HttpVoiceApi::new(
        config.voice.base_url.clone(),
        SecretString::from(api_key.to_string()),
    ));
    let runner = BackfillRunner::new(
        api,
        Arc::new(SqlAccountRepository::new(state.db_pool.clone())),
        Arc::new(SqlCallLogRepository::new(state.db_pool.clone())),
        Arc::new(SqlLeadRepository::new(state.db_pool.clone())),
        Arc::new(SqlLoadRepository::new(state.db_pool.clone())),
        IntentClassifier::new(IntentClassifierConfig::default()),
        Arc::new(TokioPacing),
        RetryPolicy {
            max_attempts: config.voice.max_retries,
            base_delay_ms: config.voice.retry_base_delay_ms,
            max_delay_ms: config.voice.retry_max_delay_ms,
        },
        config.voice.page_size,
        Duration::from_millis(config.voice.pacing_ms),
    );

    let request = BackfillRequest {
        agent_id: agent_id.clone(),
        account_id: body.account_id.clone().map(AccountId),
        mode,
        max_pages: body.max_pages,
    };

    match runner.run(request).await {
        Ok(report) => {
            let envelope = BackfillEnvelope {
                success: true,
                agent_id,
                conversations_fetched: report.conversations_fetched,
                calls_upserted: report.calls_upserted,
                leads_created: report.leads_created,
                leads_skipped_existing: report.leads_skipped_existing,
                errors: report.errors,
                items: report.items,
                error: None,
            };
            (StatusCode::OK, Json(envelope))
        }
        Err(error) => {
            warn!(
                event_name = "api.backfill.failed",
                agent_id = %agent_id,
                error = %error,
                "backfill run aborted"
            );
            let status = match &error {
                RunnerError::Domain(_) | RunnerError::NoAccount => StatusCode::BAD_REQUEST,
                RunnerError::Listing(_) => StatusCode::BAD_GATEWAY,
                RunnerError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(BackfillEnvelope::failure(agent_id, error.to_string())))
        }
    }
}

fn parse_mode(body: &BackfillRequestBody) -> Result<BackfillMode, String> {
    match body.mode.trim().to_ascii_lowercase().as_str() {
        "missing_only" => Ok(BackfillMode::MissingOnly),
        "all" => Ok(BackfillMode::All),
        "conversation_id" => match body.conversation_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(BackfillMode::ConversationId(id.to_string())),
            _ => Err("conversation_id mode requires a conversation_id".to_string()),
        },
        "date_range" => {
            let (Some(start_unix), Some(end_unix)) = (body.start_unix, body.end_unix) else {
                return Err("date_range mode requires start_unix and end_unix".to_string());
            };
            let start = DateTime::from_timestamp(start_unix, 0)
                .ok_or_else(|| format!("start_unix {start_unix} is out of range"))?;
            let end = DateTime::from_timestamp(end_unix, 0)
                .ok_or_else(|| format!("end_unix {end_unix} is out of range"))?;
            if end < start {
                return Err("date_range end precedes start".to_string());
            }
            Ok(BackfillMode::DateRange { start, end })
        }
        other => Err(format!("unsupported mode `{other}`")),
    }
}
