use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use secrecy::SecretString;

use linehaul_core::config::{AppConfig, LoadOptions};
use linehaul_core::domain::account::AccountId;
use linehaul_core::intent::{IntentClassifier, IntentClassifierConfig};
use linehaul_db::repositories::{
    SqlAccountRepository, SqlCallLogRepository, SqlLeadRepository, SqlLoadRepository,
};
use linehaul_ingest::client::{HttpVoiceApi, RetryPolicy, TokioPacing};
use linehaul_ingest::runner::{BackfillRequest, BackfillRunner};
use linehaul_ingest::BackfillMode;
use linehaul_db::connect;
use serde_json::json;

use crate::commands::CommandResult;

#[derive(Debug, Clone)]
pub struct BackfillArgs {
    pub mode: String,
    pub agent_id: Option<String>,
    pub account_id: Option<String>,
    pub conversation_id: Option<String>,
    pub start_unix: Option<i64>,
    pub end_unix: Option<i64>,
    pub max_pages: u32,
}

pub fn run(args: BackfillArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "backfill",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let Some(api_key) = config.voice_api_key().map(str::to_string) else {
        return CommandResult::failure(
            "backfill",
            "credential",
            "voice api credential is not configured",
            2,
        );
    };

    let agent_id = args
        .agent_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| config.voice.agent_id.clone());
    if agent_id.trim().is_empty() {
        return CommandResult::failure("backfill", "agent_id", "agent id is required", 2);
    }

    let mode = match parse_mode(&args) {
        Ok(mode) => mode,
        Err(message) => return CommandResult::failure("backfill", "mode", message, 2),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "backfill",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let api = Arc::new(HttpVoiceApi::new(
            config.voice.base_url.clone(),
            SecretString::from(api_key),
        ));
        let runner = BackfillRunner::new(
            api,
            Arc::new(SqlAccountRepository::new(pool.clone())),
            Arc::new(SqlCallLogRepository::new(pool.clone())),
            Arc::new(SqlLeadRepository::new(pool.clone())),
            Arc::new(SqlLoadRepository::new(pool.clone())),
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

        let report = runner
            .run(BackfillRequest {
                agent_id: agent_id.clone(),
                account_id: args.account_id.clone().map(AccountId),
                mode,
                max_pages: args.max_pages,
            })
            .await
            .map_err(|error| ("backfill_run", error.to_string(), 6u8))?;

        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(report)
    });

    match result {
        Ok(report) => CommandResult::success_with_details(
            "backfill",
            format!(
                "agent {agent_id}: fetched {}, upserted {}, leads {} (skipped existing {}), errors {}",
                report.conversations_fetched,
                report.calls_upserted,
                report.leads_created,
                report.leads_skipped_existing,
                report.errors
            ),
            json!({
                "conversations_fetched": report.conversations_fetched,
                "calls_upserted": report.calls_upserted,
                "leads_created": report.leads_created,
                "leads_skipped_existing": report.leads_skipped_existing,
                "errors": report.errors,
            }),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("backfill", error_class, message, exit_code)
        }
    }
}

fn parse_mode(args: &BackfillArgs) -> Result<BackfillMode, String> {
    match args.mode.trim().to_ascii_lowercase().as_str() {
        "missing_only" => Ok(BackfillMode::MissingOnly),
        "all" => Ok(BackfillMode::All),
        "conversation_id" => match args.conversation_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(BackfillMode::ConversationId(id.to_string())),
            _ => Err("conversation_id mode requires --conversation-id".to_string()),
        },
        "date_range" => {
            let (Some(start_unix), Some(end_unix)) = (args.start_unix, args.end_unix) else {
                return Err("date_range mode requires --start-unix and --end-unix".to_string());
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

#[cfg(test)]
mod tests {
    use linehaul_ingest::BackfillMode;

    use super::{parse_mode, BackfillArgs};

    fn args(mode: &str) -> BackfillArgs {
        BackfillArgs {
            mode: mode.to_string(),
            agent_id: None,
            account_id: None,
            conversation_id: None,
            start_unix: None,
            end_unix: None,
            max_pages: 50,
        }
    }

    #[test]
    fn mode_parsing_mirrors_the_api_surface() {
        assert_eq!(parse_mode(&args("missing_only")), Ok(BackfillMode::MissingOnly));
        assert_eq!(parse_mode(&args("all")), Ok(BackfillMode::All));
        assert!(parse_mode(&args("conversation_id")).is_err());
        assert!(parse_mode(&args("date_range")).is_err());
        assert!(parse_mode(&args("everything")).is_err());
    }
}
