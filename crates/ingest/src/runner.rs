//! Sequential backfill orchestration: fetch, normalize, upsert, classify,
//! and gate leads, one conversation at a time.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use linehaul_core::domain::account::AccountId;
use linehaul_core::errors::{validate_agent_id, DomainError};
use linehaul_core::intent::IntentClassifier;

use linehaul_db::repositories::{
    AccountRepository, CallLogRepository, LeadRepository, LoadRepository, RepositoryError,
};

use crate::client::{with_retry, ApiError, Pacing, RetryPolicy, VoiceApi};
use crate::leads::{LeadOutcome, LeadWriter, SkipReason};
use crate::normalize::normalize_conversation;
use crate::paginator::{BackfillMode, Paginator};

/// Errors that abort a run before any conversation is processed. Per-item
/// failures are captured in the report instead.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("no account available to own the backfill")]
    NoAccount,
    #[error("failed to list conversations: {0}")]
    Listing(#[source] ApiError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone, Debug)]
pub struct BackfillRequest {
    pub agent_id: String,
    pub account_id: Option<AccountId>,
    pub mode: BackfillMode,
    pub max_pages: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct BackfillItem {
    pub conversation_id: String,
    pub status: String,
    pub duration_secs: i64,
    pub lead_created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BackfillReport {
    pub conversations_fetched: u64,
    pub calls_upserted: u64,
    pub leads_created: u64,
    pub leads_skipped_existing: u64,
    pub errors: u64,
    pub items: Vec<BackfillItem>,
}

pub struct BackfillRunner {
    api: Arc<dyn VoiceApi>,
    accounts: Arc<dyn AccountRepository>,
    call_logs: Arc<dyn CallLogRepository>,
    leads: Arc<dyn LeadRepository>,
    loads: Arc<dyn LoadRepository>,
    classifier: IntentClassifier,
    pacing: Arc<dyn Pacing>,
    retry: RetryPolicy,
    page_size: u32,
    item_pacing: Duration,
}

impl BackfillRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn VoiceApi>,
        accounts: Arc<dyn AccountRepository>,
        call_logs: Arc<dyn CallLogRepository>,
        leads: Arc<dyn LeadRepository>,
        loads: Arc<dyn LoadRepository>,
        classifier: IntentClassifier,
        pacing: Arc<dyn Pacing>,
        retry: RetryPolicy,
        page_size: u32,
        item_pacing: Duration,
    ) -> Self {
        Self {
            api,
            accounts,
            call_logs,
            leads,
            loads,
            classifier,
            pacing,
            retry,
            page_size,
            item_pacing,
        }
    }

    pub async fn run(&self, request: BackfillRequest) -> Result<BackfillReport, RunnerError> {
        validate_agent_id(&request.agent_id)?;

        let account_id = match request.account_id.clone() {
            Some(id) => id,
            None => self.accounts.any_account_id().await?.ok_or(RunnerError::NoAccount)?,
        };

        let existing_calls = self.call_logs.existing_conversation_ids(&request.agent_id).await?;
        let seen_leads = self.leads.conversation_ids_with_leads().await?;
        let load_references = self.loads.list_reference_numbers(&account_id).await?;

        let paginator =
            Paginator::new(self.api.clone(), self.retry.clone(), self.pacing.clone());
        let summaries = paginator
            .collect(
                &request.agent_id,
                self.page_size,
                request.max_pages,
                &request.mode,
                &existing_calls,
            )
            .await
            .map_err(RunnerError::Listing)?;

        info!(
            event_name = "ingest.backfill.started",
            agent_id = %request.agent_id,
            account_id = %account_id.0,
            mode = request.mode.as_str(),
            conversations = summaries.len(),
            "starting backfill run"
        );

        let mut writer = LeadWriter::new(self.leads.clone(), seen_leads, load_references);
        let mut report = BackfillReport {
            conversations_fetched: summaries.len() as u64,
            ..Default::default()
        };

        for (index, summary) in summaries.iter().enumerate() {
            if index > 0 {
                self.pacing.sleep(self.item_pacing).await;
            }

            match self.process_one(summary, &account_id, &mut writer, &mut report).await {
                Ok(item) => {
                    if item.lead_created {
                        report.leads_created += 1;
                    }
                    if item.skip_reason.as_deref() == Some(SkipReason::LeadExists.as_str()) {
                        report.leads_skipped_existing += 1;
                    }
                    report.items.push(item);
                }
                Err(error) => {
                    warn!(
                        event_name = "ingest.backfill.item_failed",
                        conversation_id = %summary.conversation_id,
                        error = %error,
                        "conversation failed; continuing run"
                    );
                    report.errors += 1;
                    report.items.push(BackfillItem {
                        conversation_id: summary.conversation_id.clone(),
                        status: "error".to_string(),
                        duration_secs: 0,
                        lead_created: false,
                        intent_score: None,
                        skip_reason: None,
                        error: Some(error),
                    });
                }
            }
        }

        info!(
            event_name = "ingest.backfill.finished",
            agent_id = %request.agent_id,
            conversations_fetched = report.conversations_fetched,
            calls_upserted = report.calls_upserted,
            leads_created = report.leads_created,
            leads_skipped_existing = report.leads_skipped_existing,
            errors = report.errors,
            "backfill run finished"
        );

        Ok(report)
    }

    async fn process_one(
        &self,
        summary: &crate::client::ConversationSummary,
        account_id: &AccountId,
        writer: &mut LeadWriter,
        report: &mut BackfillReport,
    ) -> Result<BackfillItem, String> {
        let detail = with_retry(&self.retry, self.pacing.as_ref(), || {
            self.api.get_conversation(&summary.conversation_id)
        })
        .await
        .map_err(|error| error.to_string())?;

        let call = normalize_conversation(&detail, summary, account_id.clone());
        self.call_logs.upsert(call.clone()).await.map_err(|error| error.to_string())?;
        // Counted here so a later lead failure cannot hide a row that was
        // written.
        report.calls_upserted += 1;

        let analysis = call.transcript.as_deref().map(|text| self.classifier.analyze(text));

        let (lead_created, skip_reason) = match analysis.as_ref() {
            Some(analysis) => {
                match writer.evaluate(&call, analysis).await.map_err(|error| error.to_string())? {
                    LeadOutcome::Created { .. } => (true, None),
                    LeadOutcome::Skipped(reason) => (false, Some(reason.as_str().to_string())),
                }
            }
            None => (false, Some(SkipReason::NoLoadReference.as_str().to_string())),
        };

        Ok(BackfillItem {
            conversation_id: call.conversation_id,
            status: call.status,
            duration_secs: call.duration_secs,
            lead_created,
            intent_score: analysis.map(|analysis| analysis.score),
            skip_reason,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use linehaul_core::domain::account::AccountId;
    use linehaul_core::domain::lead::Lead;
    use linehaul_core::domain::load::LoadId;
    use linehaul_core::intent::{IntentClassifier, IntentClassifierConfig};
    use linehaul_db::repositories::{
        InMemoryAccountRepository, InMemoryCallLogRepository, InMemoryLeadRepository,
        InMemoryLoadRepository, LeadRepository, RepositoryError,
    };

    use crate::client::{
        ApiError, ConversationAnalysis, ConversationDetail, ConversationMetadata,
        ConversationPage, ConversationSummary, NoopPacing, PhoneCallInfo, RetryPolicy,
        TranscriptTurn, VoiceApi,
    };
    use crate::paginator::BackfillMode;

    use super::{BackfillRequest, BackfillRunner, RunnerError};

    /// Serves a fixed set of conversations through both endpoints.
    struct FixtureApi {
        summaries: Vec<ConversationSummary>,
        details: HashMap<String, ConversationDetail>,
    }

    #[async_trait]
    impl VoiceApi for FixtureApi {
        async fn list_conversations(
            &self,
            _agent_id: &str,
            _cursor: Option<&str>,
            _page_size: u32,
        ) -> Result<ConversationPage, ApiError> {
            Ok(ConversationPage {
                conversations: self.summaries.clone(),
                next_cursor: None,
                has_more: false,
            })
        }

        async fn get_conversation(
            &self,
            conversation_id: &str,
        ) -> Result<ConversationDetail, ApiError> {
            self.details.get(conversation_id).cloned().ok_or(ApiError::Status {
                status: 404,
                body: "not found".to_string(),
            })
        }
    }

    fn summary(id: &str) -> ConversationSummary {
        ConversationSummary {
            conversation_id: id.to_string(),
            agent_id: "agent_01".to_string(),
            status: Some("done".to_string()),
            start_time_unix_secs: Some(1_767_225_600),
            end_time_unix_secs: Some(1_767_225_690),
        }
    }

    fn detail(transcript: &str) -> ConversationDetail {
        ConversationDetail {
            transcript: vec![TranscriptTurn {
                role: Some("user".to_string()),
                message: Some(transcript.to_string()),
                time_in_call_secs: Some(3.0),
            }],
            analysis: Some(ConversationAnalysis::default()),
            metadata: Some(ConversationMetadata {
                call_duration_secs: Some(90),
                direction: Some("inbound".to_string()),
                phone_call: Some(PhoneCallInfo {
                    external_number: Some("+15551234567".to_string()),
                    agent_number: Some("+15559990000".to_string()),
                }),
                call_sid: Some("CA-1".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    struct Fixtures {
        accounts: Arc<InMemoryAccountRepository>,
        call_logs: Arc<InMemoryCallLogRepository>,
        leads: Arc<InMemoryLeadRepository>,
        loads: Arc<InMemoryLoadRepository>,
    }

    async fn fixtures() -> Fixtures {
        let accounts = Arc::new(InMemoryAccountRepository::default());
        accounts.push(AccountId("acct-1".to_string())).await;
        let loads = Arc::new(InMemoryLoadRepository::default());
        loads
            .push(AccountId("acct-1".to_string()), LoadId("load-1".to_string()), "4521".to_string())
            .await;
        Fixtures {
            accounts,
            call_logs: Arc::new(InMemoryCallLogRepository::default()),
            leads: Arc::new(InMemoryLeadRepository::default()),
            loads,
        }
    }

    fn runner(api: FixtureApi, fixtures: &Fixtures) -> BackfillRunner {
        BackfillRunner::new(
            Arc::new(api),
            fixtures.accounts.clone(),
            fixtures.call_logs.clone(),
            fixtures.leads.clone(),
            fixtures.loads.clone(),
            IntentClassifier::new(IntentClassifierConfig::default()),
            Arc::new(NoopPacing),
            RetryPolicy::default(),
            30,
            Duration::ZERO,
        )
    }

    fn request(mode: BackfillMode) -> BackfillRequest {
        BackfillRequest {
            agent_id: "agent_01".to_string(),
            account_id: None,
            mode,
            max_pages: 10,
        }
    }

    #[tokio::test]
    async fn booking_transcript_produces_one_lead() {
        let fixtures = fixtures().await;
        let api = FixtureApi {
            summaries: vec![summary("conv_1"), summary("conv_2")],
            details: [
                ("conv_1".to_string(), detail("Yes, I'll take it. Load number 4521 confirmed.")),
                ("conv_2".to_string(), detail("We can do it for $1400, does that work?")),
            ]
            .into_iter()
            .collect(),
        };
        let runner = runner(api, &fixtures);

        let report = runner.run(request(BackfillMode::MissingOnly)).await.expect("run");

        assert_eq!(report.conversations_fetched, 2);
        assert_eq!(report.calls_upserted, 2);
        assert_eq!(report.leads_created, 1);
        assert_eq!(report.errors, 0);
        assert_eq!(report.items.len(), 2);
        assert_eq!(report.items[0].intent_score, Some(65));
        assert!(report.items[0].lead_created);
        assert_eq!(report.items[1].skip_reason.as_deref(), Some("no_load_reference"));

        let leads = fixtures.leads.all().await;
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].load_id, Some(LoadId("load-1".to_string())));
    }

    #[tokio::test]
    async fn second_run_skips_processed_conversations() {
        let fixtures = fixtures().await;
        let make_api = || FixtureApi {
            summaries: vec![summary("conv_1")],
            details: [(
                "conv_1".to_string(),
                detail("Yes, I'll take it. Load number 4521 confirmed."),
            )]
            .into_iter()
            .collect(),
        };

        let first = runner(make_api(), &fixtures)
            .run(request(BackfillMode::MissingOnly))
            .await
            .expect("first run");
        assert_eq!(first.leads_created, 1);

        let second = runner(make_api(), &fixtures)
            .run(request(BackfillMode::MissingOnly))
            .await
            .expect("second run");
        assert_eq!(second.conversations_fetched, 0);
        assert_eq!(second.calls_upserted, 0);

        assert_eq!(fixtures.call_logs.len().await, 1);
        assert_eq!(fixtures.leads.all().await.len(), 1);
    }

    #[tokio::test]
    async fn all_mode_reupserts_but_never_double_creates_leads() {
        let fixtures = fixtures().await;
        let make_api = || FixtureApi {
            summaries: vec![summary("conv_1"), summary("conv_1")],
            details: [(
                "conv_1".to_string(),
                detail("Yes, I'll take it. Load number 4521 confirmed."),
            )]
            .into_iter()
            .collect(),
        };

        let report = runner(make_api(), &fixtures)
            .run(request(BackfillMode::All))
            .await
            .expect("run");

        assert_eq!(report.calls_upserted, 2);
        assert_eq!(report.leads_created, 1);
        assert_eq!(report.leads_skipped_existing, 1);
        assert_eq!(fixtures.call_logs.len().await, 1);
        assert_eq!(fixtures.leads.all().await.len(), 1);
    }

    #[tokio::test]
    async fn persisted_lead_blocks_duplicates_across_runs() {
        let fixtures = fixtures().await;
        let make_api = || FixtureApi {
            summaries: vec![summary("conv_1")],
            details: [(
                "conv_1".to_string(),
                detail("Yes, I'll take it. Load number 4521 confirmed."),
            )]
            .into_iter()
            .collect(),
        };

        let first = runner(make_api(), &fixtures)
            .run(request(BackfillMode::All))
            .await
            .expect("first run");
        assert_eq!(first.leads_created, 1);

        // A fresh runner seeds its dedup set from the lead table, so the
        // reprocessed conversation is skipped rather than duplicated.
        let second = runner(make_api(), &fixtures)
            .run(request(BackfillMode::All))
            .await
            .expect("second run");

        assert_eq!(second.calls_upserted, 1);
        assert_eq!(second.leads_created, 0);
        assert_eq!(second.leads_skipped_existing, 1);
        assert_eq!(second.items[0].skip_reason.as_deref(), Some("lead_exists"));
        assert_eq!(fixtures.leads.all().await.len(), 1);
    }

    /// Accepts membership reads but rejects every write, like a constraint
    /// violation would.
    struct RejectingLeadRepository;

    #[async_trait]
    impl LeadRepository for RejectingLeadRepository {
        async fn insert(&self, _lead: Lead) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("lead insert rejected".to_string()))
        }

        async fn conversation_ids_with_leads(&self) -> Result<HashSet<String>, RepositoryError> {
            Ok(HashSet::new())
        }
    }

    #[tokio::test]
    async fn lead_failure_after_upsert_still_counts_the_upsert() {
        let fixtures = fixtures().await;
        let api = FixtureApi {
            summaries: vec![summary("conv_1")],
            details: [(
                "conv_1".to_string(),
                detail("Yes, I'll take it. Load number 4521 confirmed."),
            )]
            .into_iter()
            .collect(),
        };
        let runner = BackfillRunner::new(
            Arc::new(api),
            fixtures.accounts.clone(),
            fixtures.call_logs.clone(),
            Arc::new(RejectingLeadRepository),
            fixtures.loads.clone(),
            IntentClassifier::new(IntentClassifierConfig::default()),
            Arc::new(NoopPacing),
            RetryPolicy::default(),
            30,
            Duration::ZERO,
        );

        let report = runner.run(request(BackfillMode::MissingOnly)).await.expect("run");

        assert_eq!(report.calls_upserted, 1, "the call row was written before the lead failed");
        assert_eq!(report.errors, 1);
        assert_eq!(report.leads_created, 0);
        assert_eq!(report.items[0].status, "error");
        assert!(report.items[0].error.as_deref().is_some_and(|e| e.contains("rejected")));
        assert_eq!(fixtures.call_logs.len().await, 1);
    }

    #[tokio::test]
    async fn item_failure_is_recorded_without_aborting() {
        let fixtures = fixtures().await;
        let api = FixtureApi {
            summaries: vec![summary("conv_missing"), summary("conv_2")],
            details: [("conv_2".to_string(), detail("Just checking rates today."))]
                .into_iter()
                .collect(),
        };
        let runner = runner(api, &fixtures);

        let report = runner.run(request(BackfillMode::MissingOnly)).await.expect("run");

        assert_eq!(report.errors, 1);
        assert_eq!(report.calls_upserted, 1);
        assert_eq!(report.items[0].status, "error");
        assert!(report.items[0].error.as_deref().is_some_and(|e| e.contains("404")));
        assert_eq!(report.items[1].status, "done");
    }

    #[tokio::test]
    async fn malformed_agent_id_aborts_before_processing() {
        let fixtures = fixtures().await;
        let api = FixtureApi { summaries: vec![], details: HashMap::new() };
        let runner = runner(api, &fixtures);

        let result = runner
            .run(BackfillRequest {
                agent_id: "bad agent id!".to_string(),
                account_id: None,
                mode: BackfillMode::MissingOnly,
                max_pages: 10,
            })
            .await;

        assert!(matches!(result, Err(RunnerError::Domain(_))));
    }

    #[tokio::test]
    async fn missing_account_is_fatal() {
        let fixtures = fixtures().await;
        let empty_accounts = Arc::new(InMemoryAccountRepository::default());
        let api = FixtureApi { summaries: vec![], details: HashMap::new() };
        let runner = BackfillRunner::new(
            Arc::new(api),
            empty_accounts,
            fixtures.call_logs.clone(),
            fixtures.leads.clone(),
            fixtures.loads.clone(),
            IntentClassifier::new(IntentClassifierConfig::default()),
            Arc::new(NoopPacing),
            RetryPolicy::default(),
            30,
            Duration::ZERO,
        );

        let result = runner.run(request(BackfillMode::MissingOnly)).await;
        assert!(matches!(result, Err(RunnerError::NoAccount)));
    }

    #[tokio::test]
    async fn single_id_mode_processes_exactly_one() {
        let fixtures = fixtures().await;
        let api = FixtureApi {
            summaries: vec![summary("conv_1"), summary("conv_2")],
            details: [(
                "conv_42".to_string(),
                detail("Yes, I'll take it. Load number 4521 confirmed."),
            )]
            .into_iter()
            .collect(),
        };
        let runner = runner(api, &fixtures);

        let report = runner
            .run(request(BackfillMode::ConversationId("conv_42".to_string())))
            .await
            .expect("run");

        assert_eq!(report.conversations_fetched, 1);
        assert_eq!(report.calls_upserted, 1);
        assert_eq!(report.items[0].conversation_id, "conv_42");
    }

    // Keeps the wire decode honest against a realistic payload shape.
    #[test]
    fn detail_decodes_from_upstream_json() {
        let payload = json!({
            "conversation_id": "conv_1",
            "agent_id": "agent_01",
            "status": "done",
            "transcript": [
                { "role": "agent", "message": "Hi, this is dispatch.", "time_in_call_secs": 0.5 },
                { "role": "user", "message": "I'll take load 4521.", "time_in_call_secs": 4.0 }
            ],
            "analysis": {
                "transcript_summary": "Carrier accepted load 4521.",
                "call_successful": "success",
                "data_collection_results": {
                    "confirmed": { "value": true }
                }
            },
            "metadata": {
                "start_time_unix_secs": 1767225600,
                "call_duration_secs": 90,
                "cost": 450,
                "direction": "inbound",
                "phone_call": { "external_number": "+15551234567", "agent_number": "+15559990000" },
                "connection": { "duration_secs": 88 },
                "call_sid": "CA-1",
                "batch_id": "batch-7"
            },
            "has_audio": true
        });

        let detail: ConversationDetail =
            serde_json::from_value(payload).expect("detail decodes");
        assert_eq!(detail.transcript.len(), 2);
        let metadata = detail.metadata.expect("metadata present");
        assert_eq!(metadata.cost, Some(450));
        assert_eq!(metadata.extra.get("batch_id"), Some(&json!("batch-7")));
    }
}
