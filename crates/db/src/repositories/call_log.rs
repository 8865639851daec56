use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use linehaul_core::domain::account::AccountId;
use linehaul_core::domain::call::{CallDirection, CallLog, CallLogId, CallOutcome};

use super::{CallLogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCallLogRepository {
    pool: DbPool,
}

impl SqlCallLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CallLogRepository for SqlCallLogRepository {
    async fn upsert(&self, call: CallLog) -> Result<CallLogId, RepositoryError> {
        let existing = sqlx::query_scalar::<_, String>(
            "SELECT id FROM call_log WHERE conversation_id = ?",
        )
        .bind(&call.conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        let now = Utc::now().to_rfc3339();

        if let Some(id) = existing {
            sqlx::query(
                "UPDATE call_log SET
                    account_id = ?,
                    agent_id = ?,
                    call_sid = ?,
                    direction = ?,
                    caller_phone = ?,
                    receiver_phone = ?,
                    transcript = ?,
                    summary = ?,
                    recording_url = ?,
                    started_at = ?,
                    ended_at = ?,
                    duration_secs = ?,
                    outcome = ?,
                    cost = ?,
                    estimated_cost = ?,
                    llm_cost = ?,
                    ended_reason = ?,
                    status = ?,
                    raw_metadata_json = ?,
                    updated_at = ?
                 WHERE id = ?",
            )
            .bind(&call.account_id.0)
            .bind(&call.agent_id)
            .bind(call.call_sid.as_deref())
            .bind(call.direction.as_str())
            .bind(call.caller_phone.as_deref())
            .bind(call.receiver_phone.as_deref())
            .bind(call.transcript.as_deref())
            .bind(call.summary.as_deref())
            .bind(call.recording_url.as_deref())
            .bind(call.started_at.map(|value| value.to_rfc3339()))
            .bind(call.ended_at.map(|value| value.to_rfc3339()))
            .bind(call.duration_secs)
            .bind(call.outcome.as_str())
            .bind(call.cost.to_string())
            .bind(call.estimated_cost.to_string())
            .bind(call.llm_cost.to_string())
            .bind(call.ended_reason.as_deref())
            .bind(&call.status)
            .bind(call.raw_metadata.to_string())
            .bind(&now)
            .bind(&id)
            .execute(&self.pool)
            .await?;

            return Ok(CallLogId(id));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO call_log (
                id, account_id, conversation_id, agent_id, call_sid, direction,
                caller_phone, receiver_phone, transcript, summary, recording_url,
                started_at, ended_at, duration_secs, outcome, cost, estimated_cost,
                llm_cost, ended_reason, status, raw_metadata_json, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&call.account_id.0)
        .bind(&call.conversation_id)
        .bind(&call.agent_id)
        .bind(call.call_sid.as_deref())
        .bind(call.direction.as_str())
        .bind(call.caller_phone.as_deref())
        .bind(call.receiver_phone.as_deref())
        .bind(call.transcript.as_deref())
        .bind(call.summary.as_deref())
        .bind(call.recording_url.as_deref())
        .bind(call.started_at.map(|value| value.to_rfc3339()))
        .bind(call.ended_at.map(|value| value.to_rfc3339()))
        .bind(call.duration_secs)
        .bind(call.outcome.as_str())
        .bind(call.cost.to_string())
        .bind(call.estimated_cost.to_string())
        .bind(call.llm_cost.to_string())
        .bind(call.ended_reason.as_deref())
        .bind(&call.status)
        .bind(call.raw_metadata.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(CallLogId(id))
    }

    async fn find_by_conversation_id(
        &self,
        conversation_id: &str,
    ) -> Result<Option<(CallLogId, CallLog)>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id, account_id, conversation_id, agent_id, call_sid, direction,
                caller_phone, receiver_phone, transcript, summary, recording_url,
                started_at, ended_at, duration_secs, outcome, cost, estimated_cost,
                llm_cost, ended_reason, status, raw_metadata_json
             FROM call_log
             WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(call_from_row).transpose()
    }

    async fn existing_conversation_ids(
        &self,
        agent_id: &str,
    ) -> Result<HashSet<String>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT conversation_id FROM call_log WHERE agent_id = ?",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }
}

fn call_from_row(row: SqliteRow) -> Result<(CallLogId, CallLog), RepositoryError> {
    let direction_raw = row.try_get::<String, _>("direction")?;
    let direction = CallDirection::parse(&direction_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown call direction `{direction_raw}`"))
    })?;

    let outcome_raw = row.try_get::<String, _>("outcome")?;
    let outcome = CallOutcome::parse(&outcome_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown call outcome `{outcome_raw}`")))?;

    let raw_metadata_json = row.try_get::<String, _>("raw_metadata_json")?;
    let raw_metadata = serde_json::from_str(&raw_metadata_json).map_err(|error| {
        RepositoryError::Decode(format!("invalid raw_metadata_json: {error}"))
    })?;

    let call = CallLog {
        account_id: AccountId(row.try_get("account_id")?),
        conversation_id: row.try_get("conversation_id")?,
        agent_id: row.try_get("agent_id")?,
        call_sid: row.try_get("call_sid")?,
        direction,
        caller_phone: row.try_get("caller_phone")?,
        receiver_phone: row.try_get("receiver_phone")?,
        transcript: row.try_get("transcript")?,
        summary: row.try_get("summary")?,
        recording_url: row.try_get("recording_url")?,
        started_at: parse_optional_timestamp("started_at", row.try_get("started_at")?)?,
        ended_at: parse_optional_timestamp("ended_at", row.try_get("ended_at")?)?,
        duration_secs: row.try_get("duration_secs")?,
        outcome,
        cost: parse_decimal("cost", &row.try_get::<String, _>("cost")?)?,
        estimated_cost: parse_decimal(
            "estimated_cost",
            &row.try_get::<String, _>("estimated_cost")?,
        )?,
        llm_cost: parse_decimal("llm_cost", &row.try_get::<String, _>("llm_cost")?)?,
        ended_reason: row.try_get("ended_reason")?,
        status: row.try_get("status")?,
        raw_metadata,
    };

    Ok((CallLogId(row.try_get("id")?), call))
}

fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value
        .map(|timestamp| {
            DateTime::parse_from_rfc3339(&timestamp)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|error| {
                    RepositoryError::Decode(format!(
                        "invalid timestamp in `{column}`: `{timestamp}` ({error})"
                    ))
                })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;

    use linehaul_core::domain::account::AccountId;
    use linehaul_core::domain::call::{CallDirection, CallLog, CallOutcome};

    use super::SqlCallLogRepository;
    use crate::repositories::CallLogRepository;
    use crate::seed::insert_account;
    use crate::{connect_ephemeral, migrations, DbPool};

    #[tokio::test]
    async fn upsert_inserts_then_updates_in_place() {
        let pool = setup_pool().await;
        let repo = SqlCallLogRepository::new(pool.clone());

        let call = sample_call("conv_001");
        let first_id = repo.upsert(call.clone()).await.expect("insert call");

        let mut updated = call.clone();
        updated.transcript = Some("carrier: I'll take it.".to_string());
        updated.outcome = CallOutcome::Confirmed;
        let second_id = repo.upsert(updated.clone()).await.expect("update call");

        assert_eq!(first_id, second_id, "upsert must reuse the existing row id");

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM call_log WHERE conversation_id = 'conv_001'",
        )
        .fetch_one(&pool)
        .await
        .expect("count rows");
        assert_eq!(count, 1);

        let (found_id, found) = repo
            .find_by_conversation_id("conv_001")
            .await
            .expect("find call")
            .expect("row exists");
        assert_eq!(found_id, first_id);
        assert_eq!(found.transcript.as_deref(), Some("carrier: I'll take it."));
        assert_eq!(found.outcome, CallOutcome::Confirmed);

        pool.close().await;
    }

    #[tokio::test]
    async fn round_trips_all_columns() {
        let pool = setup_pool().await;
        let repo = SqlCallLogRepository::new(pool.clone());

        let call = sample_call("conv_round");
        repo.upsert(call.clone()).await.expect("insert call");

        let (_, found) = repo
            .find_by_conversation_id("conv_round")
            .await
            .expect("find call")
            .expect("row exists");
        assert_eq!(found, call);

        pool.close().await;
    }

    #[tokio::test]
    async fn existing_conversation_ids_is_scoped_to_agent() {
        let pool = setup_pool().await;
        let repo = SqlCallLogRepository::new(pool.clone());

        repo.upsert(sample_call("conv_a")).await.expect("insert a");
        repo.upsert(sample_call("conv_b")).await.expect("insert b");
        let mut other_agent = sample_call("conv_c");
        other_agent.agent_id = "agent_other".to_string();
        repo.upsert(other_agent).await.expect("insert c");

        let ids = repo.existing_conversation_ids("agent_test1").await.expect("list ids");
        assert!(ids.contains("conv_a"));
        assert!(ids.contains("conv_b"));
        assert!(!ids.contains("conv_c"));

        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_ephemeral().await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        insert_account(&pool, "acct-1", "Test Desk", "2026-01-01T00:00:00Z")
            .await
            .expect("seed account");
        pool
    }

    fn sample_call(conversation_id: &str) -> CallLog {
        CallLog {
            account_id: AccountId("acct-1".to_string()),
            conversation_id: conversation_id.to_string(),
            agent_id: "agent_test1".to_string(),
            call_sid: Some("CA-100".to_string()),
            direction: CallDirection::Inbound,
            caller_phone: Some("555-123-4567".to_string()),
            receiver_phone: Some("555-999-0000".to_string()),
            transcript: Some("carrier: checking on load 4521".to_string()),
            summary: Some("Carrier asked about load 4521.".to_string()),
            recording_url: None,
            started_at: Some(parse_ts("2026-03-01T15:00:00Z")),
            ended_at: Some(parse_ts("2026-03-01T15:02:30Z")),
            duration_secs: 150,
            outcome: CallOutcome::Completed,
            cost: Decimal::new(42, 2),
            estimated_cost: Decimal::new(25, 2),
            llm_cost: Decimal::new(75, 3),
            ended_reason: Some("customer_ended_call".to_string()),
            status: "done".to_string(),
            raw_metadata: json!({"phone_call": {"external_number": "+15551234567"}}),
        }
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }
}
