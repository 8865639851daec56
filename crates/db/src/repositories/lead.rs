use std::collections::HashSet;

use sqlx::{sqlite::SqliteRow, Row};

use linehaul_core::domain::lead::Lead;

use super::{LeadRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn count_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM lead WHERE source_conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn find_by_conversation_id(
        &self,
        conversation_id: &str,
    ) -> Result<Option<LeadSummaryRow>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, phone, load_id, load_reference, intent_score, needs_review, review_reason, notes
             FROM lead
             WHERE source_conversation_id = ?
             ORDER BY created_at ASC
             LIMIT 1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(summary_from_row).transpose()
    }
}

/// Slim projection used by tests and the review surface; the full lead row
/// is write-only from the pipeline's point of view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeadSummaryRow {
    pub id: String,
    pub phone: String,
    pub load_id: Option<String>,
    pub load_reference: Option<String>,
    pub intent_score: i64,
    pub needs_review: bool,
    pub review_reason: Option<String>,
    pub notes: String,
}

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn insert(&self, lead: Lead) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO lead (
                id, account_id, carrier_name, phone, load_id, load_reference,
                rate_offered, rate_requested, intent_score, callback_needed,
                needs_review, review_reason, status, source_conversation_id,
                source_call_sid, notes, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&lead.id.0)
        .bind(&lead.account_id.0)
        .bind(lead.carrier_name.as_deref())
        .bind(&lead.phone)
        .bind(lead.load_id.as_ref().map(|id| id.0.as_str()))
        .bind(lead.load_reference.as_deref())
        .bind(lead.rate_offered.map(|value| value.to_string()))
        .bind(lead.rate_requested.map(|value| value.to_string()))
        .bind(i64::from(lead.intent_score))
        .bind(lead.callback_needed)
        .bind(lead.needs_review)
        .bind(lead.review_reason.as_deref())
        .bind(lead.status.as_str())
        .bind(&lead.source_conversation_id)
        .bind(lead.source_call_sid.as_deref())
        .bind(&lead.notes)
        .bind(lead.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn conversation_ids_with_leads(&self) -> Result<HashSet<String>, RepositoryError> {
        let ids =
            sqlx::query_scalar::<_, String>("SELECT DISTINCT source_conversation_id FROM lead")
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().collect())
    }
}

fn summary_from_row(row: SqliteRow) -> Result<LeadSummaryRow, RepositoryError> {
    Ok(LeadSummaryRow {
        id: row.try_get("id")?,
        phone: row.try_get("phone")?,
        load_id: row.try_get("load_id")?,
        load_reference: row.try_get("load_reference")?,
        intent_score: row.try_get("intent_score")?,
        needs_review: row.try_get("needs_review")?,
        review_reason: row.try_get("review_reason")?,
        notes: row.try_get("notes")?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use linehaul_core::domain::account::AccountId;
    use linehaul_core::domain::lead::{Lead, LeadId, LeadStatus};
    use linehaul_core::domain::load::LoadId;

    use super::SqlLeadRepository;
    use crate::repositories::LeadRepository;
    use crate::seed::{insert_account, insert_load};
    use crate::{connect_ephemeral, migrations, DbPool};

    #[tokio::test]
    async fn insert_and_membership_set_round_trip() {
        let pool = setup_pool().await;
        let repo = SqlLeadRepository::new(pool.clone());

        repo.insert(sample_lead("lead-1", "conv_100")).await.expect("insert lead");
        repo.insert(sample_lead("lead-2", "conv_200")).await.expect("insert lead");

        let ids = repo.conversation_ids_with_leads().await.expect("membership set");
        assert!(ids.contains("conv_100"));
        assert!(ids.contains("conv_200"));
        assert!(!ids.contains("conv_300"));

        assert_eq!(repo.count_for_conversation("conv_100").await.expect("count"), 1);

        let summary = repo
            .find_by_conversation_id("conv_100")
            .await
            .expect("query")
            .expect("summary exists");
        assert_eq!(summary.id, "lead-1");
        assert_eq!(summary.load_reference.as_deref(), Some("4521"));
        assert!(summary.needs_review);

        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool =
            connect_ephemeral().await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        insert_account(&pool, "acct-1", "Test Desk", "2026-01-01T00:00:00Z")
            .await
            .expect("seed account");
        insert_load(&pool, "load-1", "acct-1", "4521", "Dallas, TX", "Atlanta, GA", "1400")
            .await
            .expect("seed load");
        pool
    }

    fn sample_lead(id: &str, conversation_id: &str) -> Lead {
        Lead {
            id: LeadId(id.to_string()),
            account_id: AccountId("acct-1".to_string()),
            carrier_name: Some("Redline Trucking".to_string()),
            phone: "555-123-4567".to_string(),
            load_id: Some(LoadId("load-1".to_string())),
            load_reference: Some("4521".to_string()),
            rate_offered: Some(Decimal::from(1400)),
            rate_requested: None,
            intent_score: 65,
            callback_needed: false,
            needs_review: true,
            review_reason: Some("load_not_matched".to_string()),
            status: LeadStatus::New,
            source_conversation_id: conversation_id.to_string(),
            source_call_sid: Some("CA-100".to_string()),
            notes: "score 65; load 4521; rate 1400".to_string(),
            created_at: Utc::now(),
        }
    }
}
