use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

use linehaul_core::domain::account::AccountId;
use linehaul_core::domain::call::{CallLog, CallLogId};
use linehaul_core::domain::lead::Lead;
use linehaul_core::domain::load::LoadId;

pub mod account;
pub mod call_log;
pub mod lead;
pub mod load;
pub mod memory;

pub use account::SqlAccountRepository;
pub use call_log::SqlCallLogRepository;
pub use lead::SqlLeadRepository;
pub use load::SqlLoadRepository;
pub use memory::{
    InMemoryAccountRepository, InMemoryCallLogRepository, InMemoryLeadRepository,
    InMemoryLoadRepository,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Oldest account row, used as the run owner when the caller supplies
    /// none.
    async fn any_account_id(&self) -> Result<Option<AccountId>, RepositoryError>;
}

#[async_trait]
pub trait CallLogRepository: Send + Sync {
    /// Idempotent write keyed by `conversation_id`: an existing row is
    /// updated in place (last-write-wins) and keeps its id; otherwise a new
    /// row is inserted. Two calls with the same conversation id converge to
    /// one row.
    async fn upsert(&self, call: CallLog) -> Result<CallLogId, RepositoryError>;

    async fn find_by_conversation_id(
        &self,
        conversation_id: &str,
    ) -> Result<Option<(CallLogId, CallLog)>, RepositoryError>;

    /// Conversation ids already present for one agent; seeds the
    /// `missing_only` filter.
    async fn existing_conversation_ids(
        &self,
        agent_id: &str,
    ) -> Result<HashSet<String>, RepositoryError>;
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn insert(&self, lead: Lead) -> Result<(), RepositoryError>;

    /// Source conversation ids that already produced a lead; seeds the in-run
    /// dedup set.
    async fn conversation_ids_with_leads(&self) -> Result<HashSet<String>, RepositoryError>;
}

#[async_trait]
pub trait LoadRepository: Send + Sync {
    /// `(id, reference_number)` pairs for one account; the lead writer runs
    /// its fuzzy reference match over these.
    async fn list_reference_numbers(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<(LoadId, String)>, RepositoryError>;
}
