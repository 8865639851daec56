use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use uuid::Uuid;

use linehaul_core::domain::account::AccountId;
use linehaul_core::domain::call::{CallLog, CallLogId};
use linehaul_core::domain::lead::Lead;
use linehaul_core::domain::load::LoadId;

use super::{
    AccountRepository, CallLogRepository, LeadRepository, LoadRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<Vec<AccountId>>,
}

impl InMemoryAccountRepository {
    pub async fn push(&self, id: AccountId) {
        self.accounts.write().await.push(id);
    }
}

#[async_trait::async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn any_account_id(&self) -> Result<Option<AccountId>, RepositoryError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.first().cloned())
    }
}

/// Keyed by conversation id, mirroring the sqlite upsert semantics.
#[derive(Default)]
pub struct InMemoryCallLogRepository {
    calls: RwLock<HashMap<String, (CallLogId, CallLog)>>,
}

impl InMemoryCallLogRepository {
    pub async fn len(&self) -> usize {
        self.calls.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.calls.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl CallLogRepository for InMemoryCallLogRepository {
    async fn upsert(&self, call: CallLog) -> Result<CallLogId, RepositoryError> {
        let mut calls = self.calls.write().await;
        let id = match calls.get(&call.conversation_id) {
            Some((existing, _)) => existing.clone(),
            None => CallLogId(Uuid::new_v4().to_string()),
        };
        calls.insert(call.conversation_id.clone(), (id.clone(), call));
        Ok(id)
    }

    async fn find_by_conversation_id(
        &self,
        conversation_id: &str,
    ) -> Result<Option<(CallLogId, CallLog)>, RepositoryError> {
        let calls = self.calls.read().await;
        Ok(calls.get(conversation_id).cloned())
    }

    async fn existing_conversation_ids(
        &self,
        agent_id: &str,
    ) -> Result<HashSet<String>, RepositoryError> {
        let calls = self.calls.read().await;
        Ok(calls
            .values()
            .filter(|(_, call)| call.agent_id == agent_id)
            .map(|(_, call)| call.conversation_id.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: RwLock<Vec<Lead>>,
}

impl InMemoryLeadRepository {
    pub async fn all(&self) -> Vec<Lead> {
        self.leads.read().await.clone()
    }
}

#[async_trait::async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn insert(&self, lead: Lead) -> Result<(), RepositoryError> {
        self.leads.write().await.push(lead);
        Ok(())
    }

    async fn conversation_ids_with_leads(&self) -> Result<HashSet<String>, RepositoryError> {
        let leads = self.leads.read().await;
        Ok(leads.iter().map(|lead| lead.source_conversation_id.clone()).collect())
    }
}

#[derive(Default)]
pub struct InMemoryLoadRepository {
    loads: RwLock<Vec<(AccountId, LoadId, String)>>,
}

impl InMemoryLoadRepository {
    pub async fn push(&self, account_id: AccountId, id: LoadId, reference_number: String) {
        self.loads.write().await.push((account_id, id, reference_number));
    }
}

#[async_trait::async_trait]
impl LoadRepository for InMemoryLoadRepository {
    async fn list_reference_numbers(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<(LoadId, String)>, RepositoryError> {
        let loads = self.loads.read().await;
        Ok(loads
            .iter()
            .filter(|(owner, _, _)| owner == account_id)
            .map(|(_, id, reference)| (id.clone(), reference.clone()))
            .collect())
    }
}
