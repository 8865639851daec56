//! Gated lead creation from classified calls.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use linehaul_core::domain::account::AccountId;
use linehaul_core::domain::call::{CallDirection, CallLog};
use linehaul_core::domain::lead::{Lead, LeadId, LeadStatus};
use linehaul_core::domain::load::LoadId;
use linehaul_core::intent::IntentAnalysis;
use linehaul_core::phone::{format_callback_phone, is_usable_phone};

use linehaul_db::repositories::{LeadRepository, RepositoryError};

/// Why a call did not produce a lead. Gates are evaluated in declaration
/// order and short-circuit on the first failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    LeadExists,
    NoCallbackPhone,
    NoLoadReference,
    BelowThreshold,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadExists => "lead_exists",
            Self::NoCallbackPhone => "no_callback_phone",
            Self::NoLoadReference => "no_load_reference",
            Self::BelowThreshold => "below_intent_threshold",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeadOutcome {
    Created { lead_id: LeadId },
    Skipped(SkipReason),
}

pub struct LeadWriter {
    repository: Arc<dyn LeadRepository>,
    /// Seeded once from persisted state, then updated after every creation so
    /// a duplicate later in the same run is caught without a round trip.
    seen_conversations: HashSet<String>,
    /// `(load id, reference number)` pairs for the owning account.
    load_references: Vec<(LoadId, String)>,
}

impl LeadWriter {
    pub fn new(
        repository: Arc<dyn LeadRepository>,
        seen_conversations: HashSet<String>,
        load_references: Vec<(LoadId, String)>,
    ) -> Self {
        Self { repository, seen_conversations, load_references }
    }

    /// Runs the gates for one classified call and inserts a lead when all of
    /// them pass. The analysis must come from this call's transcript.
    pub async fn evaluate(
        &mut self,
        call: &CallLog,
        analysis: &IntentAnalysis,
    ) -> Result<LeadOutcome, RepositoryError> {
        if self.seen_conversations.contains(&call.conversation_id) {
            return Ok(LeadOutcome::Skipped(SkipReason::LeadExists));
        }

        let callback_phone = callback_phone(call);
        let Some(raw_phone) = callback_phone else {
            return Ok(LeadOutcome::Skipped(SkipReason::NoCallbackPhone));
        };
        if !is_usable_phone(&raw_phone) {
            return Ok(LeadOutcome::Skipped(SkipReason::NoCallbackPhone));
        }

        let has_transcript = call.transcript.as_deref().is_some_and(|t| !t.trim().is_empty());
        if !has_transcript || !analysis.has_load_reference {
            return Ok(LeadOutcome::Skipped(SkipReason::NoLoadReference));
        }

        if !analysis.meets_intent_threshold {
            return Ok(LeadOutcome::Skipped(SkipReason::BelowThreshold));
        }

        let matched_load = analysis
            .load_reference
            .as_deref()
            .and_then(|reference| self.match_load(reference));
        let needs_review = matched_load.is_none();

        let lead = Lead {
            id: LeadId(Uuid::new_v4().to_string()),
            account_id: AccountId(call.account_id.0.clone()),
            carrier_name: analysis.carrier_name.clone(),
            phone: format_callback_phone(&raw_phone),
            load_id: matched_load,
            load_reference: analysis.load_reference.clone(),
            rate_offered: analysis.rate_offered,
            rate_requested: analysis.rate_requested,
            intent_score: analysis.score,
            callback_needed: analysis.callback_needed,
            needs_review,
            review_reason: needs_review.then(|| "load_not_matched".to_string()),
            status: LeadStatus::New,
            source_conversation_id: call.conversation_id.clone(),
            source_call_sid: call.call_sid.clone(),
            notes: notes(analysis),
            created_at: Utc::now(),
        };

        let lead_id = lead.id.clone();
        self.repository.insert(lead).await?;
        self.seen_conversations.insert(call.conversation_id.clone());

        info!(
            event_name = "ingest.lead.created",
            conversation_id = %call.conversation_id,
            lead_id = %lead_id.0,
            intent_score = analysis.score,
            needs_review,
            "created lead from call"
        );

        Ok(LeadOutcome::Created { lead_id })
    }

    /// Case-insensitive exact match, else substring containment either way.
    fn match_load(&self, reference: &str) -> Option<LoadId> {
        let needle = reference.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.load_references
            .iter()
            .find(|(_, candidate)| {
                let candidate = candidate.trim().to_ascii_lowercase();
                candidate == needle || candidate.contains(&needle) || needle.contains(&candidate)
            })
            .map(|(id, _)| id.clone())
    }
}

/// The external party's number is the one worth calling back: the caller for
/// inbound calls, the receiver for outbound ones.
fn callback_phone(call: &CallLog) -> Option<String> {
    match call.direction {
        CallDirection::Inbound => call.caller_phone.clone().or_else(|| call.receiver_phone.clone()),
        CallDirection::Outbound => call.receiver_phone.clone().or_else(|| call.caller_phone.clone()),
    }
}

fn notes(analysis: &IntentAnalysis) -> String {
    let mut parts = vec![format!("intent score {}", analysis.score)];
    if let Some(reference) = analysis.load_reference.as_deref() {
        parts.push(format!("load ref {reference}"));
    }
    if let Some(rate) = analysis.rate_offered {
        parts.push(format!("rate offered {rate}"));
    }
    if let Some(rate) = analysis.rate_requested {
        parts.push(format!("rate requested {rate}"));
    }
    if let Some(carrier) = analysis.carrier_name.as_deref() {
        parts.push(format!("carrier {carrier}"));
    }
    if analysis.callback_needed {
        parts.push("callback requested".to_string());
    }
    parts.join("; ")
}
