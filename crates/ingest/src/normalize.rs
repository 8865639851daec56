//! Maps one raw upstream conversation onto a normalized `CallLog` row.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use linehaul_core::domain::account::AccountId;
use linehaul_core::domain::call::{CallDirection, CallLog, CallOutcome};

use crate::client::{ConversationDetail, ConversationMetadata, ConversationSummary};

/// Upstream bills in credits; one credit is a tenth of a cent.
pub const USD_PER_CREDIT: Decimal = Decimal::from_parts(1, 0, 0, false, 3);
/// Duration-based estimate used when no credit figure is reported.
pub const USD_PER_MINUTE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);
/// Share of the estimated cost attributed to language-model usage.
pub const LLM_COST_FRACTION: Decimal = Decimal::from_parts(30, 0, 0, false, 2);

pub fn normalize_conversation(
    detail: &ConversationDetail,
    summary: &ConversationSummary,
    account_id: AccountId,
) -> CallLog {
    let empty_metadata = ConversationMetadata::default();
    let metadata = detail.metadata.as_ref().unwrap_or(&empty_metadata);

    let started_at = timestamp(metadata.start_time_unix_secs.or(summary.start_time_unix_secs));
    let ended_at = timestamp(metadata.end_time_unix_secs.or(summary.end_time_unix_secs));
    let duration_secs = duration_secs(metadata, started_at, ended_at);

    let direction = metadata
        .direction
        .as_deref()
        .and_then(CallDirection::parse)
        .unwrap_or(CallDirection::Inbound);
    let (caller_phone, receiver_phone) = assign_phones(metadata, direction);

    let estimated_cost = duration_estimate(duration_secs);
    let cost = match metadata.cost {
        Some(credits) => Decimal::from(credits) * USD_PER_CREDIT,
        None => estimated_cost,
    };
    let llm_cost = estimated_cost * LLM_COST_FRACTION;

    let transcript_text = detail.transcript_text();
    let transcript = if transcript_text.is_empty() { None } else { Some(transcript_text) };
    let analysis_summary =
        detail.analysis.as_ref().and_then(|analysis| analysis.transcript_summary.clone());

    let status = detail
        .status
        .clone()
        .or_else(|| summary.status.clone())
        .unwrap_or_else(|| "done".to_string());

    CallLog {
        account_id,
        conversation_id: summary.conversation_id.clone(),
        agent_id: summary.agent_id.clone(),
        call_sid: metadata.call_sid.clone(),
        direction,
        caller_phone,
        receiver_phone,
        transcript,
        summary: analysis_summary,
        recording_url: metadata.recording_url.clone(),
        started_at,
        ended_at,
        duration_secs,
        outcome: derive_outcome(detail),
        cost,
        estimated_cost,
        llm_cost,
        ended_reason: metadata.termination_reason.clone(),
        status,
        raw_metadata: serde_json::to_value(metadata).unwrap_or(serde_json::Value::Null),
    }
}

fn timestamp(unix_secs: Option<i64>) -> Option<DateTime<Utc>> {
    unix_secs.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
}

/// Duration precedence: explicit field, then end minus start, then the nested
/// connection duration, then zero.
fn duration_secs(
    metadata: &ConversationMetadata,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
) -> i64 {
    if let Some(explicit) = metadata.call_duration_secs {
        return explicit.max(0);
    }
    if let (Some(start), Some(end)) = (started_at, ended_at) {
        let elapsed = (end - start).num_seconds();
        if elapsed >= 0 {
            return elapsed;
        }
    }
    metadata
        .connection
        .as_ref()
        .and_then(|connection| connection.duration_secs)
        .map(|secs| secs.max(0))
        .unwrap_or(0)
}

/// Direction-aware phone assignment. For inbound calls the external party is
/// the caller and the agent line the receiver; outbound swaps the roles. Each
/// side falls through phone_call-specific, then call-level, then extra
/// metadata fields, and a still-unset caller finally takes the raw external
/// number.
fn assign_phones(
    metadata: &ConversationMetadata,
    direction: CallDirection,
) -> (Option<String>, Option<String>) {
    let phone_call = metadata.phone_call.as_ref();

    let external = phone_call
        .and_then(|info| info.external_number.clone())
        .or_else(|| metadata.external_number.clone())
        .or_else(|| extra_string(metadata, "caller_id"));
    let agent_side = phone_call
        .and_then(|info| info.agent_number.clone())
        .or_else(|| metadata.agent_number.clone())
        .or_else(|| extra_string(metadata, "called_number"));

    let (mut caller, receiver) = match direction {
        CallDirection::Inbound => (external.clone(), agent_side),
        CallDirection::Outbound => (agent_side, external.clone()),
    };

    if caller.is_none() {
        caller = external;
    }

    (caller, receiver)
}

fn extra_string(metadata: &ConversationMetadata, key: &str) -> Option<String> {
    metadata.extra.get(key).and_then(|value| value.as_str()).map(str::to_string)
}

fn duration_estimate(duration_secs: i64) -> Decimal {
    Decimal::from(duration_secs.max(0)) / Decimal::from(60) * USD_PER_MINUTE
}

/// Collected-data flags override the default outcome, first hit wins:
/// callback requested, then declined, then confirmed.
fn derive_outcome(detail: &ConversationDetail) -> CallOutcome {
    let Some(analysis) = detail.analysis.as_ref() else {
        return CallOutcome::Completed;
    };
    let flags = [
        ("callback_requested", CallOutcome::CallbackRequested),
        ("declined", CallOutcome::Declined),
        ("confirmed", CallOutcome::Confirmed),
    ];
    for (key, outcome) in flags {
        if analysis.data_collection_results.get(key).is_some_and(flag_is_set) {
            return outcome;
        }
    }
    CallOutcome::Completed
}

/// Collected-data entries arrive either as a bare boolean, a string, or an
/// object wrapping the value.
fn flag_is_set(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(flag) => *flag,
        serde_json::Value::String(text) => text.eq_ignore_ascii_case("true"),
        serde_json::Value::Object(map) => map.get("value").is_some_and(flag_is_set),
        _ => false,
    }
}
