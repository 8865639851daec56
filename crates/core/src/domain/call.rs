use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::account::AccountId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallLogId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

impl CallDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Outcome of a finished call, derived from the upstream analysis payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Completed,
    CallbackRequested,
    Declined,
    Confirmed,
}

impl CallOutcome {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" => Some(Self::Completed),
            "callback_requested" => Some(Self::CallbackRequested),
            "declined" => Some(Self::Declined),
            "confirmed" => Some(Self::Confirmed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::CallbackRequested => "callback_requested",
            Self::Declined => "declined",
            Self::Confirmed => "confirmed",
        }
    }
}

/// One normalized call record. Keyed uniquely by `conversation_id`; the
/// internal `CallLogId` is assigned by the upsert writer so two writes for the
/// same conversation converge on one row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallLog {
    pub account_id: AccountId,
    pub conversation_id: String,
    pub agent_id: String,
    pub call_sid: Option<String>,
    pub direction: CallDirection,
    pub caller_phone: Option<String>,
    pub receiver_phone: Option<String>,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    pub recording_url: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: i64,
    pub outcome: CallOutcome,
    pub cost: Decimal,
    pub estimated_cost: Decimal,
    pub llm_cost: Decimal,
    pub ended_reason: Option<String>,
    pub status: String,
    pub raw_metadata: serde_json::Value,
}
