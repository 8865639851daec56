use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::account::AccountId;
use crate::domain::load::LoadId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Reviewed,
    Contacted,
    Converted,
    Dismissed,
}

impl LeadStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Self::New),
            "reviewed" => Some(Self::Reviewed),
            "contacted" => Some(Self::Contacted),
            "converted" => Some(Self::Converted),
            "dismissed" => Some(Self::Dismissed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Reviewed => "reviewed",
            Self::Contacted => "contacted",
            Self::Converted => "converted",
            Self::Dismissed => "dismissed",
        }
    }
}

/// A candidate carrier contact derived from one call, subject to human review.
/// Dedup key is `source_conversation_id`: the lead writer checks it against a
/// membership set before insert rather than relying on a unique constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub account_id: AccountId,
    pub carrier_name: Option<String>,
    pub phone: String,
    pub load_id: Option<LoadId>,
    pub load_reference: Option<String>,
    pub rate_offered: Option<Decimal>,
    pub rate_requested: Option<Decimal>,
    pub intent_score: u32,
    pub callback_needed: bool,
    pub needs_review: bool,
    pub review_reason: Option<String>,
    pub status: LeadStatus,
    pub source_conversation_id: String,
    pub source_call_sid: Option<String>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}
