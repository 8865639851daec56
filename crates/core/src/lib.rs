pub mod config;
pub mod domain;
pub mod errors;
pub mod intent;
pub mod phone;

pub use domain::account::{Account, AccountId};
pub use domain::call::{CallDirection, CallLog, CallLogId, CallOutcome};
pub use domain::lead::{Lead, LeadId, LeadStatus};
pub use domain::load::{Load, LoadId};
pub use errors::{validate_agent_id, DomainError};
pub use intent::{IntentAnalysis, IntentClassifier, IntentClassifierConfig};
pub use phone::format_callback_phone;

pub use chrono;
