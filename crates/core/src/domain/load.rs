use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::account::AccountId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadId(pub String);

/// A posted freight load. Read-only from the pipeline's point of view; lead
/// creation only matches extracted reference strings against these rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub id: LoadId,
    pub account_id: AccountId,
    pub reference_number: String,
    pub origin: String,
    pub destination: String,
    pub rate: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
