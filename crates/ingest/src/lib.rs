//! Backfill ingestion for historical voice-agent conversations: a paginating
//! upstream client, a normalizer that maps raw conversation payloads onto
//! call-log rows, a gated lead writer, and the sequential runner that ties
//! them together.

pub mod client;
pub mod leads;
pub mod normalize;
pub mod paginator;
pub mod runner;

pub use client::{ApiError, HttpVoiceApi, RetryPolicy, VoiceApi};
pub use leads::{LeadOutcome, LeadWriter, SkipReason};
pub use normalize::normalize_conversation;
pub use paginator::{BackfillMode, Paginator};
pub use runner::{BackfillItem, BackfillReport, BackfillRunner, RunnerError};
