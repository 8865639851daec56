use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::client::{with_retry, ApiError, ConversationSummary, Pacing, RetryPolicy, VoiceApi};

/// Which conversations a run targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackfillMode {
    /// Only conversations with no call-log row yet. Default.
    MissingOnly,
    /// One conversation, fetched directly without walking the listing.
    ConversationId(String),
    /// Conversations whose start time falls within the inclusive range.
    DateRange { start: DateTime<Utc>, end: DateTime<Utc> },
    /// Every conversation the listing yields, re-upserting existing rows.
    All,
}

impl BackfillMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingOnly => "missing_only",
            Self::ConversationId(_) => "conversation_id",
            Self::DateRange { .. } => "date_range",
            Self::All => "all",
        }
    }
}

pub struct Paginator {
    api: Arc<dyn VoiceApi>,
    retry: RetryPolicy,
    pacing: Arc<dyn Pacing>,
}

impl Paginator {
    pub fn new(api: Arc<dyn VoiceApi>, retry: RetryPolicy, pacing: Arc<dyn Pacing>) -> Self {
        Self { api, retry, pacing }
    }

    /// Walks the listing cursor for `agent_id`, at most `max_pages` pages,
    /// and returns the summaries the mode keeps, in listing order.
    ///
    /// `existing_ids` seeds the `missing_only` filter; the other modes ignore
    /// it. Single-id mode skips the listing entirely and synthesizes one
    /// summary from the requested id.
    pub async fn collect(
        &self,
        agent_id: &str,
        page_size: u32,
        max_pages: u32,
        mode: &BackfillMode,
        existing_ids: &HashSet<String>,
    ) -> Result<Vec<ConversationSummary>, ApiError> {
        if let BackfillMode::ConversationId(conversation_id) = mode {
            return Ok(vec![ConversationSummary {
                conversation_id: conversation_id.clone(),
                agent_id: agent_id.to_string(),
                status: None,
                start_time_unix_secs: None,
                end_time_unix_secs: None,
            }]);
        }

        let mut summaries = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages_fetched = 0_u32;

        loop {
            if pages_fetched >= max_pages {
                info!(
                    event_name = "ingest.paginator.page_cap",
                    agent_id,
                    max_pages,
                    "page cap reached; stopping pagination"
                );
                break;
            }

            let cursor_ref = cursor.as_deref();
            let page = with_retry(&self.retry, self.pacing.as_ref(), || {
                self.api.list_conversations(agent_id, cursor_ref, page_size)
            })
            .await?;
            pages_fetched += 1;

            debug!(
                event_name = "ingest.paginator.page_fetched",
                agent_id,
                page = pages_fetched,
                conversations = page.conversations.len(),
                has_more = page.has_more,
                "fetched listing page"
            );

            for summary in page.conversations {
                if self.keeps(mode, &summary, existing_ids) {
                    summaries.push(summary);
                }
            }

            match page.next_cursor {
                Some(next) if page.has_more && !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(summaries)
    }

    fn keeps(
        &self,
        mode: &BackfillMode,
        summary: &ConversationSummary,
        existing_ids: &HashSet<String>,
    ) -> bool {
        match mode {
            BackfillMode::MissingOnly => !existing_ids.contains(&summary.conversation_id),
            BackfillMode::All => true,
            BackfillMode::DateRange { start, end } => match summary.start_time_unix_secs {
                Some(unix) => {
                    let started = DateTime::<Utc>::from_timestamp(unix, 0);
                    match started {
                        Some(started) => started >= *start && started <= *end,
                        None => false,
                    }
                }
                None => false,
            },
            // Handled before pagination starts.
            BackfillMode::ConversationId(_) => true,
        }
    }
}
