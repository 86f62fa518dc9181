//! Context assembly — the snapshot of document state and recent history that
//! a prompt is rendered from.
//!
//! DESIGN
//! ======
//! A `Context` is plain owned data. It is built under the orchestrator lock
//! from the host's serialized state and the `HistoryStore`, then released
//! before any await. Embedded `data:` URIs are cut down to their prefix so a
//! single inline image cannot blow the prompt budget.

use serde::Serialize;
use serde_json::Value;

use super::history::HistoryStore;
use crate::state::{Feedback, LogEntry, ResponseEntry, Suggestion};

/// Characters of a `data:` URI kept before truncation.
pub const DATA_URI_PREFIX_LEN: usize = 30;
pub const TRUNCATION_MARKER: &str = "…[truncated]";
/// Most recent responses carried as interaction states.
pub const MAX_STATES: usize = 5;
/// Log entries carried per state.
pub const MAX_LOGS_PER_STATE: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// Pretty-printed serialized host state.
    pub project_data: String,
    pub states: Vec<StateRecord>,
    pub feedback: Vec<FeedbackRecord>,
    pub user_prompt: Option<String>,
    pub previous_errors: Vec<AttemptFailure>,
}

/// One past interaction and the logs captured after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub timestamp: i64,
    pub user_prompt: Option<String>,
    pub ai_response: Suggestion,
    pub console_logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub response_id: String,
    pub timestamp: i64,
    pub explanation: String,
    pub feedback: Feedback,
}

/// A failed attempt, fed back to the provider on the next retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptFailure {
    pub message: String,
    pub kind: String,
    pub timestamp: i64,
    pub attempt: u32,
}

impl Context {
    /// Assemble a context from the host's serialized state and history.
    #[must_use]
    pub fn build(mut document_state: Value, history: &HistoryStore, user_prompt: Option<&str>) -> Self {
        truncate_data_uris(&mut document_state);
        let project_data = serde_json::to_string_pretty(&document_state).unwrap_or_default();

        let states = history
            .responses()
            .iter()
            .take(MAX_STATES)
            .map(|entry| state_record(entry, history))
            .collect();

        let feedback = history
            .feedback_eligible()
            .into_iter()
            .filter_map(|entry| {
                entry.feedback.clone().map(|feedback| FeedbackRecord {
                    response_id: entry.id.clone(),
                    timestamp: entry.timestamp,
                    explanation: entry.suggestion.explanation.clone(),
                    feedback,
                })
            })
            .collect();

        Self {
            project_data,
            states,
            feedback,
            user_prompt: user_prompt.map(str::to_owned),
            previous_errors: Vec::new(),
        }
    }
}

fn state_record(entry: &ResponseEntry, history: &HistoryStore) -> StateRecord {
    StateRecord {
        timestamp: entry.timestamp,
        user_prompt: entry.user_prompt.clone(),
        ai_response: entry.suggestion.clone(),
        console_logs: history
            .logs_since(entry.timestamp)
            .take(MAX_LOGS_PER_STATE)
            .cloned()
            .collect(),
    }
}

// =============================================================================
// DATA URI TRUNCATION
// =============================================================================

/// Truncate every over-long `data:` string anywhere in `value`, in place.
pub fn truncate_data_uris(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.starts_with("data:") && s.chars().count() > DATA_URI_PREFIX_LEN {
                let prefix: String = s.chars().take(DATA_URI_PREFIX_LEN).collect();
                *s = format!("{prefix}{TRUNCATION_MARKER}");
            }
        }
        Value::Array(items) => items.iter_mut().for_each(truncate_data_uris),
        Value::Object(map) => map.values_mut().for_each(truncate_data_uris),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Whether `s` is a `data:` URI shortened by [`truncate_data_uris`].
#[must_use]
pub fn is_truncated(s: &str) -> bool {
    s.starts_with("data:") && s.ends_with(TRUNCATION_MARKER)
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
