//! Orchestrator state and the records it keeps.
//!
//! DESIGN
//! ======
//! `OrchestratorState` is owned by the `Copilot` behind a mutex. Host events
//! are folded in by [`OrchestratorState::apply_host_event`], a plain function
//! of `(state, event, now)` so tracking can be tested without a runtime.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::host::HostEvent;
use crate::services::context::Context;
use crate::services::history::{HistoryCaps, HistoryStore};
use crate::services::snapshot::Snapshot;

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// =============================================================================
// SUGGESTION + RESPONSES
// =============================================================================

/// An edit proposed by the provider: prose for the user, code for the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub explanation: String,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackRating {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: FeedbackRating,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub timestamp: i64,
}

/// One completed (non-cancelled) AI call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEntry {
    pub id: String,
    pub timestamp: i64,
    pub context: Context,
    pub suggestion: Suggestion,
    pub user_prompt: Option<String>,
    pub feedback: Option<Feedback>,
}

impl ResponseEntry {
    #[must_use]
    pub fn new(context: Context, suggestion: Suggestion, user_prompt: Option<String>, timestamp: i64) -> Self {
        Self { id: uuid::Uuid::new_v4().to_string(), timestamp, context, suggestion, user_prompt, feedback: None }
    }
}

// =============================================================================
// USER ACTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAction {
    pub component_type: String,
    pub component_id: String,
    pub timestamp: i64,
    #[serde(flatten)]
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ActionKind {
    ComponentAdd { tag_name: String, classes: Vec<String>, parent: Option<String> },
    ComponentRemove,
    ComponentUpdate,
    ComponentSelect,
    ComponentDuplicate { tag_name: String, original_id: String, classes: Vec<String> },
    StyleChange { property: String, value: Option<String>, previous_value: Option<String> },
}

impl ActionKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ComponentAdd { .. } => "component_add",
            Self::ComponentRemove => "component_remove",
            Self::ComponentUpdate => "component_update",
            Self::ComponentSelect => "component_select",
            Self::ComponentDuplicate { .. } => "component_duplicate",
            Self::StyleChange { .. } => "style_change",
        }
    }
}

/// A component addition before duplicate classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedComponent {
    pub component_type: String,
    pub component_id: String,
    pub tag_name: String,
    pub classes: Vec<String>,
    pub parent: Option<String>,
}

// =============================================================================
// LOGS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Warn,
    Error,
    Info,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: i64,
    pub level: LogLevel,
    pub message: String,
    pub source: String,
}

// =============================================================================
// ORCHESTRATOR STATE
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("{event} event without a component")]
    EmptyComponent { event: &'static str },
}

pub struct OrchestratorState {
    /// Snapshot the last completed analysis was anchored to.
    pub last_snapshot: Option<Snapshot>,
    /// Edits seen since the last completed analysis.
    pub change_count: u32,
    pub history: HistoryStore,
    pub analyzing: bool,
    pub processing_user_prompt: bool,
    pub loading: bool,
}

impl OrchestratorState {
    #[must_use]
    pub fn new(caps: HistoryCaps) -> Self {
        Self {
            last_snapshot: None,
            change_count: 0,
            history: HistoryStore::new(caps),
            analyzing: false,
            processing_user_prompt: false,
            loading: false,
        }
    }

    /// Whether either channel currently holds the AI call slot.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.analyzing || self.processing_user_prompt
    }

    /// Fold one host event into the state.
    ///
    /// Edits always bump the change counter, even when the action itself
    /// cannot be recorded.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError`] when the event carries no component at all;
    /// nothing is recorded in that case. A component without an id is
    /// recorded as `"unknown"`.
    pub fn apply_host_event(&mut self, event: &HostEvent, now: i64) -> Result<(), TrackError> {
        if event.is_edit() {
            self.change_count = self.change_count.saturating_add(1);
        }

        let component = event.component();
        if component.is_empty() {
            return Err(TrackError::EmptyComponent { event: event_name(event) });
        }
        let component_id = component
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| "unknown".into());
        let component_type = component
            .component_type
            .clone()
            .unwrap_or_else(|| "unknown".into());

        let kind = match event {
            HostEvent::ComponentAdded(c) => {
                self.history.record_addition(
                    AddedComponent {
                        component_type,
                        component_id,
                        tag_name: c.tag_name.clone().unwrap_or_else(|| "div".into()),
                        classes: c.classes.clone(),
                        parent: c.parent_id.clone(),
                    },
                    now,
                );
                return Ok(());
            }
            HostEvent::ComponentRemoved(_) => ActionKind::ComponentRemove,
            HostEvent::ComponentUpdated(_) => ActionKind::ComponentUpdate,
            HostEvent::ComponentSelected(_) => ActionKind::ComponentSelect,
            HostEvent::StyleChanged { property, value, previous_value, .. } => ActionKind::StyleChange {
                property: property.clone(),
                value: value.clone(),
                previous_value: previous_value.clone(),
            },
        };
        self.history
            .push_action(UserAction { component_type, component_id, timestamp: now, kind });
        Ok(())
    }
}

fn event_name(event: &HostEvent) -> &'static str {
    match event {
        HostEvent::ComponentAdded(_) => "component_added",
        HostEvent::ComponentRemoved(_) => "component_removed",
        HostEvent::ComponentUpdated(_) => "component_updated",
        HostEvent::ComponentSelected(_) => "component_selected",
        HostEvent::StyleChanged { .. } => "style_changed",
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
