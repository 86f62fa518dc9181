//! Bounded history of responses, user actions, and logs.
//!
//! DESIGN
//! ======
//! Every list is a `VecDeque` with a fixed cap; pushing past the cap drops
//! the oldest entry silently. Responses are kept most-recent-first, everything
//! else chronologically.

use std::collections::VecDeque;

use crate::config::{
    CopilotConfig, DEFAULT_ACTION_HISTORY_CAP, DEFAULT_ANALYSIS_HISTORY_CAP, DEFAULT_LOG_HISTORY_CAP,
    DEFAULT_RESPONSE_HISTORY_CAP,
};
use crate::state::{ActionKind, AddedComponent, Feedback, LogEntry, ResponseEntry, UserAction};

/// Window in which a same-shaped addition reads as a duplicate.
pub const DUPLICATE_WINDOW_MS: i64 = 10_000;
/// Number of recent additions considered for duplicate detection.
pub const DUPLICATE_LOOKBACK: usize = 5;
/// Number of feedback-bearing responses surfaced to the prompt.
pub const FEEDBACK_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryCaps {
    pub responses: usize,
    pub actions: usize,
    pub logs: usize,
    pub analyses: usize,
}

impl Default for HistoryCaps {
    fn default() -> Self {
        Self {
            responses: DEFAULT_RESPONSE_HISTORY_CAP,
            actions: DEFAULT_ACTION_HISTORY_CAP,
            logs: DEFAULT_LOG_HISTORY_CAP,
            analyses: DEFAULT_ANALYSIS_HISTORY_CAP,
        }
    }
}

impl From<&CopilotConfig> for HistoryCaps {
    fn from(config: &CopilotConfig) -> Self {
        Self {
            responses: config.response_history_cap,
            actions: config.action_history_cap,
            logs: config.log_history_cap,
            analyses: config.analysis_history_cap,
        }
    }
}

#[derive(Debug, Default)]
pub struct HistoryStore {
    caps: HistoryCaps,
    responses: VecDeque<ResponseEntry>,
    actions: VecDeque<UserAction>,
    logs: VecDeque<LogEntry>,
    analyses: VecDeque<ResponseEntry>,
}

impl HistoryStore {
    #[must_use]
    pub fn new(caps: HistoryCaps) -> Self {
        Self { caps, ..Self::default() }
    }

    // =========================================================================
    // PUSH
    // =========================================================================

    /// Insert at the front of the response list and append to the analysis
    /// history.
    pub fn push_response(&mut self, entry: ResponseEntry) {
        self.analyses.push_back(entry.clone());
        while self.analyses.len() > self.caps.analyses {
            self.analyses.pop_front();
        }
        self.responses.push_front(entry);
        self.responses.truncate(self.caps.responses);
    }

    pub fn push_action(&mut self, action: UserAction) {
        push_bounded(&mut self.actions, action, self.caps.actions);
    }

    pub fn push_log(&mut self, entry: LogEntry) {
        push_bounded(&mut self.logs, entry, self.caps.logs);
    }

    /// Record an addition, classifying it as a duplicate when one of the last
    /// few additions inside the window had the same type and tag.
    pub fn record_addition(&mut self, added: AddedComponent, now: i64) {
        let original_id = self
            .actions
            .iter()
            .filter(|action| matches!(action.kind, ActionKind::ComponentAdd { .. }))
            .filter(|action| now - action.timestamp < DUPLICATE_WINDOW_MS)
            .rev()
            .take(DUPLICATE_LOOKBACK)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .find(|action| {
                action.component_type == added.component_type
                    && matches!(&action.kind, ActionKind::ComponentAdd { tag_name, .. } if *tag_name == added.tag_name)
            })
            .map(|action| action.component_id.clone());

        let kind = match original_id {
            Some(original_id) => {
                ActionKind::ComponentDuplicate { tag_name: added.tag_name, original_id, classes: added.classes }
            }
            None => ActionKind::ComponentAdd { tag_name: added.tag_name, classes: added.classes, parent: added.parent },
        };
        self.push_action(UserAction {
            component_type: added.component_type,
            component_id: added.component_id,
            timestamp: now,
            kind,
        });
    }

    // =========================================================================
    // FEEDBACK
    // =========================================================================

    /// Attach feedback to a stored response. Returns `false` for an unknown id.
    pub fn attach_feedback(&mut self, response_id: &str, feedback: Feedback) -> bool {
        for entry in self.analyses.iter_mut().filter(|e| e.id == response_id) {
            entry.feedback = Some(feedback.clone());
        }
        match self.responses.iter_mut().find(|e| e.id == response_id) {
            Some(entry) => {
                entry.feedback = Some(feedback);
                true
            }
            None => false,
        }
    }

    pub fn clear_feedback(&mut self) {
        for entry in self.responses.iter_mut().chain(self.analyses.iter_mut()) {
            entry.feedback = None;
        }
    }

    /// Most recent responses that carry feedback, most recent first.
    #[must_use]
    pub fn feedback_eligible(&self) -> Vec<&ResponseEntry> {
        self.responses
            .iter()
            .filter(|e| e.feedback.is_some())
            .take(FEEDBACK_LIMIT)
            .collect()
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Logs with `timestamp >= since`, in chronological order.
    pub fn logs_since(&self, since: i64) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter().filter(move |log| log.timestamp >= since)
    }

    /// Most recent first.
    #[must_use]
    pub fn responses(&self) -> &VecDeque<ResponseEntry> {
        &self.responses
    }

    #[must_use]
    pub fn actions(&self) -> &VecDeque<UserAction> {
        &self.actions
    }

    #[must_use]
    pub fn logs(&self) -> &VecDeque<LogEntry> {
        &self.logs
    }

    /// Every completed response, oldest first.
    #[must_use]
    pub fn analyses(&self) -> &VecDeque<ResponseEntry> {
        &self.analyses
    }

    pub fn clear_responses(&mut self) {
        self.responses.clear();
    }
}

fn push_bounded<T>(list: &mut VecDeque<T>, item: T, cap: usize) {
    list.push_back(item);
    while list.len() > cap {
        list.pop_front();
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
