//! UI sink — where suggestions, loading state, and errors are delivered.
//!
//! The sink renders plain data; applying a suggestion's code happens on the
//! UI side, which reports the outcome back through
//! [`crate::services::copilot::Copilot::report_apply`].

use crate::state::Suggestion;

pub trait UiSink: Send + Sync {
    fn on_suggestion_updated(&self, suggestion: &Suggestion, is_user_prompt_result: bool);
    fn on_loading_changed(&self, loading: bool);
    fn on_error(&self, message: &str);
}

/// Outcome of applying a suggestion's code, reported by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyReport {
    Succeeded { is_user_prompt_result: bool },
    Failed { error: String, is_user_prompt_result: bool },
}

impl ApplyReport {
    #[must_use]
    pub fn is_user_prompt_result(&self) -> bool {
        match self {
            Self::Succeeded { is_user_prompt_result } | Self::Failed { is_user_prompt_result, .. } => {
                *is_user_prompt_result
            }
        }
    }
}

/// Sink that discards everything. Useful when only pull accessors are read.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl UiSink for NullSink {
    fn on_suggestion_updated(&self, _suggestion: &Suggestion, _is_user_prompt_result: bool) {}
    fn on_loading_changed(&self, _loading: bool) {}
    fn on_error(&self, _message: &str) {}
}
