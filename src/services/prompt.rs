//! Prompt templates — source resolution and `{{placeholder}}` rendering.
//!
//! DESIGN
//! ======
//! The template comes from, in priority order: an inline custom prompt, a
//! prompt URL, or the bundled default. A failed URL fetch logs a warning and
//! falls through to the default. The resolved template is cached until the
//! configuration changes or a reload is requested.
//!
//! Rendering is a pure function of `(template, context)` so the request
//! manager can re-render the working context on every retry without I/O.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::DateTime;
use tracing::{info, warn};

use super::context::{AttemptFailure, Context, FeedbackRecord, StateRecord};
use crate::state::FeedbackRating;

/// Template bundled with the crate.
pub const DEFAULT_PROMPT: &str = include_str!("../prompts/default_prompt.txt");

pub const DEFAULT_USER_PROMPT: &str = "No specific user request - suggest general improvements";
const NO_STATES: &str = "No previous interaction states";
const NO_FEEDBACK: &str = "No feedback on previous suggestions";
const NO_PREVIOUS_ERRORS: &str = "None";

const EXPLANATION_PREVIEW: usize = 150;
const CODE_PREVIEW: usize = 100;
const LOG_PREVIEW: usize = 100;
const LOGS_PER_STATE: usize = 5;

const FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
    #[error("prompt request failed: {0}")]
    Request(String),
    #[error("prompt URL returned status {0}")]
    Status(u16),
}

/// Partial update of the template source. `Some(None)` clears a field,
/// `None` leaves it unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptConfigUpdate {
    pub custom_prompt: Option<Option<String>>,
    pub prompt_url: Option<Option<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSource {
    Custom,
    Url,
    Default,
}

struct Sources {
    custom_prompt: Option<String>,
    prompt_url: Option<String>,
    loaded: Option<String>,
}

// =============================================================================
// MANAGER
// =============================================================================

pub struct PromptManager {
    http: reqwest::Client,
    sources: Mutex<Sources>,
}

impl PromptManager {
    /// # Errors
    ///
    /// Returns [`PromptError::HttpClientBuild`] if the fetch client fails to build.
    pub fn new(custom_prompt: Option<String>, prompt_url: Option<String>) -> Result<Self, PromptError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| PromptError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, sources: Mutex::new(Sources { custom_prompt, prompt_url, loaded: None }) })
    }

    /// The active template, resolving and caching it on first use.
    pub async fn template(&self) -> String {
        let (custom_prompt, prompt_url) = {
            let sources = self.lock();
            if let Some(loaded) = &sources.loaded {
                return loaded.clone();
            }
            (sources.custom_prompt.clone(), sources.prompt_url.clone())
        };

        let (template, source) = self.resolve(custom_prompt, prompt_url).await;
        info!(?source, len = template.len(), "prompt: template loaded");
        self.lock().loaded = Some(template.clone());
        template
    }

    /// Drop the cached template and resolve it again.
    pub async fn reload(&self) -> String {
        self.lock().loaded = None;
        self.template().await
    }

    /// Apply a partial source update. The cache is dropped either way.
    pub fn update_configuration(&self, update: PromptConfigUpdate) {
        let mut sources = self.lock();
        if let Some(custom_prompt) = update.custom_prompt {
            sources.custom_prompt = custom_prompt;
        }
        if let Some(prompt_url) = update.prompt_url {
            sources.prompt_url = prompt_url;
        }
        sources.loaded = None;
    }

    async fn resolve(&self, custom_prompt: Option<String>, prompt_url: Option<String>) -> (String, PromptSource) {
        if let Some(custom) = custom_prompt.filter(|p| !p.is_empty()) {
            return (custom, PromptSource::Custom);
        }
        if let Some(url) = prompt_url {
            match self.fetch(&url).await {
                Ok(body) => return (body, PromptSource::Url),
                Err(error) => warn!(%error, url, "prompt: failed to load template from URL; using default"),
            }
        }
        (DEFAULT_PROMPT.to_owned(), PromptSource::Default)
    }

    async fn fetch(&self, url: &str) -> Result<String, PromptError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PromptError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(PromptError::Status(status));
        }
        response
            .text()
            .await
            .map_err(|e| PromptError::Request(e.to_string()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sources> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// RENDERING
// =============================================================================

/// Substitute every known placeholder in `template` with data from `context`.
///
/// Failed attempts are appended at the end when the template has no
/// `{{previousErrors}}` slot, so a retry always sees them.
#[must_use]
pub fn render(template: &str, context: &Context) -> String {
    let user_prompt = context
        .user_prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_USER_PROMPT);
    let previous_errors = format_previous_errors(&context.previous_errors);

    let mut rendered = template
        .replace("{{projectData}}", &context.project_data)
        .replace("{{userPrompt}}", user_prompt)
        .replace("{{states}}", &format_states(&context.states))
        .replace("{{feedback}}", &format_feedback(&context.feedback));

    if rendered.contains("{{previousErrors}}") {
        rendered = rendered.replace("{{previousErrors}}", &previous_errors);
    } else if !context.previous_errors.is_empty() {
        rendered.push_str("\n\n## Failed attempts for this request\n");
        rendered.push_str(&previous_errors);
    }
    rendered
}

#[must_use]
pub fn format_states(states: &[StateRecord]) -> String {
    if states.is_empty() {
        return NO_STATES.to_owned();
    }
    states
        .iter()
        .enumerate()
        .map(|(index, state)| format_state(index + 1, state))
        .collect::<Vec<_>>()
        .join("\n---\n\n")
}

fn format_state(number: usize, state: &StateRecord) -> String {
    let mut out = format!("State {number} ({}):\n", clock_time(state.timestamp));
    if let Some(prompt) = &state.user_prompt {
        out.push_str(&format!("User Request: \"{prompt}\"\n\n"));
    }
    out.push_str("AI Response:\n");
    out.push_str(&format!("- Explanation: {}\n", truncate_text(&state.ai_response.explanation, EXPLANATION_PREVIEW)));
    out.push_str(&format!("- Code: {}\n\n", truncate_text(&state.ai_response.code, CODE_PREVIEW)));

    if !state.console_logs.is_empty() {
        out.push_str(&format!("Console logs/errors ({} entries):\n", state.console_logs.len()));
        for log in state.console_logs.iter().take(LOGS_PER_STATE) {
            out.push_str(&format!(
                "[{}] {}\n",
                log.level.as_str().to_uppercase(),
                truncate_text(&log.message, LOG_PREVIEW)
            ));
        }
        if state.console_logs.len() > LOGS_PER_STATE {
            out.push_str(&format!("... and {} more log entries\n", state.console_logs.len() - LOGS_PER_STATE));
        }
        out.push('\n');
    }
    out
}

#[must_use]
pub fn format_feedback(feedback: &[FeedbackRecord]) -> String {
    if feedback.is_empty() {
        return NO_FEEDBACK.to_owned();
    }
    feedback
        .iter()
        .map(|record| {
            let rating = match record.feedback.rating {
                FeedbackRating::Positive => "POSITIVE",
                FeedbackRating::Negative => "NEGATIVE",
            };
            let mut line = format!("- [{rating}] {}", truncate_text(&record.explanation, EXPLANATION_PREVIEW));
            if let Some(comment) = record.feedback.comment.as_deref().filter(|c| !c.is_empty()) {
                line.push_str(&format!("\n  Comment: {comment}"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[must_use]
pub fn format_previous_errors(errors: &[AttemptFailure]) -> String {
    if errors.is_empty() {
        return NO_PREVIOUS_ERRORS.to_owned();
    }
    errors
        .iter()
        .map(|e| format!("Attempt {} failed at {} ({}): {}", e.attempt, clock_time(e.timestamp), e.kind, e.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut `text` to `max` characters, marking the cut with `...`.
#[must_use]
pub fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

/// `HH:MM:SS UTC` for a millisecond timestamp.
fn clock_time(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map_or_else(|| "unknown time".to_owned(), |at| at.format("%H:%M:%S UTC").to_string())
}

#[cfg(test)]
#[path = "prompt_test.rs"]
mod tests;
