//! Provider response parsing.
//!
//! Providers are asked for bare JSON `{"explanation", "code"}` but routinely
//! wrap it in markdown fences. Anything that still fails to parse becomes the
//! fixed fallback suggestion; a malformed response is never retried.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::state::Suggestion;

pub const FALLBACK_EXPLANATION: &str = "Sorry, I couldn't understand the AI response. Please try refreshing.";
pub const FALLBACK_CODE: &str = "console.log('AI response parsing failed');";

static FENCE_OPEN_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^```\w*\n?").expect("valid regex"));
static FENCE_CLOSE_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)\n?```$").expect("valid regex"));

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("missing explanation or code in AI response")]
    MissingField,
}

#[derive(Deserialize)]
struct RawSuggestion {
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl Suggestion {
    /// Shown when a provider response cannot be understood.
    #[must_use]
    pub fn fallback() -> Self {
        Self { explanation: FALLBACK_EXPLANATION.into(), code: FALLBACK_CODE.into() }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.explanation == FALLBACK_EXPLANATION && self.code == FALLBACK_CODE
    }
}

/// Remove surrounding markdown fences from a provider response.
#[must_use]
pub fn strip_fences(text: &str) -> String {
    let mut cleaned = text.trim();
    for opener in ["```json", "```javascript", "```"] {
        if let Some(rest) = cleaned.strip_prefix(opener) {
            cleaned = rest;
            break;
        }
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    let cleaned = FENCE_OPEN_LINE.replace_all(cleaned, "");
    FENCE_CLOSE_LINE.replace_all(&cleaned, "").trim().to_owned()
}

/// Parse a provider response into a suggestion.
///
/// # Errors
///
/// Returns [`ParseError`] when the unfenced text is not a JSON object with
/// non-empty string `explanation` and `code` fields.
pub fn parse_suggestion(text: &str) -> Result<Suggestion, ParseError> {
    let cleaned = strip_fences(text);
    let raw: RawSuggestion = serde_json::from_str(&cleaned).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    match (raw.explanation, raw.code) {
        (Some(explanation), Some(code)) if !explanation.is_empty() && !code.is_empty() => {
            debug!(explanation_len = explanation.len(), code_len = code.len(), "suggestion: parsed");
            Ok(Suggestion { explanation, code })
        }
        _ => Err(ParseError::MissingField),
    }
}

/// Parse a provider response, substituting [`Suggestion::fallback`] on failure.
#[must_use]
pub fn suggestion_from_response(text: &str) -> Suggestion {
    parse_suggestion(text).unwrap_or_else(|error| {
        warn!(%error, raw = text, "suggestion: failed to parse AI response");
        Suggestion::fallback()
    })
}

#[cfg(test)]
#[path = "suggestion_test.rs"]
mod tests;
