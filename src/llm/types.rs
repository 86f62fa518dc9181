//! LLM types — provider-neutral completion type, errors, and the capability
//! trait the orchestrator calls.
//!
//! Shared by the Anthropic and `OpenAI` clients. The orchestrator only ever
//! sees [`AiProvider`]; tests swap in scripted implementations.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by LLM client operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The required API key environment variable is not set.
    #[error("missing API key: env var {var} not set")]
    MissingApiKey { var: String },

    /// The HTTP request to the LLM provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The LLM provider returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The LLM provider response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The call observed its cancellation token before completing.
    #[error("request was cancelled")]
    Cancelled,
}

impl LlmError {
    /// Stable machine-readable code, recorded as the `kind` of a failed attempt.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::MissingApiKey { .. } => "E_MISSING_API_KEY",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Cancelled => "E_CANCELLED",
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// =============================================================================
// COMPLETION
// =============================================================================

/// Token usage as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Text produced by one provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    /// `None` when the provider did not report usage; callers estimate instead.
    pub usage: Option<Usage>,
}

impl Completion {
    /// Completion without provider-reported usage.
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), model: String::new(), usage: None }
    }
}

// =============================================================================
// AI PROVIDER TRAIT
// =============================================================================

/// The external AI-call capability: one prompt in, one completion out.
///
/// Implementations must honor `cancel`: once it fires, an in-flight call
/// should resolve with [`LlmError::Cancelled`] instead of waiting for the
/// network.
#[async_trait::async_trait]
pub trait AiProvider: Send + Sync {
    /// Generate a completion for `prompt`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Cancelled`] when `cancel` fires, or any other
    /// [`LlmError`] when the request fails or the response is malformed.
    async fn generate(&self, prompt: &str, cancel: &CancellationToken) -> Result<Completion, LlmError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
