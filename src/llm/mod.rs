//! LLM — multi-provider adapter behind the [`AiProvider`] capability.
//!
//! DESIGN
//! ======
//! The `LlmClient` enum dispatches to Anthropic or `OpenAI` based on
//! `LLM_PROVIDER`. Every call is raced against the caller's cancellation
//! token so an abort resolves immediately instead of waiting on the network.

pub mod anthropic;
pub mod config;
pub mod openai;
pub mod types;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use config::{LlmConfig, LlmProviderKind};
pub use types::{AiProvider, Completion, LlmError, Usage};

// =============================================================================
// CLIENT DISPATCH
// =============================================================================

/// Concrete LLM client that dispatches to either Anthropic or OpenAI.
///
/// Configured from environment variables by [`LlmClient::from_env`].
pub struct LlmClient {
    inner: LlmProvider,
    model: String,
    max_tokens: u32,
}

enum LlmProvider {
    Anthropic(anthropic::AnthropicClient),
    OpenAi(openai::OpenAiClient),
}

impl LlmClient {
    /// Build an LLM client from environment variables. See [`LlmConfig::from_env`].
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client fails.
    pub fn from_env() -> Result<Self, LlmError> {
        let config = LlmConfig::from_env()?;
        Self::from_config(config)
    }

    /// Build an LLM client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider HTTP client fails to build.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        let inner = match config.provider {
            LlmProviderKind::Anthropic => {
                LlmProvider::Anthropic(anthropic::AnthropicClient::new(config.api_key, config.timeouts)?)
            }
            LlmProviderKind::OpenAi => LlmProvider::OpenAi(openai::OpenAiClient::new(
                config.api_key,
                config.openai_mode,
                config.openai_base_url,
                config.timeouts,
            )?),
        };
        Ok(Self { inner, model: config.model, max_tokens: config.max_tokens })
    }

    /// Return the configured model name (e.g. `"claude-sonnet-4-5-20250929"`).
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Return the provider name used in logs.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        match self.inner {
            LlmProvider::Anthropic(_) => "anthropic",
            LlmProvider::OpenAi(_) => "openai",
        }
    }

    async fn complete_inner(&self, prompt: &str) -> Result<Completion, LlmError> {
        match &self.inner {
            LlmProvider::Anthropic(c) => c.complete(&self.model, self.max_tokens, prompt).await,
            LlmProvider::OpenAi(c) => c.complete(&self.model, self.max_tokens, prompt).await,
        }
    }
}

#[async_trait::async_trait]
impl AiProvider for LlmClient {
    async fn generate(&self, prompt: &str, cancel: &CancellationToken) -> Result<Completion, LlmError> {
        until_cancelled(cancel, self.complete_inner(prompt)).await
    }
}

/// Resolve `fut`, or [`LlmError::Cancelled`] as soon as `cancel` fires.
///
/// # Errors
///
/// Propagates the future's error, or returns `Cancelled`.
pub async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(LlmError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn until_cancelled_passes_through_result() {
        let token = CancellationToken::new();
        let result = until_cancelled(&token, async { Ok::<_, LlmError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn until_cancelled_short_circuits_pending_call() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            child.cancel();
        });
        let result = until_cancelled(&token, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, LlmError>(())
        })
        .await;
        assert!(matches!(result, Err(LlmError::Cancelled)));
    }

    #[tokio::test]
    async fn until_cancelled_already_cancelled_never_polls() {
        let token = CancellationToken::new();
        token.cancel();
        let result = until_cancelled(&token, async { Ok::<_, LlmError>("late") }).await;
        assert!(matches!(result, Err(LlmError::Cancelled)));
    }
}
