//! AI request lifecycle — retries with exponential backoff and cancellation.
//!
//! DESIGN
//! ======
//! Each `execute` call gets a fresh `CancellationToken` that becomes the
//! manager's live token. The token is checked before every attempt, passed to
//! the provider, and raced against the backoff sleep, so `cancel()` resolves
//! a waiting call immediately. Cancellation is never retried.
//!
//! Retries re-render the prompt from a private working copy of the caller's
//! context with every previous failure appended, so the provider can see what
//! went wrong. The caller's context is never mutated.
//!
//! Live token and stats sit behind std mutexes that are never held across an
//! await point.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::context::{AttemptFailure, Context};
use crate::config::DEFAULT_MAX_RETRIES;
use crate::llm::{AiProvider, Completion, LlmError};
use crate::state::now_ms;

pub const BASE_RETRY_DELAY_MS: u64 = 1_000;
pub const MAX_RETRY_DELAY_MS: u64 = 10_000;
/// Error records kept in [`RequestStats::errors`].
pub const MAX_RECORDED_ERRORS: usize = 10;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum RequestError {
    #[error("AI request was cancelled")]
    Cancelled,
    #[error("AI request failed after {attempts} attempts. Last error: {last}")]
    Exhausted { attempts: u32, last: LlmError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(BASE_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(MAX_RETRY_DELAY_MS),
        }
    }

    /// Total attempts, including the first.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait after the failed 0-based `attempt`: `min(base * 2^attempt, max)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// One failed attempt, as kept in the stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    pub timestamp: i64,
    pub message: String,
    pub kind: String,
}

/// Cumulative per-manager counters. Reset only on request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStats {
    pub total_requests: u64,
    pub total_retries: u64,
    pub total_tokens_used: u64,
    /// Most recent failures, oldest first, at most [`MAX_RECORDED_ERRORS`].
    pub errors: Vec<ErrorRecord>,
}

impl RequestStats {
    fn record_error(&mut self, record: ErrorRecord) {
        self.total_retries += 1;
        self.errors.push(record);
        if self.errors.len() > MAX_RECORDED_ERRORS {
            let excess = self.errors.len() - MAX_RECORDED_ERRORS;
            self.errors.drain(..excess);
        }
    }
}

/// Rough token count for providers that do not report usage.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

// =============================================================================
// MANAGER
// =============================================================================

pub struct RequestManager {
    policy: RetryPolicy,
    live: Mutex<Option<(u64, CancellationToken)>>,
    generation: AtomicU64,
    stats: Mutex<RequestStats>,
}

impl RequestManager {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, live: Mutex::new(None), generation: AtomicU64::new(0), stats: Mutex::new(RequestStats::default()) }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run one AI call to completion, retrying transient failures.
    ///
    /// `render` turns a context into the prompt text; it is called once per
    /// attempt.
    ///
    /// # Errors
    ///
    /// [`RequestError::Cancelled`] when the live token fires or the provider
    /// reports cancellation; [`RequestError::Exhausted`] wrapping the last
    /// provider error once every attempt has failed.
    pub async fn execute<R>(
        &self,
        provider: &dyn AiProvider,
        context: &Context,
        render: R,
    ) -> Result<Completion, RequestError>
    where
        R: Fn(&Context) -> String,
    {
        self.execute_linked(provider, context, render, &CancellationToken::new()).await
    }

    /// Like [`Self::execute`], but the call's token is a child of `parent`, so
    /// cancelling `parent` (even before the call starts) cancels the call.
    ///
    /// # Errors
    ///
    /// Same as [`Self::execute`].
    pub async fn execute_linked<R>(
        &self,
        provider: &dyn AiProvider,
        context: &Context,
        render: R,
        parent: &CancellationToken,
    ) -> Result<Completion, RequestError>
    where
        R: Fn(&Context) -> String,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = parent.child_token();
        *self.live() = Some((generation, token.clone()));
        let _live = LiveTokenGuard { manager: self, generation };

        self.stats_guard().total_requests += 1;
        let attempts = self.policy.attempts();
        let mut working = context.clone();
        let mut attempt: u32 = 0;

        loop {
            if token.is_cancelled() {
                info!(attempt = attempt + 1, "request: cancelled before attempt");
                return Err(RequestError::Cancelled);
            }

            let prompt = render(&working);
            match provider.generate(&prompt, &token).await {
                Ok(completion) => {
                    let tokens = completion.usage.map_or_else(
                        || estimate_tokens(&prompt) + estimate_tokens(&completion.text),
                        |usage| usage.total(),
                    );
                    self.stats_guard().total_tokens_used += tokens;
                    info!(attempt = attempt + 1, tokens, model = %completion.model, "request: succeeded");
                    return Ok(completion);
                }
                Err(error) if error.is_cancelled() => {
                    info!(attempt = attempt + 1, "request: cancelled during attempt");
                    return Err(RequestError::Cancelled);
                }
                Err(error) => {
                    let timestamp = now_ms();
                    let failure = AttemptFailure {
                        message: error.to_string(),
                        kind: error.error_code().to_owned(),
                        timestamp,
                        attempt: attempt + 1,
                    };
                    self.stats_guard().record_error(ErrorRecord {
                        attempt: failure.attempt,
                        timestamp,
                        message: failure.message.clone(),
                        kind: failure.kind.clone(),
                    });
                    working.previous_errors.push(failure);

                    if attempt + 1 >= attempts {
                        warn!(attempts, error = %error, "request: attempts exhausted");
                        return Err(RequestError::Exhausted { attempts, last: error });
                    }

                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "request: attempt failed; retrying"
                    );
                    tokio::select! {
                        biased;
                        () = token.cancelled() => {
                            info!(attempt = attempt + 1, "request: cancelled during backoff");
                            return Err(RequestError::Cancelled);
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Cancel the live call, if any. Returns whether there was one.
    pub fn cancel(&self) -> bool {
        match self.live().take() {
            Some((_, token)) => {
                token.cancel();
                info!("request: cancellation requested");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn has_active_request(&self) -> bool {
        self.live().is_some()
    }

    #[must_use]
    pub fn stats(&self) -> RequestStats {
        self.stats_guard().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats_guard() = RequestStats::default();
    }

    fn live(&self) -> MutexGuard<'_, Option<(u64, CancellationToken)>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats_guard(&self) -> MutexGuard<'_, RequestStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RequestManager {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

/// Clears the live token on every exit path of `execute`, unless a newer call
/// has already replaced it.
struct LiveTokenGuard<'a> {
    manager: &'a RequestManager,
    generation: u64,
}

impl Drop for LiveTokenGuard<'_> {
    fn drop(&mut self) {
        let mut live = self.manager.live();
        if live.as_ref().is_some_and(|(g, _)| *g == self.generation) {
            *live = None;
        }
    }
}

#[cfg(test)]
#[path = "request_test.rs"]
mod tests;
