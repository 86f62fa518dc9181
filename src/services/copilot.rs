//! Copilot — the orchestrator tying host, history, prompts, and the AI call
//! lifecycle together.
//!
//! DESIGN
//! ======
//! Two channels compete for one AI call slot: the periodic analysis and the
//! user prompt. Each holds its flag in `OrchestratorState` for the whole call
//! and releases it through an RAII guard, so every exit path (success,
//! failure, cancellation, unwinding) clears it and wakes waiters.
//!
//! User intent wins. A user prompt claims its flag and its own call token
//! first, which blocks new ticks, then cancels an in-flight periodic call and
//! waits for its guard to release before issuing its own call. An abort during
//! that wait fires the user prompt's token, so it never reaches the provider.
//! A second user prompt while one is processing is rejected.
//!
//! LOCKING
//! =======
//! State sits behind a std mutex held only for short synchronous sections,
//! never across an await. Host reads happen outside the lock. Lock order is
//! state, then call token; nothing takes them the other way round.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::context::Context;
use super::history::HistoryCaps;
use super::prompt::{self, PromptConfigUpdate, PromptError, PromptManager};
use super::request::{RequestError, RequestManager, RequestStats, RetryPolicy};
use super::scheduler::{self, CopilotTasks, SkipReason};
use super::snapshot::{ChangeSnapshotTracker, Snapshot};
use super::suggestion::suggestion_from_response;
use crate::config::{ConfigError, CopilotConfig};
use crate::host::{DocumentHost, HostEvent};
use crate::llm::AiProvider;
use crate::sink::{ApplyReport, UiSink};
use crate::state::{
    Feedback, LogEntry, LogLevel, OrchestratorState, ResponseEntry, Suggestion, UserAction, now_ms,
};

const LOG_SOURCE: &str = "copilot";

/// Settled result of every public analysis entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Completed(Suggestion),
    /// Every attempt failed; carries the message shown to the user.
    Failed(String),
    Cancelled,
    Skipped(SkipReason),
}

#[derive(Debug, thiserror::Error)]
pub enum CopilotError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Periodic,
    UserPrompt,
}

/// Cancellation tokens of the channels that hold, or wait for, the call slot.
#[derive(Default)]
struct CallTokens {
    periodic: Option<CancellationToken>,
    user_prompt: Option<CancellationToken>,
}

impl CallTokens {
    fn slot(&mut self, channel: Channel) -> &mut Option<CancellationToken> {
        match channel {
            Channel::Periodic => &mut self.periodic,
            Channel::UserPrompt => &mut self.user_prompt,
        }
    }
}

// =============================================================================
// COPILOT
// =============================================================================

#[derive(Clone)]
pub struct Copilot {
    inner: Arc<Inner>,
}

struct Inner {
    config: CopilotConfig,
    host: Arc<dyn DocumentHost>,
    provider: Arc<dyn AiProvider>,
    sink: Arc<dyn UiSink>,
    tracker: ChangeSnapshotTracker,
    requests: RequestManager,
    prompts: PromptManager,
    state: Mutex<OrchestratorState>,
    call: Mutex<CallTokens>,
    /// Notified whenever a channel releases the slot.
    released: Notify,
}

impl Copilot {
    /// # Errors
    ///
    /// Returns [`CopilotError::Config`] when `config` fails validation, or
    /// [`CopilotError::Prompt`] when the prompt fetch client cannot be built.
    pub fn new(
        config: CopilotConfig,
        host: Arc<dyn DocumentHost>,
        provider: Arc<dyn AiProvider>,
        sink: Arc<dyn UiSink>,
    ) -> Result<Self, CopilotError> {
        config.validate()?;
        let prompts = PromptManager::new(config.custom_prompt.clone(), config.prompt_url.clone())?;
        let inner = Inner {
            tracker: ChangeSnapshotTracker::new(config.significant_change_ratio),
            requests: RequestManager::new(RetryPolicy::new(config.max_retries)),
            state: Mutex::new(OrchestratorState::new(HistoryCaps::from(&config))),
            prompts,
            config,
            host,
            provider,
            sink,
            call: Mutex::new(CallTokens::default()),
            released: Notify::new(),
        };
        Ok(Self { inner: Arc::new(inner) })
    }

    /// Spawn the periodic analysis loop and the host-event pump.
    #[must_use]
    pub fn start(&self, events: mpsc::Receiver<HostEvent>) -> CopilotTasks {
        CopilotTasks {
            analysis: scheduler::spawn_analysis_task(self.clone(), self.inner.config.update_interval()),
            events: scheduler::spawn_event_pump(self.clone(), events),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CopilotConfig {
        &self.inner.config
    }

    // =========================================================================
    // HOST EVENTS + LOGS
    // =========================================================================

    /// Fold one host event into the state. Tracking failures are logged and
    /// swallowed.
    pub fn handle_host_event(&self, event: &HostEvent) {
        let now = now_ms();
        let mut state = self.inner.lock_state();
        if let Err(error) = state.apply_host_event(event, now) {
            warn!(%error, "copilot: could not track host event");
            state.history.push_log(LogEntry {
                timestamp: now,
                level: LogLevel::Warn,
                message: format!("Action tracking failed: {error}"),
                source: LOG_SOURCE.into(),
            });
        }
    }

    /// Record a console-style log line; it is surfaced to the provider with
    /// the next interaction states.
    pub fn record_log(&self, level: LogLevel, message: impl Into<String>, source: impl Into<String>) {
        let entry = LogEntry { timestamp: now_ms(), level, message: message.into(), source: source.into() };
        match level {
            LogLevel::Error => error!(source = %entry.source, message = %entry.message, "host log"),
            LogLevel::Warn => warn!(source = %entry.source, message = %entry.message, "host log"),
            LogLevel::Log | LogLevel::Info => info!(source = %entry.source, message = %entry.message, "host log"),
        }
        self.inner.lock_state().history.push_log(entry);
    }

    /// Record the outcome of applying a suggestion's code. A user-prompt
    /// result re-anchors the change tracking so its own edits do not trigger
    /// an immediate re-analysis.
    pub fn report_apply(&self, report: &ApplyReport) {
        let snapshot = report.is_user_prompt_result().then(|| self.inner.capture_snapshot());
        let (level, message) = match report {
            ApplyReport::Succeeded { .. } => (LogLevel::Log, "AI code executed successfully".to_owned()),
            ApplyReport::Failed { error, .. } => (LogLevel::Error, format!("Code execution failed: {error}")),
        };
        self.record_log(level, message, LOG_SOURCE);

        if let Some(snapshot) = snapshot {
            let mut state = self.inner.lock_state();
            state.change_count = 0;
            state.last_snapshot = Some(snapshot);
            debug!("copilot: change tracking reset after user prompt result");
        }
    }

    // =========================================================================
    // ANALYSIS ENTRY POINTS
    // =========================================================================

    /// Whether a periodic analysis would run now.
    #[must_use]
    pub fn should_run(&self) -> bool {
        let current = self.inner.capture_snapshot();
        let state = self.inner.lock_state();
        scheduler::should_run(&state, &self.inner.tracker, &current, self.inner.config.min_changes_threshold).is_ok()
    }

    /// One periodic tick: run an analysis if the gate allows it.
    pub async fn tick(&self) -> AnalysisOutcome {
        let current = self.inner.capture_snapshot();
        {
            let state = self.inner.lock_state();
            if state.analyzing {
                return AnalysisOutcome::Skipped(SkipReason::AnalysisInProgress);
            }
            let min = self.inner.config.min_changes_threshold;
            if let Err(reason) = scheduler::should_run(&state, &self.inner.tracker, &current, min) {
                return AnalysisOutcome::Skipped(reason);
            }
        }
        self.run_periodic().await
    }

    /// Manual refresh: bypass the change gates, still honoring the call slot.
    pub async fn force_analysis(&self) -> AnalysisOutcome {
        {
            let mut state = self.inner.lock_state();
            state.change_count = self.inner.config.min_changes_threshold;
        }
        info!("copilot: forced analysis");
        self.run_periodic().await
    }

    /// Answer an explicit user request, preempting a periodic analysis.
    pub async fn handle_user_prompt(&self, text: &str) -> AnalysisOutcome {
        let text = text.trim();
        if text.is_empty() {
            return AnalysisOutcome::Skipped(SkipReason::EmptyPrompt);
        }
        let token = {
            let mut state = self.inner.lock_state();
            if state.processing_user_prompt {
                info!("copilot: user prompt rejected; another is processing");
                return AnalysisOutcome::Skipped(SkipReason::UserPromptInProgress);
            }
            state.processing_user_prompt = true;
            self.inner.claim_call(Channel::UserPrompt)
        };
        let _slot = SlotGuard { inner: &self.inner, channel: Channel::UserPrompt };
        info!(prompt = text, "copilot: user prompt received");

        if !self.wait_for_periodic(&token).await {
            info!("copilot: user prompt cancelled before its call started");
            return AnalysisOutcome::Cancelled;
        }

        let document = self.inner.host.serialized_state();
        let context = Context::build(document, &self.inner.lock_state().history, Some(text));
        let _loading = self.inner.begin_loading();
        self.perform(context, Some(text.to_owned()), &token).await
    }

    /// Cancel whichever AI call is in flight. Returns whether one was.
    pub fn abort_current_request(&self) -> bool {
        let slot = self.inner.cancel_call();
        let request = self.inner.requests.cancel();
        if slot || request {
            info!("copilot: current request aborted");
        }
        slot || request
    }

    async fn run_periodic(&self) -> AnalysisOutcome {
        let document = self.inner.host.serialized_state();
        let (context, token) = {
            let mut state = self.inner.lock_state();
            if state.processing_user_prompt {
                return AnalysisOutcome::Skipped(SkipReason::UserPromptInProgress);
            }
            if state.analyzing {
                return AnalysisOutcome::Skipped(SkipReason::AnalysisInProgress);
            }
            state.analyzing = true;
            let context = Context::build(document, &state.history, None);
            (context, self.inner.claim_call(Channel::Periodic))
        };
        let _slot = SlotGuard { inner: &self.inner, channel: Channel::Periodic };
        let _loading = self.inner.begin_loading();
        self.perform(context, None, &token).await
    }

    /// Cancel an in-flight periodic call and wait until it has released the
    /// slot. Returns `false` if `token` fires first.
    async fn wait_for_periodic(&self, token: &CancellationToken) -> bool {
        loop {
            let released = self.inner.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            if token.is_cancelled() {
                return false;
            }
            let analyzing = self.inner.lock_state().analyzing;
            if !analyzing {
                return true;
            }
            info!("copilot: user prompt preempting periodic analysis");
            self.inner.cancel_slot(Channel::Periodic);
            tokio::select! {
                biased;
                () = token.cancelled() => return false,
                () = released.as_mut() => {}
            }
        }
    }

    async fn perform(&self, context: Context, user_prompt: Option<String>, token: &CancellationToken) -> AnalysisOutcome {
        let is_user_prompt = user_prompt.is_some();
        let template = tokio::select! {
            biased;
            () = token.cancelled() => {
                info!(user_prompt = is_user_prompt, "copilot: analysis cancelled while loading the prompt");
                return AnalysisOutcome::Cancelled;
            }
            template = self.inner.prompts.template() => template,
        };
        let result = self
            .inner
            .requests
            .execute_linked(self.inner.provider.as_ref(), &context, |ctx| prompt::render(&template, ctx), token)
            .await;

        match result {
            Err(RequestError::Cancelled) => {
                info!(user_prompt = is_user_prompt, "copilot: analysis cancelled");
                AnalysisOutcome::Cancelled
            }
            Ok(completion) => {
                let suggestion = suggestion_from_response(&completion.text);
                let snapshot = self.inner.capture_snapshot();
                {
                    let mut state = self.inner.lock_state();
                    let entry = ResponseEntry::new(context, suggestion.clone(), user_prompt, now_ms());
                    state.history.push_response(entry);
                    state.change_count = 0;
                    state.last_snapshot = Some(snapshot);
                }
                info!(user_prompt = is_user_prompt, fallback = suggestion.is_fallback(), "copilot: suggestion ready");
                self.inner.sink.on_suggestion_updated(&suggestion, is_user_prompt);
                AnalysisOutcome::Completed(suggestion)
            }
            Err(err) => {
                let message = err.to_string();
                let snapshot = self.inner.capture_snapshot();
                {
                    let mut state = self.inner.lock_state();
                    state.history.push_log(LogEntry {
                        timestamp: now_ms(),
                        level: LogLevel::Error,
                        message: format!("AI analysis failed: {message}"),
                        source: LOG_SOURCE.into(),
                    });
                    state.change_count = 0;
                    state.last_snapshot = Some(snapshot);
                }
                error!(error = %message, user_prompt = is_user_prompt, "copilot: analysis failed");
                self.inner.sink.on_error(&message);
                AnalysisOutcome::Failed(message)
            }
        }
    }

    // =========================================================================
    // PROMPT CONFIGURATION
    // =========================================================================

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPromptUrl`] for a non-http(s) URL; nothing
    /// is changed in that case.
    pub fn update_prompt_configuration(&self, update: PromptConfigUpdate) -> Result<(), ConfigError> {
        if let Some(Some(url)) = &update.prompt_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidPromptUrl(url.clone()));
            }
        }
        self.inner.prompts.update_configuration(update);
        info!("copilot: prompt configuration updated");
        Ok(())
    }

    /// Re-resolve the prompt template and return it.
    pub async fn reload_prompt(&self) -> String {
        self.inner.prompts.reload().await
    }

    // =========================================================================
    // HISTORY + FEEDBACK
    // =========================================================================

    /// Attach feedback to a stored response. Returns `false` for an unknown id.
    pub fn record_feedback(&self, response_id: &str, feedback: Feedback) -> bool {
        let attached = self.inner.lock_state().history.attach_feedback(response_id, feedback);
        if !attached {
            warn!(response_id, "copilot: feedback for unknown response");
        }
        attached
    }

    pub fn clear_feedback(&self) {
        self.inner.lock_state().history.clear_feedback();
    }

    pub fn clear_response_history(&self) {
        self.inner.lock_state().history.clear_responses();
    }

    /// Responses, most recent first.
    #[must_use]
    pub fn response_history(&self) -> Vec<ResponseEntry> {
        self.inner.lock_state().history.responses().iter().cloned().collect()
    }

    /// Every completed response, oldest first.
    #[must_use]
    pub fn analysis_history(&self) -> Vec<ResponseEntry> {
        self.inner.lock_state().history.analyses().iter().cloned().collect()
    }

    #[must_use]
    pub fn actions(&self) -> Vec<UserAction> {
        self.inner.lock_state().history.actions().iter().cloned().collect()
    }

    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        self.inner.lock_state().history.logs().iter().cloned().collect()
    }

    #[must_use]
    pub fn request_stats(&self) -> RequestStats {
        self.inner.requests.stats()
    }

    pub fn reset_request_stats(&self) {
        self.inner.requests.reset_stats();
    }

    #[must_use]
    pub fn change_count(&self) -> u32 {
        self.inner.lock_state().change_count
    }

    #[must_use]
    pub fn last_snapshot(&self) -> Option<Snapshot> {
        self.inner.lock_state().last_snapshot.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.lock_state().loading
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.lock_state().is_busy()
    }
}

// =============================================================================
// INNER
// =============================================================================

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, OrchestratorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_call(&self) -> MutexGuard<'_, CallTokens> {
        self.call.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn capture_snapshot(&self) -> Snapshot {
        self.tracker
            .snapshot(&self.host.markup(), &self.host.style_sheet(), self.host.component_count())
    }

    fn claim_call(&self, channel: Channel) -> CancellationToken {
        let token = CancellationToken::new();
        *self.lock_call().slot(channel) = Some(token.clone());
        token
    }

    fn cancel_slot(&self, channel: Channel) -> bool {
        match self.lock_call().slot(channel).as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every channel's token, including a user prompt still waiting
    /// for the slot.
    fn cancel_call(&self) -> bool {
        let periodic = self.cancel_slot(Channel::Periodic);
        let user_prompt = self.cancel_slot(Channel::UserPrompt);
        periodic || user_prompt
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        self.lock_state().loading = true;
        self.sink.on_loading_changed(true);
        LoadingGuard { inner: self }
    }
}

/// Releases a channel's flag and call token, then wakes waiters.
struct SlotGuard<'a> {
    inner: &'a Inner,
    channel: Channel,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.inner.lock_state();
            match self.channel {
                Channel::Periodic => state.analyzing = false,
                Channel::UserPrompt => state.processing_user_prompt = false,
            }
        }
        *self.inner.lock_call().slot(self.channel) = None;
        self.inner.released.notify_waiters();
    }
}

struct LoadingGuard<'a> {
    inner: &'a Inner,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.inner.lock_state().loading = false;
        self.inner.sink.on_loading_changed(false);
    }
}

#[cfg(test)]
#[path = "copilot_test.rs"]
mod tests;
