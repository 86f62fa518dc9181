//! Analysis scheduling — the "should I run?" gate and the background loops.
//!
//! DESIGN
//! ======
//! The gate is a pure function over the orchestrator state and a freshly
//! captured snapshot. The periodic loop ticks on a fixed interval with missed
//! ticks skipped, so a slow analysis never causes a burst of catch-up ticks;
//! a tick that finds an analysis in flight is a no-op.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::copilot::{AnalysisOutcome, Copilot};
use super::snapshot::{ChangeSnapshotTracker, Snapshot};
use crate::host::HostEvent;
use crate::state::OrchestratorState;

/// Why an analysis entry point did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A user prompt holds the call slot.
    UserPromptInProgress,
    /// A periodic analysis holds the call slot.
    AnalysisInProgress,
    BelowThreshold { changes: u32, min: u32 },
    NotSignificant,
    EmptyPrompt,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserPromptInProgress => f.write_str("a user prompt is being processed"),
            Self::AnalysisInProgress => f.write_str("an analysis is already in progress"),
            Self::BelowThreshold { changes, min } => write!(f, "{changes} changes, below the minimum of {min}"),
            Self::NotSignificant => f.write_str("changes are not significant"),
            Self::EmptyPrompt => f.write_str("the prompt is empty"),
        }
    }
}

/// Decide whether a periodic analysis should run now.
///
/// # Errors
///
/// Returns the [`SkipReason`] when it should not.
pub fn should_run(
    state: &OrchestratorState,
    tracker: &ChangeSnapshotTracker,
    current: &Snapshot,
    min_changes: u32,
) -> Result<(), SkipReason> {
    if state.processing_user_prompt {
        return Err(SkipReason::UserPromptInProgress);
    }
    if state.change_count < min_changes {
        return Err(SkipReason::BelowThreshold { changes: state.change_count, min: min_changes });
    }
    if !tracker.is_significant(state.last_snapshot.as_ref(), current) {
        return Err(SkipReason::NotSignificant);
    }
    Ok(())
}

// =============================================================================
// BACKGROUND TASKS
// =============================================================================

/// Spawn the periodic analysis loop.
pub fn spawn_analysis_task(copilot: Copilot, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; there is nothing to compare yet.
        ticker.tick().await;
        info!(period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX), "scheduler: periodic analysis started");

        loop {
            ticker.tick().await;
            match copilot.tick().await {
                AnalysisOutcome::Skipped(reason) => debug!(%reason, "scheduler: tick skipped"),
                outcome => info!(?outcome, "scheduler: tick finished"),
            }
        }
    })
}

/// Spawn the host-event pump. Ends when every sender is dropped.
pub fn spawn_event_pump(copilot: Copilot, mut events: mpsc::Receiver<HostEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            copilot.handle_host_event(&event);
        }
        info!("scheduler: host event channel closed");
    })
}

/// Handles for the background tasks started by [`Copilot::start`].
pub struct CopilotTasks {
    pub analysis: JoinHandle<()>,
    pub events: JoinHandle<()>,
}

impl CopilotTasks {
    /// Abort both tasks.
    pub fn shutdown(&self) {
        self.analysis.abort();
        self.events.abort();
        info!("scheduler: background tasks stopped");
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
