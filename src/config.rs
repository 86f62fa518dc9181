//! Orchestrator configuration.
//!
//! DESIGN
//! ======
//! One typed struct with documented defaults, loaded from `COPILOT_*`
//! environment variables and validated before the orchestrator is built.
//! Unparseable values fall back to the default, matching the LLM config.

use std::time::Duration;

pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 20_000;
pub const DEFAULT_MIN_CHANGES_THRESHOLD: u32 = 5;
pub const DEFAULT_SIGNIFICANT_CHANGE_RATIO: f64 = 0.03;
pub const DEFAULT_MAX_RETRIES: u32 = 4;
pub const DEFAULT_RESPONSE_HISTORY_CAP: usize = 10;
pub const DEFAULT_ACTION_HISTORY_CAP: usize = 50;
pub const DEFAULT_LOG_HISTORY_CAP: usize = 20;
pub const DEFAULT_ANALYSIS_HISTORY_CAP: usize = 50;

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("significant_change_ratio must be within [0, 1], got {0}")]
    RatioOutOfRange(f64),
    #[error("prompt_url must be an http(s) URL, got {0:?}")]
    InvalidPromptUrl(String),
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CopilotConfig {
    /// Period of the background analysis tick.
    pub update_interval_ms: u64,
    /// Minimum host changes before a tick considers analysis.
    pub min_changes_threshold: u32,
    /// Fractional snapshot difference that counts as significant.
    pub significant_change_ratio: f64,
    /// Retries after the first attempt of every AI call.
    pub max_retries: u32,
    pub response_history_cap: usize,
    pub action_history_cap: usize,
    pub log_history_cap: usize,
    pub analysis_history_cap: usize,
    /// Inline prompt template; wins over `prompt_url`.
    pub custom_prompt: Option<String>,
    /// URL the prompt template is fetched from.
    pub prompt_url: Option<String>,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            min_changes_threshold: DEFAULT_MIN_CHANGES_THRESHOLD,
            significant_change_ratio: DEFAULT_SIGNIFICANT_CHANGE_RATIO,
            max_retries: DEFAULT_MAX_RETRIES,
            response_history_cap: DEFAULT_RESPONSE_HISTORY_CAP,
            action_history_cap: DEFAULT_ACTION_HISTORY_CAP,
            log_history_cap: DEFAULT_LOG_HISTORY_CAP,
            analysis_history_cap: DEFAULT_ANALYSIS_HISTORY_CAP,
            custom_prompt: None,
            prompt_url: None,
        }
    }
}

impl CopilotConfig {
    /// Build config from environment variables, defaults for anything unset.
    ///
    /// - `COPILOT_UPDATE_INTERVAL_MS`: default 20000
    /// - `COPILOT_MIN_CHANGES`: default 5
    /// - `COPILOT_SIGNIFICANT_RATIO`: default 0.03
    /// - `COPILOT_MAX_RETRIES`: default 4
    /// - `COPILOT_RESPONSE_HISTORY_CAP`: default 10
    /// - `COPILOT_ACTION_HISTORY_CAP`: default 50
    /// - `COPILOT_LOG_HISTORY_CAP`: default 20
    /// - `COPILOT_ANALYSIS_HISTORY_CAP`: default 50
    /// - `COPILOT_CUSTOM_PROMPT`, `COPILOT_PROMPT_URL`: unset by default
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the resulting values fail [`Self::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            update_interval_ms: env_parse("COPILOT_UPDATE_INTERVAL_MS", DEFAULT_UPDATE_INTERVAL_MS),
            min_changes_threshold: env_parse("COPILOT_MIN_CHANGES", DEFAULT_MIN_CHANGES_THRESHOLD),
            significant_change_ratio: env_parse("COPILOT_SIGNIFICANT_RATIO", DEFAULT_SIGNIFICANT_CHANGE_RATIO),
            max_retries: env_parse("COPILOT_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            response_history_cap: env_parse("COPILOT_RESPONSE_HISTORY_CAP", DEFAULT_RESPONSE_HISTORY_CAP),
            action_history_cap: env_parse("COPILOT_ACTION_HISTORY_CAP", DEFAULT_ACTION_HISTORY_CAP),
            log_history_cap: env_parse("COPILOT_LOG_HISTORY_CAP", DEFAULT_LOG_HISTORY_CAP),
            analysis_history_cap: env_parse("COPILOT_ANALYSIS_HISTORY_CAP", DEFAULT_ANALYSIS_HISTORY_CAP),
            custom_prompt: env_string("COPILOT_CUSTOM_PROMPT"),
            prompt_url: env_string("COPILOT_PROMPT_URL"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the orchestrator cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval_ms == 0 {
            return Err(ConfigError::Zero { field: "update_interval_ms" });
        }
        if !(0.0..=1.0).contains(&self.significant_change_ratio) {
            return Err(ConfigError::RatioOutOfRange(self.significant_change_ratio));
        }
        for (field, cap) in [
            ("response_history_cap", self.response_history_cap),
            ("action_history_cap", self.action_history_cap),
            ("log_history_cap", self.log_history_cap),
            ("analysis_history_cap", self.analysis_history_cap),
        ] {
            if cap == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if let Some(url) = &self.prompt_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidPromptUrl(url.clone()));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
