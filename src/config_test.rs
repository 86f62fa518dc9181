use super::*;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers hold `ENV_LOCK` so no other test in this module touches the env concurrently.
unsafe fn clear_copilot_env() {
    unsafe {
        for key in [
            "COPILOT_UPDATE_INTERVAL_MS",
            "COPILOT_MIN_CHANGES",
            "COPILOT_SIGNIFICANT_RATIO",
            "COPILOT_MAX_RETRIES",
            "COPILOT_RESPONSE_HISTORY_CAP",
            "COPILOT_ACTION_HISTORY_CAP",
            "COPILOT_LOG_HISTORY_CAP",
            "COPILOT_ANALYSIS_HISTORY_CAP",
            "COPILOT_CUSTOM_PROMPT",
            "COPILOT_PROMPT_URL",
        ] {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn defaults_match_documented_values() {
    let cfg = CopilotConfig::default();
    assert_eq!(cfg.update_interval_ms, 20_000);
    assert_eq!(cfg.min_changes_threshold, 5);
    assert!((cfg.significant_change_ratio - 0.03).abs() < f64::EPSILON);
    assert_eq!(cfg.max_retries, 4);
    assert_eq!(cfg.response_history_cap, 10);
    assert_eq!(cfg.action_history_cap, 50);
    assert_eq!(cfg.log_history_cap, 20);
    assert!(cfg.custom_prompt.is_none());
    assert!(cfg.validate().is_ok());
}

#[test]
fn from_env_uses_defaults_when_unset() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_copilot_env() };
    assert_eq!(CopilotConfig::from_env().unwrap(), CopilotConfig::default());
}

#[test]
fn from_env_parses_overrides_and_ignores_garbage() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_copilot_env();
        std::env::set_var("COPILOT_UPDATE_INTERVAL_MS", "5000");
        std::env::set_var("COPILOT_MIN_CHANGES", "2");
        std::env::set_var("COPILOT_SIGNIFICANT_RATIO", "0.1");
        std::env::set_var("COPILOT_MAX_RETRIES", "not-a-number");
        std::env::set_var("COPILOT_CUSTOM_PROMPT", "Review {{projectData}}");
    }

    let cfg = CopilotConfig::from_env().unwrap();
    assert_eq!(cfg.update_interval_ms, 5000);
    assert_eq!(cfg.update_interval(), Duration::from_secs(5));
    assert_eq!(cfg.min_changes_threshold, 2);
    assert!((cfg.significant_change_ratio - 0.1).abs() < f64::EPSILON);
    assert_eq!(cfg.max_retries, DEFAULT_MAX_RETRIES);
    assert_eq!(cfg.custom_prompt.as_deref(), Some("Review {{projectData}}"));

    unsafe { clear_copilot_env() };
}

#[test]
fn from_env_rejects_invalid_prompt_url() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_copilot_env();
        std::env::set_var("COPILOT_PROMPT_URL", "ftp://prompts.test/p.txt");
    }
    assert!(matches!(CopilotConfig::from_env(), Err(ConfigError::InvalidPromptUrl(_))));
    unsafe { clear_copilot_env() };
}

#[test]
fn validate_rejects_zero_interval() {
    let cfg = CopilotConfig { update_interval_ms: 0, ..CopilotConfig::default() };
    assert_eq!(cfg.validate(), Err(ConfigError::Zero { field: "update_interval_ms" }));
}

#[test]
fn validate_rejects_zero_caps() {
    let cfg = CopilotConfig { log_history_cap: 0, ..CopilotConfig::default() };
    assert_eq!(cfg.validate(), Err(ConfigError::Zero { field: "log_history_cap" }));
}

#[test]
fn validate_rejects_ratio_out_of_range() {
    let cfg = CopilotConfig { significant_change_ratio: 1.5, ..CopilotConfig::default() };
    assert!(matches!(cfg.validate(), Err(ConfigError::RatioOutOfRange(_))));
}
