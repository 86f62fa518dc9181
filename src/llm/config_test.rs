use super::*;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers hold `ENV_LOCK` so no other test in this module touches the env concurrently.
unsafe fn clear_llm_env() {
    unsafe {
        std::env::remove_var("LLM_PROVIDER");
        std::env::remove_var("LLM_MODEL");
        std::env::remove_var("LLM_MAX_TOKENS");
        std::env::remove_var("LLM_API_KEY_ENV");
        std::env::remove_var("LLM_OPENAI_MODE");
        std::env::remove_var("LLM_OPENAI_BASE_URL");
        std::env::remove_var("LLM_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("LLM_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("DOCPILOT_TEST_KEY");
        std::env::remove_var("DOCPILOT_TEST_OPENAI_KEY");
    }
}

#[test]
fn from_env_defaults_to_anthropic() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_API_KEY_ENV", "DOCPILOT_TEST_KEY");
        std::env::set_var("DOCPILOT_TEST_KEY", "secret");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.provider, LlmProviderKind::Anthropic);
    assert_eq!(cfg.model, "claude-sonnet-4-5-20250929");
    assert_eq!(cfg.max_tokens, DEFAULT_LLM_MAX_TOKENS);
    assert_eq!(cfg.openai_mode, OpenAiApiMode::ChatCompletions);
    assert_eq!(cfg.openai_base_url, DEFAULT_OPENAI_BASE_URL);
    assert_eq!(cfg.timeouts, LlmTimeouts::default());
    assert_eq!(cfg.api_key, "secret");

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_parses_openai_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_PROVIDER", "gpt");
        std::env::set_var("LLM_API_KEY_ENV", "DOCPILOT_TEST_OPENAI_KEY");
        std::env::set_var("DOCPILOT_TEST_OPENAI_KEY", "sk-test");
        std::env::set_var("LLM_MAX_TOKENS", "512");
        std::env::set_var("LLM_OPENAI_MODE", "responses");
        std::env::set_var("LLM_OPENAI_BASE_URL", "https://example.test/v1/");
        std::env::set_var("LLM_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("LLM_CONNECT_TIMEOUT_SECS", "7");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.provider, LlmProviderKind::OpenAi);
    assert_eq!(cfg.model, "gpt-4o");
    assert_eq!(cfg.max_tokens, 512);
    assert_eq!(cfg.openai_mode, OpenAiApiMode::Responses);
    assert_eq!(cfg.openai_base_url, "https://example.test/v1");
    assert_eq!(cfg.timeouts, LlmTimeouts { request_secs: 42, connect_secs: 7 });

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_missing_key_var_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_llm_env() };
    let err = LlmConfig::from_env().unwrap_err();
    assert!(matches!(err, LlmError::MissingApiKey { var } if var == "LLM_API_KEY_ENV"));
}

#[test]
fn parse_provider_accepts_aliases() {
    assert_eq!(parse_provider(Some("claude")).unwrap(), LlmProviderKind::Anthropic);
    assert_eq!(parse_provider(Some("Anthropic")).unwrap(), LlmProviderKind::Anthropic);
    assert_eq!(parse_provider(Some("openai")).unwrap(), LlmProviderKind::OpenAi);
    assert_eq!(parse_provider(None).unwrap(), LlmProviderKind::Anthropic);
}

#[test]
fn parse_provider_rejects_unknown() {
    let err = parse_provider(Some("mistral")).unwrap_err();
    assert!(err.to_string().contains("unknown LLM_PROVIDER: mistral"));
}
