use super::*;

// ===== chat completions =====

#[test]
fn cc_parse_text_response() {
    let json = serde_json::json!({
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": "Hello!" },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5 }
    })
    .to_string();
    let resp = parse_chat_completions_response(&json).unwrap();
    assert_eq!(resp.text, "Hello!");
    assert_eq!(resp.model, "gpt-4o");
    assert_eq!(resp.usage, Some(Usage { input_tokens: 10, output_tokens: 5 }));
}

#[test]
fn cc_parse_missing_choices() {
    let json = serde_json::json!({ "model": "gpt-4o", "choices": [] }).to_string();
    assert!(parse_chat_completions_response(&json).is_err());
}

#[test]
fn cc_parse_null_content_is_error() {
    let json = serde_json::json!({
        "model": "gpt-4o",
        "choices": [{ "message": { "role": "assistant", "content": null } }]
    })
    .to_string();
    assert!(matches!(parse_chat_completions_response(&json), Err(LlmError::ApiParse(_))));
}

// ===== responses API =====

#[test]
fn resp_parse_text_response() {
    let json = serde_json::json!({
        "model": "gpt-4o",
        "output": [{
            "type": "message",
            "content": [{ "type": "output_text", "text": "Done!" }]
        }],
        "usage": { "input_tokens": 15, "output_tokens": 8 }
    })
    .to_string();
    let resp = parse_responses_response(&json).unwrap();
    assert_eq!(resp.text, "Done!");
    assert_eq!(resp.usage, Some(Usage { input_tokens: 15, output_tokens: 8 }));
}

#[test]
fn resp_parse_output_text_fallback() {
    let json = serde_json::json!({
        "model": "gpt-4o",
        "output_text": "Fallback text"
    })
    .to_string();
    let resp = parse_responses_response(&json).unwrap();
    assert_eq!(resp.text, "Fallback text");
    assert!(resp.usage.is_none());
}

#[test]
fn resp_parse_skips_reasoning_items() {
    let json = serde_json::json!({
        "model": "gpt-4o",
        "output": [
            { "type": "reasoning", "summary": [] },
            { "type": "message", "content": [{ "type": "output_text", "text": "ok" }] }
        ]
    })
    .to_string();
    assert_eq!(parse_responses_response(&json).unwrap().text, "ok");
}

#[test]
fn resp_parse_empty_output_is_error() {
    let json = serde_json::json!({ "model": "gpt-4o", "output": [] }).to_string();
    assert!(parse_responses_response(&json).is_err());
}
