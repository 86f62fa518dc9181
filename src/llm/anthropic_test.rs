use super::*;

fn make_response(content: serde_json::Value) -> String {
    serde_json::json!({
        "id": "msg_123",
        "type": "message",
        "role": "assistant",
        "content": content,
        "model": "claude-sonnet-4-5-20250929",
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 100, "output_tokens": 50 }
    })
    .to_string()
}

#[test]
fn parse_text_response() {
    let json = make_response(serde_json::json!([
        { "type": "text", "text": "{\"explanation\":\"x\",\"code\":\"y\"}" }
    ]));
    let resp = parse_response(&json).unwrap();
    assert_eq!(resp.text, "{\"explanation\":\"x\",\"code\":\"y\"}");
    assert_eq!(resp.model, "claude-sonnet-4-5-20250929");
    assert_eq!(resp.usage, Some(Usage { input_tokens: 100, output_tokens: 50 }));
}

#[test]
fn parse_joins_multiple_text_blocks() {
    let json = make_response(serde_json::json!([
        { "type": "text", "text": "first" },
        { "type": "text", "text": "second" }
    ]));
    let resp = parse_response(&json).unwrap();
    assert_eq!(resp.text, "first\nsecond");
}

#[test]
fn parse_unknown_content_filtered() {
    let json = make_response(serde_json::json!([
        { "type": "thinking", "thinking": "hmm" },
        { "type": "text", "text": "hi" }
    ]));
    let resp = parse_response(&json).unwrap();
    assert_eq!(resp.text, "hi");
}

#[test]
fn parse_without_text_is_error() {
    let json = make_response(serde_json::json!([{ "type": "thinking", "thinking": "hmm" }]));
    assert!(matches!(parse_response(&json), Err(LlmError::ApiParse(_))));
}

#[test]
fn parse_missing_usage_is_none() {
    let json = serde_json::json!({
        "content": [{ "type": "text", "text": "ok" }],
        "model": "claude-sonnet-4-5-20250929"
    })
    .to_string();
    let resp = parse_response(&json).unwrap();
    assert!(resp.usage.is_none());
}

#[test]
fn parse_invalid_json() {
    assert!(matches!(parse_response("not json"), Err(LlmError::ApiParse(_))));
}
