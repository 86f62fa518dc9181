//! OpenAI-compatible API client.
//!
//! Supports both `/v1/chat/completions` and `/v1/responses` endpoints.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::config::{LlmTimeouts, OpenAiApiMode};
use super::types::{Completion, LlmError, Usage};

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    mode: OpenAiApiMode,
}

impl OpenAiClient {
    pub fn new(
        api_key: String,
        mode: OpenAiApiMode,
        base_url: String,
        timeouts: LlmTimeouts,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key, base_url: base_url.trim_end_matches('/').to_string(), mode })
    }

    pub async fn complete(&self, model: &str, max_tokens: u32, prompt: &str) -> Result<Completion, LlmError> {
        match self.mode {
            OpenAiApiMode::ChatCompletions => {
                let messages = [CcMessage { role: "user", content: prompt }];
                let body = CcRequest { model, max_tokens, messages: &messages };
                let text = self.send_json("/chat/completions", &body).await?;
                parse_chat_completions_response(&text)
            }
            OpenAiApiMode::Responses => {
                let body = RespRequest { model, max_output_tokens: max_tokens, input: prompt };
                let text = self.send_json("/responses", &body).await?;
                parse_responses_response(&text)
            }
        }
    }

    async fn send_json(&self, path: &str, body: &impl Serialize) -> Result<String, LlmError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;
        if status != 200 {
            return Err(LlmError::ApiResponse { status, body: text });
        }
        Ok(text)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct CcRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [CcMessage<'a>],
}

#[derive(Serialize)]
struct CcMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct RespRequest<'a> {
    model: &'a str,
    max_output_tokens: u32,
    input: &'a str,
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

fn usage_from(root: &Value, input_key: &str, output_key: &str) -> Option<Usage> {
    let usage = root.get("usage")?;
    Some(Usage {
        input_tokens: usage.get(input_key).and_then(Value::as_u64).unwrap_or(0),
        output_tokens: usage.get(output_key).and_then(Value::as_u64).unwrap_or(0),
    })
}

fn model_from(root: &Value) -> String {
    root.get("model")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default()
}

pub(crate) fn parse_chat_completions_response(json_text: &str) -> Result<Completion, LlmError> {
    let root: Value = serde_json::from_str(json_text).map_err(|e| LlmError::ApiParse(e.to_string()))?;

    let Some(choice) = root
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
    else {
        return Err(LlmError::ApiParse("chat_completions: missing choices[0]".to_string()));
    };
    let Some(text) = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
    else {
        return Err(LlmError::ApiParse("chat_completions: missing message content".to_string()));
    };

    Ok(Completion {
        text: text.to_string(),
        model: model_from(&root),
        usage: usage_from(&root, "prompt_tokens", "completion_tokens"),
    })
}

pub(crate) fn parse_responses_response(json_text: &str) -> Result<Completion, LlmError> {
    let root: Value = serde_json::from_str(json_text).map_err(|e| LlmError::ApiParse(e.to_string()))?;

    let mut parts = Vec::new();
    if let Some(items) = root.get("output").and_then(Value::as_array) {
        for item in items {
            if item.get("type").and_then(Value::as_str) != Some("message") {
                continue;
            }
            let Some(content) = item.get("content").and_then(Value::as_array) else {
                continue;
            };
            for part in content {
                let kind = part.get("type").and_then(Value::as_str);
                let text = part.get("text").and_then(Value::as_str).unwrap_or("");
                if matches!(kind, Some("output_text" | "text")) && !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
        }
    } else if let Some(output_text) = root.get("output_text").and_then(Value::as_str) {
        if !output_text.is_empty() {
            parts.push(output_text.to_string());
        }
    }

    if parts.is_empty() {
        return Err(LlmError::ApiParse("responses: no output text".to_string()));
    }

    Ok(Completion {
        text: parts.join("\n"),
        model: model_from(&root),
        usage: usage_from(&root, "input_tokens", "output_tokens"),
    })
}

#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;
