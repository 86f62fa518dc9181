//! Anthropic Messages API client.
//!
//! Thin HTTP wrapper for `/v1/messages`. Pure parsing in `parse_response`
//! for testability.

use std::time::Duration;

use super::config::LlmTimeouts;
use super::types::{Completion, LlmError, Usage};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

// =============================================================================
// CLIENT
// =============================================================================

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, timeouts: LlmTimeouts) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key })
    }

    pub async fn complete(&self, model: &str, max_tokens: u32, prompt: &str) -> Result<Completion, LlmError> {
        let messages = [ApiMessage { role: "user", content: prompt }];
        let body = ApiRequest { model, max_tokens, messages: &messages };

        let response = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
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

        parse_response(&text)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(serde::Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [ApiMessage<'a>],
}

#[derive(serde::Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(serde::Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
    model: String,
    usage: Option<ApiUsage>,
}

#[derive(serde::Deserialize)]
#[serde(tag = "type")]
enum ApiContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(serde::Deserialize)]
struct ApiUsage {
    input_tokens: u64,
    output_tokens: u64,
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_response(json: &str) -> Result<Completion, LlmError> {
    let api: ApiResponse = serde_json::from_str(json).map_err(|e| LlmError::ApiParse(e.to_string()))?;

    let text: Vec<String> = api
        .content
        .into_iter()
        .filter_map(|block| match block {
            ApiContentBlock::Text { text } => Some(text),
            ApiContentBlock::Other => None,
        })
        .collect();
    if text.is_empty() {
        return Err(LlmError::ApiParse("messages: response has no text content".to_string()));
    }

    Ok(Completion {
        text: text.join("\n"),
        model: api.model,
        usage: api
            .usage
            .map(|u| Usage { input_tokens: u.input_tokens, output_tokens: u.output_tokens }),
    })
}

#[cfg(test)]
#[path = "anthropic_test.rs"]
mod tests;
