//! OpenAI-compatible chat-completions client.
//!
//! Works with any endpoint following the OpenAI wire contract. One
//! blocking round trip per call — the engine's only long suspension point.

use async_trait::async_trait;

use delta_domain::tool::ToolCallRequest;
use delta_domain::{Error, Result};

use crate::traits::{LlmClient, LlmResponse, Usage};
use crate::{API_KEY_ENV, BASE_URL_ENV, DEFAULT_BASE_URL};

pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatClient {
    /// Build a client from the environment. Fails fast when the API key
    /// variable is unset or empty.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::ApiKey(API_KEY_ENV.into()))?;
        let base_url = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());
        Ok(Self::new(base_url, api_key))
    }

    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .expect("reqwest client");
        Self {
            client,
            base_url: {
                let mut u: String = base_url.into();
                while u.ends_with('/') {
                    u.pop();
                }
                u
            },
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn call(&self, payload: &serde_json::Value) -> Result<LlmResponse> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Llm {
                message: format!("request failed: {e}"),
                status: e.status().map(|s| s.as_u16()),
                kind: Some("network".into()),
            })?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|e| Error::Llm {
            message: format!("reading response body: {e}"),
            status: Some(status.as_u16()),
            kind: Some("protocol".into()),
        })?;

        if !status.is_success() {
            return Err(upstream_error(status.as_u16(), &body));
        }

        parse_response(body)
    }
}

fn upstream_error(status: u16, body: &serde_json::Value) -> Error {
    let message = body
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .unwrap_or("upstream error")
        .to_string();
    let kind = body
        .pointer("/error/type")
        .and_then(|v| v.as_str())
        .map(String::from);
    Error::Llm {
        message,
        status: Some(status),
        kind,
    }
}

/// Normalize a tool-call argument string. Some providers emit
/// `"undefined"` / `"null"` / empty for zero-parameter tools.
fn parse_arguments(raw: &str) -> serde_json::Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "undefined" || trimmed == "null" {
        return serde_json::Value::Object(Default::default());
    }
    match serde_json::from_str(trimmed) {
        Ok(serde_json::Value::Object(map)) => serde_json::Value::Object(map),
        Ok(_) | Err(_) => {
            tracing::warn!(arguments = raw, "tool-call arguments are not a JSON object");
            serde_json::Value::Object(Default::default())
        }
    }
}

/// Parse the first choice of a chat-completion body.
pub fn parse_response(body: serde_json::Value) -> Result<LlmResponse> {
    let message = body
        .pointer("/choices/0/message")
        .ok_or_else(|| Error::Llm {
            message: "response has no choices".into(),
            status: None,
            kind: Some("protocol".into()),
        })?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .map(String::from);

    let raw_tool_calls = message.get("tool_calls").filter(|v| !v.is_null()).cloned();
    let mut tool_calls = Vec::new();
    if let Some(calls) = raw_tool_calls.as_ref().and_then(|v| v.as_array()) {
        for call in calls {
            let id = call
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let name = call
                .pointer("/function/name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let arguments = match call.pointer("/function/arguments") {
                Some(serde_json::Value::String(s)) => parse_arguments(s),
                Some(v @ serde_json::Value::Object(_)) => v.clone(),
                _ => serde_json::Value::Object(Default::default()),
            };
            tool_calls.push(ToolCallRequest {
                id,
                name,
                arguments,
            });
        }
    }

    let finish_reason = body
        .pointer("/choices/0/finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);
    let usage: Option<Usage> = body
        .get("usage")
        .and_then(|v| serde_json::from_value(v.clone()).ok());

    Ok(LlmResponse {
        content,
        tool_calls,
        raw_tool_calls,
        finish_reason,
        usage,
        raw: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(message: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"index": 0, "message": message, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })
    }

    #[test]
    fn parses_plain_content() {
        let resp = parse_response(completion(serde_json::json!({
            "role": "assistant", "content": "hello"
        })))
        .unwrap();
        assert_eq!(resp.content.as_deref(), Some("hello"));
        assert!(resp.tool_calls.is_empty());
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn parses_tool_calls_and_keeps_raw() {
        let resp = parse_response(completion(serde_json::json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "grep", "arguments": "{\"pattern\": \"x\"}"}
            }]
        })))
        .unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "grep");
        assert_eq!(resp.tool_calls[0].arguments["pattern"], "x");
        assert!(resp.raw_tool_calls.is_some());
        assert!(resp.content.is_none());
    }

    #[test]
    fn undefined_arguments_normalize_to_empty_object() {
        for weird in ["", "undefined", "null", "   "] {
            let resp = parse_response(completion(serde_json::json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": "c",
                    "function": {"name": "noargs", "arguments": weird}
                }]
            })))
            .unwrap();
            assert_eq!(
                resp.tool_calls[0].arguments,
                serde_json::json!({}),
                "arguments {weird:?} should normalize"
            );
        }
    }

    #[test]
    fn garbage_arguments_normalize_to_empty_object() {
        let resp = parse_response(completion(serde_json::json!({
            "role": "assistant",
            "tool_calls": [{
                "id": "c",
                "function": {"name": "t", "arguments": "not json {{"}
            }]
        })))
        .unwrap();
        assert_eq!(resp.tool_calls[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn missing_choices_is_protocol_error() {
        assert!(parse_response(serde_json::json!({"object": "error"})).is_err());
    }

    #[test]
    fn upstream_error_carries_message_and_type() {
        let err = upstream_error(
            429,
            &serde_json::json!({
                "error": {"message": "rate limited", "type": "rate_limit_error"}
            }),
        );
        match err {
            Error::Llm {
                message,
                status,
                kind,
            } => {
                assert_eq!(message, "rate limited");
                assert_eq!(status, Some(429));
                assert_eq!(kind.as_deref(), Some("rate_limit_error"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = OpenAiCompatClient::new("http://localhost:8080/v1/", "k");
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }
}
