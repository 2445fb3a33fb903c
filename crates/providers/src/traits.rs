//! Provider-agnostic request/response model.
//!
//! The request is the literal wire payload (`serde_json::Value`): the
//! `pre_llm_req` hook may replace it wholesale, and the invocation
//! artifact records exactly the payload that was sent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use delta_domain::agent::LlmParams;
use delta_domain::message::ChatMessage;
use delta_domain::tool::ToolCallRequest;
use delta_domain::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Parsed chat-completion response.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: Option<String>,
    /// Parsed tool calls, in emission order.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The provider-native `tool_calls` array, verbatim, for journaling.
    pub raw_tool_calls: Option<serde_json::Value>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
    /// Full response body, persisted to the invocation artifact.
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One chat-completion round trip. `payload` is the full wire body.
    async fn call(&self, payload: &serde_json::Value) -> Result<LlmResponse>;
}

/// Build the baseline wire payload (P_base) from the agent's LLM
/// parameters, the composed messages, and the generated tool schemas.
pub fn build_request(
    params: &LlmParams,
    messages: &[ChatMessage],
    tool_schemas: &[serde_json::Value],
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": params.model,
        "temperature": params.temperature,
        "messages": messages,
    });
    if let Some(top_p) = params.top_p {
        body["top_p"] = serde_json::json!(top_p);
    }
    if let Some(max_tokens) = params.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(fp) = params.frequency_penalty {
        body["frequency_penalty"] = serde_json::json!(fp);
    }
    if let Some(pp) = params.presence_penalty {
        body["presence_penalty"] = serde_json::json!(pp);
    }
    if !tool_schemas.is_empty() {
        body["tools"] = serde_json::Value::Array(tool_schemas.to_vec());
        body["tool_choice"] = serde_json::json!("auto");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> LlmParams {
        LlmParams {
            model: "gpt-4o".into(),
            temperature: 0.3,
            top_p: None,
            max_tokens: Some(1024),
            frequency_penalty: None,
            presence_penalty: None,
        }
    }

    #[test]
    fn request_includes_params_and_messages() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let body = build_request(&params(), &messages, &[]);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body.get("tools").is_none());
        assert!(body.get("top_p").is_none());
    }

    #[test]
    fn tools_imply_auto_tool_choice() {
        let schemas = vec![serde_json::json!({"type": "function"})];
        let body = build_request(&params(), &[], &schemas);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn assistant_tool_calls_survive_serialization() {
        let blob = serde_json::json!([{"id": "c1", "function": {"name": "f", "arguments": "{}"}}]);
        let messages = vec![ChatMessage::assistant("", Some(blob.clone()))];
        let body = build_request(&params(), &messages, &[]);
        assert_eq!(body["messages"][0]["tool_calls"], blob);
    }
}
