//! Ask-human interaction request — written when the engine pauses for
//! human input. The reply arrives as a plain `response.txt` beside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the built-in interaction tool exposed to the LLM.
pub const ASK_HUMAN_TOOL: &str = "ask_human";

/// Exit code signalling "paused, waiting for human input".
pub const PAUSE_EXIT_CODE: i32 = 101;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Password,
    Confirmation,
}

impl Default for InputType {
    fn default() -> Self {
        Self::Text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRequest {
    pub request_id: String,
    pub prompt: String,
    #[serde(default)]
    pub input_type: InputType,
    #[serde(default)]
    pub sensitive: bool,
    pub timestamp: DateTime<Utc>,
}

impl InteractionRequest {
    /// Build a request from the arguments of an `ask_human` tool call.
    /// Only `prompt` is required; the rest default.
    pub fn from_tool_args(request_id: String, args: &serde_json::Value) -> Self {
        let prompt = args
            .get("prompt")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let input_type = args
            .get("input_type")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let sensitive = args
            .get("sensitive")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Self {
            request_id,
            prompt,
            input_type,
            sensitive,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tool_args_defaults() {
        let args = serde_json::json!({"prompt": "Favorite color?"});
        let req = InteractionRequest::from_tool_args("a1".into(), &args);
        assert_eq!(req.prompt, "Favorite color?");
        assert_eq!(req.input_type, InputType::Text);
        assert!(!req.sensitive);
    }

    #[test]
    fn from_tool_args_full() {
        let args = serde_json::json!({
            "prompt": "API token?",
            "input_type": "password",
            "sensitive": true
        });
        let req = InteractionRequest::from_tool_args("a2".into(), &args);
        assert_eq!(req.input_type, InputType::Password);
        assert!(req.sensitive);
    }

    #[test]
    fn unknown_input_type_falls_back_to_text() {
        let args = serde_json::json!({"prompt": "?", "input_type": "speech"});
        let req = InteractionRequest::from_tool_args("a3".into(), &args);
        assert_eq!(req.input_type, InputType::Text);
    }
}
