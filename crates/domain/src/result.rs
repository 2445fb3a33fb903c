//! `RunResult` — the structured output contract (schema v2.0) written to
//! stdout in `--format json` mode.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interaction::InputType;
use crate::run::RunStatus;

pub const SCHEMA_VERSION: &str = "2.0";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub total_cost_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Per-model breakdown, keyed by model name.
    #[serde(default)]
    pub model_usage: BTreeMap<String, ModelUsage>,
}

impl UsageMetrics {
    /// Fold one invocation's usage into the totals.
    pub fn record(&mut self, model: &str, input_tokens: u64, output_tokens: u64) {
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
        let entry = self.model_usage.entry(model.to_string()).or_default();
        entry.input_tokens += input_tokens;
        entry.output_tokens += output_tokens;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub iterations: u32,
    pub duration_ms: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub usage: UsageMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionInfo {
    pub prompt: String,
    pub input_type: InputType,
    pub sensitive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub agent_name: String,
    pub workspace_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub schema_version: String,
    pub run_id: String,
    pub status: RunStatus,
    /// Present iff status == COMPLETED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Present iff status == FAILED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// Present iff status == WAITING_FOR_INPUT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction: Option<InteractionInfo>,
    pub metrics: RunMetrics,
    pub metadata: ResultMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_record_accumulates_per_model() {
        let mut usage = UsageMetrics::default();
        usage.record("gpt-4o", 100, 20);
        usage.record("gpt-4o", 50, 10);
        usage.record("gpt-4o-mini", 5, 1);

        assert_eq!(usage.input_tokens, 155);
        assert_eq!(usage.output_tokens, 31);
        assert_eq!(usage.model_usage["gpt-4o"].input_tokens, 150);
        assert_eq!(usage.model_usage["gpt-4o-mini"].output_tokens, 1);
    }

    #[test]
    fn completed_result_shape() {
        let now = Utc::now();
        let result = RunResult {
            schema_version: SCHEMA_VERSION.into(),
            run_id: "r1".into(),
            status: RunStatus::Completed,
            result: Some(serde_json::json!("done")),
            error: None,
            interaction: None,
            metrics: RunMetrics {
                iterations: 2,
                duration_ms: 1234,
                start_time: now,
                end_time: now,
                usage: UsageMetrics::default(),
            },
            metadata: ResultMetadata {
                agent_name: "echo".into(),
                workspace_path: "/w/W001".into(),
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["schema_version"], "2.0");
        assert_eq!(json["status"], "COMPLETED");
        assert_eq!(json["result"], "done");
        assert!(json.get("error").is_none());
        assert!(json.get("interaction").is_none());
    }
}
