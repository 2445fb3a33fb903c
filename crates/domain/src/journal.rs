//! Journal events — the authoritative, append-only execution history.
//!
//! One JSON object per line. The envelope is `{seq, timestamp, type,
//! payload}`; `seq` is 1-based and strictly increasing within a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::run::RunStatus;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Envelope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// Event type + type-specific payload, tagged as `{"type": ..., "payload":
/// {...}}` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventPayload {
    #[serde(rename = "RUN_START")]
    RunStart { task: String, agent_ref: String },

    #[serde(rename = "RUN_END")]
    RunEnd {
        status: RunStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        final_response: Option<String>,
    },

    #[serde(rename = "USER_MESSAGE")]
    UserMessage { content: String },

    /// One LLM response. `tool_calls` is the provider-native array,
    /// stored verbatim (see the message-reconstruction contract).
    #[serde(rename = "THOUGHT")]
    Thought {
        content: String,
        /// ID of the LLM invocation artifact for this response.
        invocation_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<serde_json::Value>,
    },

    #[serde(rename = "ACTION_REQUEST")]
    ActionRequest {
        action_id: String,
        tool_name: String,
        tool_args: serde_json::Value,
        /// Human-readable resolved command line.
        resolved_command: String,
    },

    #[serde(rename = "ACTION_RESULT")]
    ActionResult {
        action_id: String,
        status: ActionStatus,
        observation_content: String,
        /// ID of the tool-execution artifact, when one was produced.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        execution_ref: Option<String>,
    },

    #[serde(rename = "SYSTEM_MESSAGE")]
    SystemMessage { level: SystemLevel, content: String },

    #[serde(rename = "HOOK_EXECUTION_AUDIT")]
    HookExecutionAudit {
        hook_name: String,
        status: HookStatus,
        /// Path of the hook's I/O directory, relative to the run root.
        io_path_ref: String,
    },
}

impl EventPayload {
    /// Short type name, as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunStart { .. } => "RUN_START",
            Self::RunEnd { .. } => "RUN_END",
            Self::UserMessage { .. } => "USER_MESSAGE",
            Self::Thought { .. } => "THOUGHT",
            Self::ActionRequest { .. } => "ACTION_REQUEST",
            Self::ActionResult { .. } => "ACTION_RESULT",
            Self::SystemMessage { .. } => "SYSTEM_MESSAGE",
            Self::HookExecutionAudit { .. } => "HOOK_EXECUTION_AUDIT",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Field enums
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Success,
    Failed,
    /// Tool could not be dispatched at all (e.g. not found).
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HookStatus {
    Success,
    Failed,
    Skipped,
}
