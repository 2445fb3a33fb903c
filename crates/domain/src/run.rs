//! Run metadata — the state machine over one execution instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The status field is the single source of truth for resumability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    WaitingForInput,
    Interrupted,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `continue` may target a run in this state without first
    /// going through the janitor.
    pub fn is_resumable(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether resuming from this state requires a new user message.
    pub fn resume_requires_message(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "RUNNING",
            Self::WaitingForInput => "WAITING_FOR_INPUT",
            Self::Interrupted => "INTERRUPTED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run metadata
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Path to the agent definition this run executes.
    pub agent_ref: String,
    /// The initial user message.
    pub task: String,
    pub status: RunStatus,
    #[serde(default)]
    pub iterations_completed: u32,
    pub hostname: String,
    pub pid: u32,
}

impl RunMetadata {
    pub fn new(run_id: String, agent_ref: String, task: String, hostname: String) -> Self {
        Self {
            run_id,
            start_time: Utc::now(),
            end_time: None,
            agent_ref,
            task,
            status: RunStatus::Running,
            iterations_completed: 0,
            hostname,
            pid: std::process::id(),
        }
    }
}

/// Generate a default run ID: `YYYYMMDD_HHMMSS_<6-hex>`.
pub fn generate_run_id() -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{stamp}_{}", &hex[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_screaming_case() {
        let json = serde_json::to_value(RunStatus::WaitingForInput).unwrap();
        assert_eq!(json, "WAITING_FOR_INPUT");
        let back: RunStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, RunStatus::WaitingForInput);
    }

    #[test]
    fn resume_matrix() {
        assert!(!RunStatus::Running.is_resumable());
        assert!(RunStatus::WaitingForInput.is_resumable());
        assert!(RunStatus::Interrupted.is_resumable());
        assert!(RunStatus::Completed.is_resumable());
        assert!(RunStatus::Failed.is_resumable());

        assert!(RunStatus::Completed.resume_requires_message());
        assert!(RunStatus::Failed.resume_requires_message());
        assert!(!RunStatus::Interrupted.resume_requires_message());
    }

    #[test]
    fn run_id_shape() {
        let id = generate_run_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn metadata_records_current_pid() {
        let meta = RunMetadata::new(
            "r1".into(),
            "/agents/echo".into(),
            "do the thing".into(),
            "host-a".into(),
        );
        assert_eq!(meta.pid, std::process::id());
        assert_eq!(meta.status, RunStatus::Running);
        assert!(meta.end_time.is_none());
    }
}
