//! Session metadata for the workspace-scoped session manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    /// Command line the session runs, argv form.
    pub command: Vec<String>,
    /// PID of the session's child process.
    pub pid: u32,
    /// PID of the process that created the session (the engine or the
    /// `delta-sessions` CLI invocation).
    pub holder_pid: u32,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub status: SessionStatus,
}

impl SessionMetadata {
    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }
}

/// Generate a session ID: `sess_<12-hex>`.
pub fn generate_session_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("sess_{}", &hex[..12])
}
