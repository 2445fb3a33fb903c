//! Session bookkeeping: start, write, read, list, end.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;

use delta_domain::session::{generate_session_id, SessionMetadata, SessionStatus};
use delta_domain::{Error, Result};

pub const SESSIONS_DIR: &str = ".sessions";
pub const METADATA_FILE: &str = "metadata.json";
pub const INPUT_LOG: &str = "input.log";
pub const OUTPUT_LOG: &str = "output.log";

/// Grace period between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Probe a PID with the no-op signal 0.
pub fn pid_alive(pid: u32) -> bool {
    // Safety: kill(pid, 0) only performs the permission/existence check.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

fn send_signal(pid: u32, signal: libc::c_int) {
    unsafe {
        libc::kill(pid as libc::pid_t, signal);
    }
}

pub struct SessionManager {
    sessions_dir: PathBuf,
}

impl SessionManager {
    /// Manager for the sessions of one workspace.
    pub fn new(workspace: &Path) -> Self {
        Self {
            sessions_dir: workspace.join(SESSIONS_DIR),
        }
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(session_id)
    }

    fn metadata_path(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join(METADATA_FILE)
    }

    // ── Metadata I/O ─────────────────────────────────────────────────

    pub fn read_metadata(&self, session_id: &str) -> Result<SessionMetadata> {
        let raw = fs::read_to_string(self.metadata_path(session_id)).map_err(|_| {
            Error::Other(format!("session '{session_id}' not found"))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_metadata(&self, metadata: &SessionMetadata) -> Result<()> {
        let dir = self.session_dir(&metadata.session_id);
        fs::create_dir_all(&dir)?;
        let path = dir.join(METADATA_FILE);
        let tmp = dir.join("metadata.json.tmp");
        let mut body = serde_json::to_string_pretty(metadata)?;
        body.push('\n');
        fs::write(&tmp, body)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Start a session: spawn the detached holder and wait for it to
    /// publish metadata with the child PID.
    pub fn start(&self, command: Vec<String>) -> Result<SessionMetadata> {
        if command.is_empty() {
            return Err(Error::Other("session command must not be empty".into()));
        }
        let session_id = generate_session_id();
        let dir = self.session_dir(&session_id);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(INPUT_LOG), b"")?;
        fs::write(dir.join(OUTPUT_LOG), b"")?;

        let exe = std::env::current_exe()
            .map_err(|e| Error::Other(format!("locating delta-sessions binary: {e}")))?;
        let mut holder = std::process::Command::new(exe);
        holder
            .arg("hold")
            .arg("--sessions-dir")
            .arg(&self.sessions_dir)
            .arg("--session-id")
            .arg(&session_id)
            .arg("--")
            .args(&command)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        holder
            .spawn()
            .map_err(|e| Error::Other(format!("spawning session holder: {e}")))?;

        // The holder publishes metadata once the child is up.
        for _ in 0..50 {
            if let Ok(metadata) = self.read_metadata(&session_id) {
                return Ok(metadata);
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        Err(Error::Timeout(format!(
            "session '{session_id}' holder did not publish metadata"
        )))
    }

    /// Deliver input to the session (appended to `input.log`; the holder
    /// forwards it to the child's stdin).
    pub fn write_input(&self, session_id: &str, data: &str) -> Result<()> {
        let mut metadata = self.read_metadata(session_id)?;
        use std::io::Write;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(self.session_dir(session_id).join(INPUT_LOG))?;
        file.write_all(data.as_bytes())?;
        metadata.touch();
        self.write_metadata(&metadata)
    }

    /// The session's combined output so far.
    pub fn read_output(&self, session_id: &str) -> Result<String> {
        let mut metadata = self.read_metadata(session_id)?;
        let output = fs::read_to_string(self.session_dir(session_id).join(OUTPUT_LOG))?;
        metadata.touch();
        self.write_metadata(&metadata)?;
        Ok(output)
    }

    /// All sessions in the workspace, with liveness re-checked: a
    /// recorded `running` session whose PID is gone is reported (and
    /// persisted) as `dead`.
    pub fn list(&self) -> Result<Vec<SessionMetadata>> {
        if !self.sessions_dir.exists() {
            return Ok(Vec::new());
        }
        let mut sessions = Vec::new();
        let mut dirs: Vec<PathBuf> = fs::read_dir(&self.sessions_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        for dir in dirs {
            let Some(session_id) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Ok(mut metadata) = self.read_metadata(session_id) else {
                tracing::warn!(session_id, "skipping session with unreadable metadata");
                continue;
            };
            if metadata.status == SessionStatus::Running && !pid_alive(metadata.pid) {
                metadata.status = SessionStatus::Dead;
                let _ = self.write_metadata(&metadata);
            }
            sessions.push(metadata);
        }
        Ok(sessions)
    }

    /// End one session: SIGTERM, bounded grace, then SIGKILL. Tolerates
    /// sessions whose processes already exited.
    pub fn end(&self, session_id: &str, grace: Duration) -> Result<SessionMetadata> {
        let mut metadata = self.read_metadata(session_id)?;

        if metadata.status == SessionStatus::Running {
            if pid_alive(metadata.pid) {
                send_signal(metadata.pid, libc::SIGTERM);
                let deadline = std::time::Instant::now() + grace;
                while pid_alive(metadata.pid) && std::time::Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(100));
                }
                if pid_alive(metadata.pid) {
                    tracing::warn!(
                        session_id,
                        pid = metadata.pid,
                        "session ignored SIGTERM, sending SIGKILL"
                    );
                    send_signal(metadata.pid, libc::SIGKILL);
                }
            }
            // The holder exits on its own once the child is gone; nudge it
            // in case it is stuck.
            if pid_alive(metadata.holder_pid) {
                send_signal(metadata.holder_pid, libc::SIGTERM);
            }
            metadata.status = SessionStatus::Dead;
            metadata.last_accessed_at = Utc::now();
            self.write_metadata(&metadata)?;
        }
        Ok(metadata)
    }

    /// End every session in the workspace. Returns how many were ended.
    pub fn end_all(&self, grace: Duration) -> Result<usize> {
        let mut ended = 0;
        for session in self.list()? {
            if session.status == SessionStatus::Running {
                self.end(&session.session_id, grace)?;
                ended += 1;
            }
        }
        Ok(ended)
    }
}
