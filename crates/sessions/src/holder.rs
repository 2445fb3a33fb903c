//! The session holder — the detached supervisor spawned by `start`.
//!
//! Responsibilities: spawn the session's child process, publish metadata
//! (child pid + our pid), pump appended `input.log` bytes to the child's
//! stdin, pump the child's stdout/stderr to `output.log`, and mark the
//! session dead on exit.

use std::io::SeekFrom;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::process::Command;

use delta_domain::session::{SessionMetadata, SessionStatus};
use delta_domain::{Error, Result};

use crate::manager::{SessionManager, INPUT_LOG, OUTPUT_LOG};

const INPUT_POLL: Duration = Duration::from_millis(200);

/// Run the holder loop until the child exits. Returns the child's exit
/// code (or -1 when killed by a signal).
pub async fn run_holder(
    sessions_dir: &Path,
    session_id: &str,
    command: Vec<String>,
) -> Result<i32> {
    if command.is_empty() {
        return Err(Error::Other("session command must not be empty".into()));
    }
    let session_dir = sessions_dir.join(session_id);
    let output_path = session_dir.join(OUTPUT_LOG);
    let input_path = session_dir.join(INPUT_LOG);

    let mut cmd = Command::new(&command[0]);
    cmd.args(&command[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let mut child = cmd
        .spawn()
        .map_err(|e| Error::Other(format!("spawning session child '{}': {e}", command[0])))?;

    let pid = child.id().unwrap_or_default();

    // Publish metadata through the manager rooted at the workspace that
    // owns `sessions_dir`.
    let workspace = sessions_dir
        .parent()
        .ok_or_else(|| Error::Other("sessions dir has no parent".into()))?;
    let manager = SessionManager::new(workspace);
    manager.write_metadata(&SessionMetadata {
        session_id: session_id.to_string(),
        command: command.clone(),
        pid,
        holder_pid: std::process::id(),
        created_at: Utc::now(),
        last_accessed_at: Utc::now(),
        status: SessionStatus::Running,
    })?;

    // ── Output pumps ─────────────────────────────────────────────────
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_task = spawn_output_pump(stdout, output_path.clone());
    let err_task = spawn_output_pump(stderr, output_path.clone());

    // ── Input pump: tail input.log into the child's stdin ────────────
    let mut child_stdin = child.stdin.take();
    let input_task = tokio::spawn(async move {
        let Ok(mut input) = tokio::fs::File::open(&input_path).await else {
            return;
        };
        let mut offset: u64 = 0;
        let mut buf = vec![0u8; 8192];
        loop {
            if input.seek(SeekFrom::Start(offset)).await.is_err() {
                break;
            }
            match input.read(&mut buf).await {
                Ok(0) => tokio::time::sleep(INPUT_POLL).await,
                Ok(n) => {
                    offset += n as u64;
                    if let Some(stdin) = child_stdin.as_mut() {
                        if stdin.write_all(&buf[..n]).await.is_err()
                            || stdin.flush().await.is_err()
                        {
                            break;
                        }
                    }
                }
                Err(_) => break,
            }
        }
    });

    let status = child
        .wait()
        .await
        .map_err(|e| Error::Other(format!("waiting for session child: {e}")))?;

    let _ = out_task.await;
    let _ = err_task.await;
    input_task.abort();

    let exit_code = status.code().unwrap_or(-1);
    if let Ok(mut metadata) = manager.read_metadata(session_id) {
        metadata.status = SessionStatus::Dead;
        metadata.last_accessed_at = Utc::now();
        let _ = manager.write_metadata(&metadata);
    }
    tracing::debug!(session_id, exit_code, "session child exited");
    Ok(exit_code)
}

fn spawn_output_pump<R>(
    reader: Option<R>,
    output_path: std::path::PathBuf,
) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return;
        };
        let Ok(mut out) = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&output_path)
            .await
        else {
            return;
        };
        let mut buf = vec![0u8; 8192];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if out.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                    let _ = out.flush().await;
                }
            }
        }
    })
}
