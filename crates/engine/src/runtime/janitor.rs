//! Crash recovery for runs stuck in RUNNING.
//!
//! A continuation targeting a RUNNING run triggers a liveness inquest on
//! the recorded `hostname` + `pid`:
//!
//! 1. Different host and no `--force` → refuse (cannot verify liveness
//!    remotely).
//! 2. PID gone (signal-0 probe) → orphaned run, reclaim to INTERRUPTED.
//! 3. PID alive but the process name is unrelated to this runtime → PID
//!    reuse, reclaim.
//! 4. PID alive with a matching name → the run really is active, refuse.

use delta_domain::journal::{EventPayload, SystemLevel};
use delta_domain::run::RunStatus;
use delta_domain::{Error, Result};
use delta_sessions::pid_alive;
use delta_store::RunStore;

/// Substring an owning process's name must contain to count as ours.
const PROCESS_NAME_HINT: &str = "delta";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JanitorVerdict {
    /// Run was not RUNNING; nothing to reclaim.
    NotStuck,
    /// Run was orphaned and has been transitioned to INTERRUPTED.
    Reclaimed,
}

/// Inspect a RUNNING run and reclaim it if its owner is gone. The
/// INTERRUPTED transition is persisted before the caller resumes.
pub fn reclaim_if_orphaned(store: &RunStore, force: bool) -> Result<JanitorVerdict> {
    let metadata = store.read_metadata()?;
    if metadata.status != RunStatus::Running {
        return Ok(JanitorVerdict::NotStuck);
    }

    let current_host = current_hostname();
    if metadata.hostname != current_host {
        if !force {
            return Err(Error::RunState(format!(
                "run '{}' is recorded as RUNNING on host '{}' (this is '{}'); \
                 liveness cannot be verified remotely — pass --force to override",
                metadata.run_id, metadata.hostname, current_host
            )));
        }
        tracing::warn!(
            run_id = %metadata.run_id,
            recorded_host = %metadata.hostname,
            "forcing reclamation of a run recorded on another host"
        );
        return reclaim(store, "forced reclamation across hosts");
    }

    if !pid_alive(metadata.pid) {
        return reclaim(
            store,
            &format!("owner pid {} no longer exists", metadata.pid),
        );
    }

    // Alive — distinguish the real owner from PID reuse (best effort,
    // Unix only).
    match process_name(metadata.pid) {
        Some(name) if name.contains(PROCESS_NAME_HINT) => Err(Error::RunState(format!(
            "run '{}' is still active (pid {}, process '{}')",
            metadata.run_id, metadata.pid, name
        ))),
        Some(name) => {
            tracing::info!(
                pid = metadata.pid,
                process = %name,
                "recorded pid now belongs to an unrelated process; treating as reuse"
            );
            reclaim(
                store,
                &format!("pid {} was reused by '{}'", metadata.pid, name),
            )
        }
        None => {
            // Raced with process exit, or `ps` unavailable. The PID
            // answered signal 0 moments ago; err on the safe side.
            Err(Error::RunState(format!(
                "run '{}' appears active (pid {} alive, name unknown)",
                metadata.run_id, metadata.pid
            )))
        }
    }
}

fn reclaim(store: &RunStore, reason: &str) -> Result<JanitorVerdict> {
    store.update_metadata(|m| {
        m.status = RunStatus::Interrupted;
    })?;
    store.append_event(EventPayload::SystemMessage {
        level: SystemLevel::Warn,
        content: format!("janitor reclaimed orphaned run: {reason}"),
    })?;
    store.log_line(&format!("janitor: {reason}"));
    Ok(JanitorVerdict::Reclaimed)
}

pub fn current_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".into())
}

/// Look up a process name via `ps -p <pid> -o comm=`. Returns None when
/// the process is gone or `ps` is unusable.
fn process_name(pid: u32) -> Option<String> {
    let output = std::process::Command::new("ps")
        .args(["-p", &pid.to_string(), "-o", "comm="])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_status(
        ws: &std::path::Path,
        status: RunStatus,
        hostname: &str,
        pid: u32,
    ) -> RunStore {
        let store = RunStore::create(ws, "run-1", "/a", "t", hostname).unwrap();
        store
            .update_metadata(|m| {
                m.status = status;
                m.pid = pid;
            })
            .unwrap();
        store
    }

    #[test]
    fn non_running_is_not_stuck() {
        let ws = tempfile::tempdir().unwrap();
        let store = store_with_status(ws.path(), RunStatus::Interrupted, &current_hostname(), 1);
        assert_eq!(
            reclaim_if_orphaned(&store, false).unwrap(),
            JanitorVerdict::NotStuck
        );
    }

    #[test]
    fn dead_pid_reclaims_to_interrupted() {
        let ws = tempfile::tempdir().unwrap();
        // A PID far above any realistic pid_max.
        let store =
            store_with_status(ws.path(), RunStatus::Running, &current_hostname(), 4_000_000);

        assert_eq!(
            reclaim_if_orphaned(&store, false).unwrap(),
            JanitorVerdict::Reclaimed
        );
        let metadata = store.read_metadata().unwrap();
        assert_eq!(metadata.status, RunStatus::Interrupted);

        // The reclamation left an audit trail.
        let events = store.read_journal().unwrap();
        assert!(matches!(
            &events[0].payload,
            EventPayload::SystemMessage { level: SystemLevel::Warn, .. }
        ));
    }

    #[test]
    fn foreign_host_refused_without_force() {
        let ws = tempfile::tempdir().unwrap();
        let store = store_with_status(ws.path(), RunStatus::Running, "another-host", 1);

        let err = reclaim_if_orphaned(&store, false).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("another-host"));
        assert!(msg.contains(&current_hostname()));
    }

    #[test]
    fn foreign_host_reclaimed_with_force() {
        let ws = tempfile::tempdir().unwrap();
        let store = store_with_status(ws.path(), RunStatus::Running, "another-host", 1);

        assert_eq!(
            reclaim_if_orphaned(&store, true).unwrap(),
            JanitorVerdict::Reclaimed
        );
    }

    #[test]
    fn alive_unrelated_process_is_reclaimed_as_reuse() {
        let ws = tempfile::tempdir().unwrap();
        // Our own test process is alive but its name is not the runtime's
        // binary name, so the janitor treats the PID as reused.
        let store = store_with_status(
            ws.path(),
            RunStatus::Running,
            &current_hostname(),
            std::process::id(),
        );

        match reclaim_if_orphaned(&store, false) {
            Ok(JanitorVerdict::Reclaimed) => {}
            // Test binaries may carry "delta" in their name, in which
            // case the janitor correctly refuses instead.
            Err(e) => assert!(e.to_string().contains("active")),
            Ok(other) => panic!("unexpected verdict: {other:?}"),
        }
    }
}
