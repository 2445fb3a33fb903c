//! SIGINT/SIGTERM handling.
//!
//! The handler runs exactly once per run: it transitions the run to
//! INTERRUPTED, flushes the store, ends the workspace's sessions, and
//! exits 130. The LLM call itself is not cancellable from within the
//! engine, so process termination is the escape hatch.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};

use delta_domain::journal::{EventPayload, SystemLevel};
use delta_domain::run::RunStatus;
use delta_store::RunStore;

/// Exit code for an interrupted run.
pub const INTERRUPT_EXIT_CODE: i32 = 130;

/// Install the SIGINT/SIGTERM handler for one run. Returns a guard flag
/// the engine may poll at loop boundaries.
pub fn install(store: Arc<RunStore>, workspace: PathBuf) -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let seen = flag.clone();

    tokio::spawn(async move {
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "cannot install SIGINT handler");
                return;
            }
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "cannot install SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }

        // First (and only) delivery wins; the process exits below.
        if seen.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("signal received, interrupting run");

        let _ = store.append_event(EventPayload::SystemMessage {
            level: SystemLevel::Warn,
            content: "run interrupted by signal".into(),
        });
        let _ = store.update_metadata(|m| {
            m.status = RunStatus::Interrupted;
            m.end_time = Some(chrono::Utc::now());
        });
        let _ = store.flush();

        let sessions = delta_sessions::SessionManager::new(&workspace);
        if let Err(e) = sessions.end_all(delta_sessions::DEFAULT_GRACE) {
            tracing::warn!(error = %e, "session cleanup on interrupt failed");
        }

        std::process::exit(INTERRUPT_EXIT_CODE);
    });

    flag
}
