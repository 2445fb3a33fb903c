//! Lifecycle hook executor.
//!
//! Hooks are external commands communicating over a per-invocation
//! directory: `input/` carries the context and the mutable payload,
//! `output/` optionally carries a replacement payload and control
//! directives, `execution_meta/` records what happened. A failed hook
//! never aborts the run — the engine logs a WARN, emits a FAILED audit,
//! and proceeds with the baseline payload.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::process::Command;

use delta_domain::agent::{HookDefinition, LifecycleHooks};
use delta_domain::journal::{EventPayload, HookStatus, SystemLevel};
use delta_store::{HookPayload, RunStore};

/// Environment variable carrying the hook's I/O directory path.
pub const HOOK_IO_ENV: &str = "DELTA_HOOK_IO";

/// What the engine learns from one hook invocation.
#[derive(Debug, Default)]
pub struct HookOutcome {
    /// Replacement payload from `output/final_payload.json`, if any.
    pub payload_override: Option<serde_json::Value>,
    /// Raw replacement from `output/payload_override.dat`, if any.
    pub raw_override: Option<Vec<u8>>,
    /// `control.json` said `skip: true` (honored for `pre_tool_exec`).
    pub skip: bool,
    pub failed: bool,
}

pub struct HookExecutor {
    store: Arc<RunStore>,
    hooks: LifecycleHooks,
    workspace: std::path::PathBuf,
    step: AtomicU32,
}

impl HookExecutor {
    pub fn new(store: Arc<RunStore>, hooks: LifecycleHooks, workspace: &Path) -> Self {
        Self {
            store,
            hooks,
            workspace: workspace.to_path_buf(),
            step: AtomicU32::new(1),
        }
    }

    fn definition(&self, name: &str) -> Option<&HookDefinition> {
        match name {
            "pre_llm_req" => self.hooks.pre_llm_req.as_ref(),
            "post_llm_resp" => self.hooks.post_llm_resp.as_ref(),
            "pre_tool_exec" => self.hooks.pre_tool_exec.as_ref(),
            "post_tool_exec" => self.hooks.post_tool_exec.as_ref(),
            "on_error" => self.hooks.on_error.as_ref(),
            "on_run_end" => self.hooks.on_run_end.as_ref(),
            _ => None,
        }
    }

    pub fn is_configured(&self, name: &str) -> bool {
        self.definition(name).is_some()
    }

    /// Run one lifecycle hook if configured. Emits exactly one
    /// `HOOK_EXECUTION_AUDIT` per actual invocation. Infallible by
    /// contract: every failure degrades to a baseline outcome.
    pub async fn run(
        &self,
        name: &str,
        context: serde_json::Value,
        payload: Option<HookPayload>,
    ) -> HookOutcome {
        let Some(def) = self.definition(name) else {
            return HookOutcome::default();
        };
        let def = def.clone();

        let step = self.step.fetch_add(1, Ordering::SeqCst);
        let io_dir = match self
            .store
            .setup_hook_invocation(step, name, &context, payload.as_ref())
        {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(hook = name, error = %e, "hook I/O setup failed");
                self.warn_and_audit(name, &format!("{step:03}_{name}"), &e.to_string());
                return HookOutcome {
                    failed: true,
                    ..Default::default()
                };
            }
        };
        let io_path_ref = format!("io/hooks/{step:03}_{name}");

        let outcome = self.invoke(name, &def, &io_dir).await;

        if outcome.failed {
            self.warn_and_audit(name, &io_path_ref, "hook command failed");
        } else {
            let status = if outcome.skip {
                HookStatus::Skipped
            } else {
                HookStatus::Success
            };
            let _ = self.store.append_event(EventPayload::HookExecutionAudit {
                hook_name: name.to_string(),
                status,
                io_path_ref,
            });
        }
        outcome
    }

    fn warn_and_audit(&self, name: &str, io_path_ref: &str, detail: &str) {
        let _ = self.store.append_event(EventPayload::SystemMessage {
            level: SystemLevel::Warn,
            content: format!("hook '{name}' failed: {detail}; continuing with baseline"),
        });
        let _ = self.store.append_event(EventPayload::HookExecutionAudit {
            hook_name: name.to_string(),
            status: HookStatus::Failed,
            io_path_ref: io_path_ref.to_string(),
        });
    }

    /// Spawn the hook command, bound by its timeout, and collect outputs.
    async fn invoke(&self, name: &str, def: &HookDefinition, io_dir: &Path) -> HookOutcome {
        if def.command.is_empty() {
            tracing::warn!(hook = name, "hook has an empty command");
            return HookOutcome {
                failed: true,
                ..Default::default()
            };
        }
        let started = std::time::Instant::now();

        let mut cmd = Command::new(&def.command[0]);
        cmd.args(&def.command[1..])
            .arg(io_dir)
            .current_dir(&self.workspace)
            .env(HOOK_IO_ENV, io_dir)
            .env("DELTA_RUN_ID", self.store.run_id())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(hook = name, error = %e, "hook spawn failed");
                return HookOutcome {
                    failed: true,
                    ..Default::default()
                };
            }
        };

        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(def.timeout_ms),
            child.wait_with_output(),
        )
        .await;

        let meta_dir = io_dir.join("execution_meta");
        let duration_ms = started.elapsed().as_millis() as u64;
        let _ = std::fs::write(meta_dir.join("duration_ms.txt"), duration_ms.to_string());

        let output = match waited {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(hook = name, error = %e, "hook wait failed");
                let _ = std::fs::write(meta_dir.join("exit_code.txt"), "-1");
                return HookOutcome {
                    failed: true,
                    ..Default::default()
                };
            }
            Err(_) => {
                tracing::warn!(hook = name, timeout_ms = def.timeout_ms, "hook timed out");
                let _ = std::fs::write(meta_dir.join("exit_code.txt"), "timeout");
                return HookOutcome {
                    failed: true,
                    ..Default::default()
                };
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let _ = std::fs::write(meta_dir.join("exit_code.txt"), exit_code.to_string());
        let _ = std::fs::write(meta_dir.join("stdout.log"), &output.stdout);
        let _ = std::fs::write(meta_dir.join("stderr.log"), &output.stderr);

        if exit_code != 0 {
            return HookOutcome {
                failed: true,
                ..Default::default()
            };
        }

        // Absence of an output file means "no override".
        let payload_override = std::fs::read_to_string(io_dir.join("output/final_payload.json"))
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok());
        let raw_override = std::fs::read(io_dir.join("output/payload_override.dat")).ok();
        let skip = std::fs::read_to_string(io_dir.join("output/control.json"))
            .ok()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
            .and_then(|v| v.get("skip").and_then(|s| s.as_bool()))
            .unwrap_or(false);

        HookOutcome {
            payload_override,
            raw_override,
            skip,
            failed: false,
        }
    }
}
