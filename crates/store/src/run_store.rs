//! The per-run store: journal, metadata, artifacts, interaction files,
//! engine log.
//!
//! Artifacts are always materialized completely before the journal event
//! that references them is appended; callers get the artifact ID back only
//! after every file is on disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;

use delta_domain::interaction::InteractionRequest;
use delta_domain::journal::{EventPayload, JournalEvent};
use delta_domain::run::RunMetadata;
use delta_domain::{Error, Result};

use crate::journal::{self, JournalWriter};
use crate::paths;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Artifact records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One tool execution, as persisted to `io/tool_executions/<id>/`.
#[derive(Debug, Clone)]
pub struct ToolExecutionRecord {
    /// Resolved command line, human-readable.
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Mutable payload handed to a hook via `input/`.
#[derive(Debug, Clone)]
pub enum HookPayload {
    Json(serde_json::Value),
    Raw(Vec<u8>),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
pub struct RunStore {
    run_id: String,
    run_dir: PathBuf,
    journal: JournalWriter,
    /// Serializes read-modify-write metadata updates within this process.
    meta_lock: Mutex<()>,
}

impl RunStore {
    /// Create the control-plane subtree for a fresh run.
    ///
    /// Fails with [`Error::DuplicateRun`] if the run directory already
    /// exists; on any later failure the partially created subtree is
    /// removed so no half-initialized run is left behind.
    pub fn create(
        workspace: &Path,
        run_id: &str,
        agent_ref: &str,
        task: &str,
        hostname: &str,
    ) -> Result<Self> {
        let control = paths::control_plane(workspace);
        fs::create_dir_all(&control)?;

        let version_file = control.join(paths::VERSION_FILE);
        if !version_file.exists() {
            fs::write(&version_file, paths::SCHEMA_VERSION_LINE)?;
        }

        let run_dir = paths::run_dir(workspace, run_id);
        // Fail-if-exists directory creation is the uniqueness check.
        match fs::create_dir(&run_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::DuplicateRun(run_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let init = || -> Result<Self> {
            let metadata = RunMetadata::new(
                run_id.to_string(),
                agent_ref.to_string(),
                task.to_string(),
                hostname.to_string(),
            );
            write_metadata_atomic(&paths::metadata_file(&run_dir), &metadata)?;
            let journal = JournalWriter::open(&paths::journal_file(&run_dir))?;
            Ok(Self {
                run_id: run_id.to_string(),
                run_dir: run_dir.clone(),
                journal,
                meta_lock: Mutex::new(()),
            })
        };

        match init() {
            Ok(store) => Ok(store),
            Err(e) => {
                let _ = fs::remove_dir_all(&run_dir);
                Err(e)
            }
        }
    }

    /// Open an existing run for resumption.
    pub fn open(workspace: &Path, run_id: &str) -> Result<Self> {
        let run_dir = paths::run_dir(workspace, run_id);
        if !paths::metadata_file(&run_dir).exists() {
            return Err(Error::RunState(format!(
                "run '{run_id}' not found in {}",
                paths::control_plane(workspace).display()
            )));
        }
        let journal = JournalWriter::open(&paths::journal_file(&run_dir))?;
        Ok(Self {
            run_id: run_id.to_string(),
            run_dir,
            journal,
            meta_lock: Mutex::new(()),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    // ── Journal ──────────────────────────────────────────────────────

    /// Append one event; returns the assigned sequence number.
    pub fn append_event(&self, payload: EventPayload) -> Result<u64> {
        let seq = self.journal.append(payload)?;
        tracing::trace!(run_id = %self.run_id, seq, "journal event appended");
        Ok(seq)
    }

    pub fn read_journal(&self) -> Result<Vec<JournalEvent>> {
        journal::read_events(&paths::journal_file(&self.run_dir))
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn read_metadata(&self) -> Result<RunMetadata> {
        read_metadata(&self.run_dir)
    }

    /// Read-merge-write metadata. The write is atomic (temp file +
    /// rename) so concurrent readers never observe a partial document.
    pub fn update_metadata(&self, patch: impl FnOnce(&mut RunMetadata)) -> Result<RunMetadata> {
        let _guard = self.meta_lock.lock();
        let mut metadata = read_metadata(&self.run_dir)?;
        patch(&mut metadata);
        write_metadata_atomic(&paths::metadata_file(&self.run_dir), &metadata)?;
        Ok(metadata)
    }

    // ── Artifacts ────────────────────────────────────────────────────

    /// Materialize an LLM invocation artifact directory.
    pub fn save_llm_invocation(
        &self,
        id: &str,
        request: &serde_json::Value,
        response: &serde_json::Value,
        meta: &serde_json::Value,
    ) -> Result<()> {
        let dir = paths::invocation_dir(&self.run_dir, id);
        fs::create_dir_all(&dir)?;
        write_json_pretty(&dir.join("request.json"), request)?;
        write_json_pretty(&dir.join("response.json"), response)?;
        write_json_pretty(&dir.join("metadata.json"), meta)?;
        Ok(())
    }

    /// Materialize a tool-execution artifact directory.
    pub fn save_tool_execution(&self, id: &str, record: &ToolExecutionRecord) -> Result<()> {
        let dir = paths::tool_execution_dir(&self.run_dir, id);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("command.txt"), &record.command)?;
        fs::write(dir.join("stdout.log"), &record.stdout)?;
        fs::write(dir.join("stderr.log"), &record.stderr)?;
        fs::write(dir.join("exit_code.txt"), record.exit_code.to_string())?;
        fs::write(dir.join("duration_ms.txt"), record.duration_ms.to_string())?;
        Ok(())
    }

    /// Create the I/O directory for one hook invocation and populate its
    /// inputs. Returns the directory path.
    pub fn setup_hook_invocation(
        &self,
        step: u32,
        hook_name: &str,
        context: &serde_json::Value,
        payload: Option<&HookPayload>,
    ) -> Result<PathBuf> {
        let dir = paths::hook_dir(&self.run_dir, step, hook_name);
        let input = dir.join("input");
        fs::create_dir_all(&input)?;
        fs::create_dir_all(dir.join("output"))?;
        fs::create_dir_all(dir.join("execution_meta"))?;

        write_json_pretty(&input.join("context.json"), context)?;
        match payload {
            Some(HookPayload::Json(value)) => {
                write_json_pretty(&input.join("payload.json"), value)?;
            }
            Some(HookPayload::Raw(bytes)) => {
                fs::write(input.join("payload.dat"), bytes)?;
            }
            None => {}
        }
        Ok(dir)
    }

    // ── Interaction handshake ────────────────────────────────────────

    pub fn interaction_dir(&self) -> PathBuf {
        paths::interaction_dir(&self.run_dir)
    }

    pub fn write_interaction_request(&self, request: &InteractionRequest) -> Result<()> {
        let dir = self.interaction_dir();
        fs::create_dir_all(&dir)?;
        write_json_pretty(
            &dir.join(paths::INTERACTION_REQUEST_FILE),
            &serde_json::to_value(request)?,
        )
    }

    pub fn read_interaction_request(&self) -> Result<Option<InteractionRequest>> {
        let path = self
            .interaction_dir()
            .join(paths::INTERACTION_REQUEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// The human reply, if one has been written.
    pub fn read_interaction_response(&self) -> Result<Option<String>> {
        let path = self
            .interaction_dir()
            .join(paths::INTERACTION_RESPONSE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    /// Remove the interaction directory once the pause is resolved.
    pub fn clear_interaction(&self) -> Result<()> {
        let dir = self.interaction_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    // ── Engine log ───────────────────────────────────────────────────

    /// Append one line to the free-form diagnostic stream.
    pub fn log_line(&self, line: &str) {
        let path = paths::engine_log_file(&self.run_dir);
        let result = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "[{}] {line}", Utc::now().to_rfc3339()));
        if let Err(e) = result {
            tracing::warn!(error = %e, "engine log write failed");
        }
    }

    // ── Durability ───────────────────────────────────────────────────

    pub fn flush(&self) -> Result<()> {
        self.journal.flush()
    }

    /// Flush and drop write handles. The store is unusable afterwards.
    pub fn close(self) -> Result<()> {
        self.flush()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn read_metadata(run_dir: &Path) -> Result<RunMetadata> {
    let raw = fs::read_to_string(paths::metadata_file(run_dir))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Pretty-printed JSON via temp file + rename, so concurrent readers never
/// see a partial document.
fn write_metadata_atomic(path: &Path, metadata: &RunMetadata) -> Result<()> {
    write_json_pretty_atomic(path, &serde_json::to_value(metadata)?)
}

fn write_json_pretty(path: &Path, value: &serde_json::Value) -> Result<()> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    fs::write(path, body)?;
    Ok(())
}

fn write_json_pretty_atomic(path: &Path, value: &serde_json::Value) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    write_json_pretty(&tmp, value)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
