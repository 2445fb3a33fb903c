//! Control-plane layout. One place for every path the store touches.
//!
//! ```text
//! <workspace>/.delta/
//!   VERSION
//!   <run_id>/
//!     metadata.json
//!     journal.jsonl
//!     engine.log
//!     interaction/{request.json, response.txt}
//!     io/invocations/<id>/{request.json, response.json, metadata.json}
//!     io/tool_executions/<id>/{command.txt, stdout.log, stderr.log,
//!                              exit_code.txt, duration_ms.txt}
//!     io/hooks/<NNN>_<hook_name>/{input/, output/, execution_meta/}
//! ```

use std::path::{Path, PathBuf};

pub const CONTROL_PLANE_DIR: &str = ".delta";
pub const VERSION_FILE: &str = "VERSION";
pub const SCHEMA_VERSION_LINE: &str = "1.2\n";

pub const METADATA_FILE: &str = "metadata.json";
pub const JOURNAL_FILE: &str = "journal.jsonl";
pub const ENGINE_LOG_FILE: &str = "engine.log";

pub const INTERACTION_DIR: &str = "interaction";
pub const INTERACTION_REQUEST_FILE: &str = "request.json";
pub const INTERACTION_RESPONSE_FILE: &str = "response.txt";

pub const IO_DIR: &str = "io";
pub const INVOCATIONS_DIR: &str = "invocations";
pub const TOOL_EXECUTIONS_DIR: &str = "tool_executions";
pub const HOOKS_DIR: &str = "hooks";

pub fn control_plane(workspace: &Path) -> PathBuf {
    workspace.join(CONTROL_PLANE_DIR)
}

pub fn run_dir(workspace: &Path, run_id: &str) -> PathBuf {
    control_plane(workspace).join(run_id)
}

pub fn metadata_file(run_dir: &Path) -> PathBuf {
    run_dir.join(METADATA_FILE)
}

pub fn journal_file(run_dir: &Path) -> PathBuf {
    run_dir.join(JOURNAL_FILE)
}

pub fn engine_log_file(run_dir: &Path) -> PathBuf {
    run_dir.join(ENGINE_LOG_FILE)
}

pub fn interaction_dir(run_dir: &Path) -> PathBuf {
    run_dir.join(INTERACTION_DIR)
}

pub fn invocation_dir(run_dir: &Path, id: &str) -> PathBuf {
    run_dir.join(IO_DIR).join(INVOCATIONS_DIR).join(id)
}

pub fn tool_execution_dir(run_dir: &Path, id: &str) -> PathBuf {
    run_dir.join(IO_DIR).join(TOOL_EXECUTIONS_DIR).join(id)
}

pub fn hook_dir(run_dir: &Path, step: u32, hook_name: &str) -> PathBuf {
    run_dir
        .join(IO_DIR)
        .join(HOOKS_DIR)
        .join(format!("{step:03}_{hook_name}"))
}
