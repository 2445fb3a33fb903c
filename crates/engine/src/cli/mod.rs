//! CLI surface: `delta run`, `delta continue`, `delta list-runs`.
//!
//! I/O separation: logs and diagnostics go to stderr; the
//! `--format`-selected structured result is the only thing written to
//! stdout. Exit codes: 0 success, 1 error, 101 paused for human input,
//! 130 interrupted.

pub mod continue_cmd;
pub mod list_runs;
pub mod output;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// delta — a minimalist runtime for LLM-driven agents.
#[derive(Debug, Parser)]
#[command(name = "delta", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    Text,
    /// One RunResult JSON object (schema v2.0).
    Json,
    /// Only the final assistant content.
    Raw,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Raw => "raw",
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute an agent against a task.
    Run {
        /// Agent directory (contains agent.yaml).
        #[arg(long, default_value = ".")]
        agent: PathBuf,
        /// The task message.
        #[arg(short, long)]
        message: String,
        /// Workspace directory. Omit to select one interactively.
        #[arg(short = 'w', long)]
        work_dir: Option<PathBuf>,
        /// Client-supplied run ID (default: timestamp + hex suffix).
        #[arg(long)]
        run_id: Option<String>,
        /// Override the agent's max_iterations.
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Answer ask_human prompts on this terminal instead of pausing.
        #[arg(short, long)]
        interactive: bool,
        /// Skip the workspace selection prompt (use LAST_USED or W001).
        #[arg(short = 'y', long)]
        yes: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Continue an existing run.
    Continue {
        /// Workspace directory of the run.
        #[arg(short = 'w', long)]
        work_dir: PathBuf,
        /// Run ID to continue.
        #[arg(long)]
        run_id: String,
        /// Additional user message (required for COMPLETED/FAILED runs,
        /// answers the pending question for WAITING_FOR_INPUT).
        #[arg(short, long)]
        message: Option<String>,
        /// Reclaim a RUNNING run recorded on another host.
        #[arg(long)]
        force: bool,
        /// Answer ask_human prompts on this terminal instead of pausing.
        #[arg(short, long)]
        interactive: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List the runs in a workspace.
    ListRuns {
        /// Workspace directory.
        #[arg(short = 'w', long)]
        work_dir: PathBuf,
        /// Only runs that can be continued without a new message.
        #[arg(long)]
        resumable: bool,
        /// Filter by status (e.g. COMPLETED, WAITING_FOR_INPUT).
        #[arg(long)]
        status: Option<String>,
        /// Print only the first matching run.
        #[arg(long)]
        first: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

/// End every session in the workspace; called on any run termination
/// other than WAITING_FOR_INPUT.
pub fn cleanup_sessions(workspace: &std::path::Path) {
    let sessions = delta_sessions::SessionManager::new(workspace);
    match sessions.end_all(delta_sessions::DEFAULT_GRACE) {
        Ok(0) => {}
        Ok(n) => tracing::info!(ended = n, "workspace sessions ended"),
        Err(e) => tracing::warn!(error = %e, "session cleanup failed"),
    }
}
