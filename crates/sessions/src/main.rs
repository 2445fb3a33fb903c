//! `delta-sessions` — workspace-scoped session manager CLI.
//!
//! Invoked by agents as an ordinary tool. Structured results go to
//! stdout as JSON; diagnostics go to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use delta_sessions::{run_holder, SessionManager, DEFAULT_GRACE};

#[derive(Debug, Parser)]
#[command(name = "delta-sessions", version, about)]
struct Cli {
    /// Workspace directory holding the `.sessions/` tree.
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a long-lived session running the given command.
    Start {
        /// Command and arguments to run.
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// Append input to a session (delivered to the child's stdin).
    Write {
        session_id: String,
        /// Data to deliver. A newline is appended unless `--no-newline`.
        data: String,
        #[arg(long)]
        no_newline: bool,
    },
    /// Print the session's combined output so far.
    Read { session_id: String },
    /// End a session (SIGTERM, then SIGKILL after a grace period).
    End { session_id: String },
    /// List all sessions in the workspace.
    List,
    /// Internal: supervise one session child (spawned by `start`).
    #[command(hide = true)]
    Hold {
        #[arg(long)]
        sessions_dir: PathBuf,
        #[arg(long)]
        session_id: String,
        #[arg(required = true, trailing_var_arg = true, last = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let manager = SessionManager::new(&cli.workspace);

    match cli.command {
        Command::Start { command } => {
            let metadata = manager.start(command)?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Command::Write {
            session_id,
            data,
            no_newline,
        } => {
            let payload = if no_newline { data } else { format!("{data}\n") };
            manager.write_input(&session_id, &payload)?;
            println!("{}", serde_json::json!({ "session_id": session_id, "ok": true }));
        }
        Command::Read { session_id } => {
            print!("{}", manager.read_output(&session_id)?);
        }
        Command::End { session_id } => {
            let metadata = manager.end(&session_id, DEFAULT_GRACE)?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Command::List => {
            let sessions = manager.list()?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        Command::Hold {
            sessions_dir,
            session_id,
            command,
        } => {
            let exit_code = run_holder(&sessions_dir, &session_id, command).await?;
            std::process::exit(exit_code);
        }
    }
    Ok(())
}
