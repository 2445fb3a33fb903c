use clap::Parser;
use tracing_subscriber::EnvFilter;

use delta_engine::cli::{continue_cmd, list_runs, run, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Command::Run {
            agent,
            message,
            work_dir,
            run_id,
            max_iterations,
            interactive,
            yes,
            format,
        } => {
            run::run(
                agent,
                message,
                work_dir,
                run_id,
                max_iterations,
                interactive,
                yes,
                format,
            )
            .await?
        }
        Command::Continue {
            work_dir,
            run_id,
            message,
            force,
            interactive,
            format,
        } => {
            continue_cmd::continue_run(work_dir, run_id, message, force, interactive, format)
                .await?
        }
        Command::ListRuns {
            work_dir,
            resumable,
            status,
            first,
            format,
        } => list_runs::list(work_dir, resumable, status, first, format)?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

/// Diagnostics go to stderr; stdout is reserved for structured results.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
