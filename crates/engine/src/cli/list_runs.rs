//! `delta list-runs` — read-only run discovery.

use std::io::Write;
use std::path::PathBuf;

use delta_domain::run::{RunMetadata, RunStatus};
use delta_store::workspace::list_runs;

use super::OutputFormat;

/// Whether a run can be picked up again without supplying a new message.
fn is_resumable(status: RunStatus) -> bool {
    matches!(
        status,
        RunStatus::WaitingForInput | RunStatus::Interrupted
    )
}

pub fn list(
    work_dir: PathBuf,
    resumable: bool,
    status: Option<String>,
    first: bool,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    let mut runs = list_runs(&work_dir)?;

    if resumable {
        runs.retain(|r| is_resumable(r.status));
    }
    if let Some(wanted) = &status {
        runs.retain(|r| r.status.to_string().eq_ignore_ascii_case(wanted));
    }
    if first {
        runs.truncate(1);
    }

    let mut out = std::io::stdout();
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            writeln!(out, "{}", serde_json::to_string(&runs)?)?;
        }
        OutputFormat::Text => {
            if runs.is_empty() {
                writeln!(out, "no runs")?;
            }
            for run in &runs {
                writeln!(out, "{}", render_line(run))?;
            }
        }
    }
    out.flush()?;
    Ok(0)
}

fn render_line(run: &RunMetadata) -> String {
    format!(
        "{:<30} {:<18} iter={:<3} {}",
        run.run_id,
        run.status.to_string(),
        run.iterations_completed,
        run.start_time.format("%Y-%m-%d %H:%M:%S"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resumable_set() {
        assert!(is_resumable(RunStatus::WaitingForInput));
        assert!(is_resumable(RunStatus::Interrupted));
        assert!(!is_resumable(RunStatus::Running));
        assert!(!is_resumable(RunStatus::Completed));
        assert!(!is_resumable(RunStatus::Failed));
    }

    #[test]
    fn render_line_contains_id_and_status() {
        let mut run =
            RunMetadata::new("run-x".into(), "/a".into(), "t".into(), "h".into());
        run.status = RunStatus::Completed;
        let line = render_line(&run);
        assert!(line.contains("run-x"));
        assert!(line.contains("COMPLETED"));
    }
}
