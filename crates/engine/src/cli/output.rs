//! RunResult construction and rendering.

use std::io::Write;

use delta_domain::interaction::InteractionRequest;
use delta_domain::result::{
    ErrorInfo, InteractionInfo, ResultMetadata, RunMetrics, RunResult, UsageMetrics,
    SCHEMA_VERSION,
};
use delta_domain::run::{RunMetadata, RunStatus};
use delta_domain::Error;

use super::OutputFormat;

/// Assemble the v2.0 result object from the run's final state.
pub fn build_run_result(
    metadata: &RunMetadata,
    agent_name: &str,
    workspace: &std::path::Path,
    usage: UsageMetrics,
    final_response: Option<&str>,
    interaction: Option<&InteractionRequest>,
    error: Option<&Error>,
) -> RunResult {
    let end_time = metadata.end_time.unwrap_or_else(chrono::Utc::now);
    let duration_ms = (end_time - metadata.start_time).num_milliseconds().max(0) as u64;

    RunResult {
        schema_version: SCHEMA_VERSION.into(),
        run_id: metadata.run_id.clone(),
        status: metadata.status,
        result: final_response.map(|r| serde_json::Value::String(r.to_string())),
        error: error.map(|e| ErrorInfo {
            kind: error_kind(e).into(),
            message: e.to_string(),
            details: None,
        }),
        interaction: interaction.map(|req| InteractionInfo {
            prompt: req.prompt.clone(),
            input_type: req.input_type,
            sensitive: req.sensitive,
        }),
        metrics: RunMetrics {
            iterations: metadata.iterations_completed,
            duration_ms,
            start_time: metadata.start_time,
            end_time,
            usage,
        },
        metadata: ResultMetadata {
            agent_name: agent_name.into(),
            workspace_path: workspace.display().to_string(),
        },
    }
}

fn error_kind(error: &Error) -> &'static str {
    match error {
        Error::Io(_) => "io",
        Error::Json(_) => "serialization",
        Error::Config(_) => "config",
        Error::DuplicateRun(_) => "duplicate_run",
        Error::ApiKey(_) => "api_key",
        Error::Llm { .. } => "llm",
        Error::ContextSource(_) => "context_source",
        Error::Timeout(_) => "timeout",
        Error::Journal(_) => "journal",
        Error::RunState(_) => "run_state",
        Error::Other(_) => "other",
    }
}

/// Write the result to stdout in the selected format. All formats write
/// only to stdout; everything else in the process writes to stderr.
pub fn emit(result: &RunResult, format: OutputFormat) -> std::io::Result<()> {
    let mut out = std::io::stdout();
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string(result)?)?;
        }
        OutputFormat::Raw => {
            // Exactly the assistant content plus a single trailing
            // newline; nothing for non-completed runs.
            if let Some(serde_json::Value::String(content)) = &result.result {
                write!(out, "{content}")?;
                if !content.ends_with('\n') {
                    writeln!(out)?;
                }
            }
        }
        OutputFormat::Text => {
            writeln!(out, "run:        {}", result.run_id)?;
            writeln!(out, "status:     {}", result.status)?;
            writeln!(out, "iterations: {}", result.metrics.iterations)?;
            writeln!(out, "duration:   {}ms", result.metrics.duration_ms)?;
            if let Some(serde_json::Value::String(content)) = &result.result {
                writeln!(out, "\n{content}")?;
            }
            if let Some(err) = &result.error {
                writeln!(out, "\nerror ({}): {}", err.kind, err.message)?;
            }
            if let Some(interaction) = &result.interaction {
                writeln!(out, "\nwaiting for input: {}", interaction.prompt)?;
            }
        }
    }
    out.flush()
}

/// Exit code for a finished invocation.
pub fn exit_code_for(status: RunStatus) -> i32 {
    match status {
        RunStatus::Completed => 0,
        RunStatus::WaitingForInput => delta_domain::interaction::PAUSE_EXIT_CODE,
        RunStatus::Interrupted => 130,
        RunStatus::Running | RunStatus::Failed => 1,
    }
}
