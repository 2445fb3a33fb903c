//! `delta run` — create a run and drive it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use delta_providers::{LlmClient, OpenAiCompatClient};
use delta_store::{RunStore, WorkspaceManager};

use crate::agent::load_agent;
use crate::env::load_env_cascade;
use crate::runtime::engine::{Engine, EngineConfig, EngineOutcome};
use crate::runtime::{janitor, signals};

use super::output::{build_run_result, emit, exit_code_for};
use super::{cleanup_sessions, OutputFormat};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    agent: PathBuf,
    message: String,
    work_dir: Option<PathBuf>,
    run_id: Option<String>,
    max_iterations: Option<u32>,
    interactive: bool,
    yes: bool,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    let agent_home = agent
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("agent directory {}: {e}", agent.display()))?;

    // 1. Pick the workspace.
    let workspace = select_workspace(&agent_home, work_dir, yes)?;

    // 2. Environment cascade (diagnostic list to stderr).
    let loaded = load_env_cascade(&workspace, &agent_home, &std::env::current_dir()?);
    for file in &loaded {
        eprintln!("loaded env: {}", file.display());
    }

    // 3. Agent + LLM client. Both fail before any run state exists.
    let agent_def = load_agent(&agent_home)?;
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiCompatClient::from_env()?);

    // 4. Create the run.
    let run_id = run_id.unwrap_or_else(delta_domain::run::generate_run_id);
    let store = Arc::new(RunStore::create(
        &workspace,
        &run_id,
        &agent_home.display().to_string(),
        &message,
        &janitor::current_hostname(),
    )?);
    tracing::info!(run_id = %run_id, workspace = %workspace.display(), "run created");

    signals::install(store.clone(), workspace.clone());

    let config = EngineConfig {
        max_iterations: max_iterations.unwrap_or(agent_def.max_iterations),
        agent: agent_def,
        agent_home,
        workspace: workspace.clone(),
        interactive,
    };
    let agent_name = config.agent.name.clone();

    drive(config, store, llm, None, &agent_name, &workspace, format).await
}

/// Shared tail of `run` and `continue`: run the engine, render the
/// result, clean up, and map the exit code.
pub(super) async fn drive(
    config: EngineConfig,
    store: Arc<RunStore>,
    llm: Arc<dyn LlmClient>,
    new_message: Option<String>,
    agent_name: &str,
    workspace: &Path,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    let mut engine = Engine::new(config, store.clone(), llm);
    let outcome = engine.run(new_message).await;
    let usage = engine.usage().clone();
    let metadata = store.read_metadata()?;

    let (final_response, interaction, error) = match &outcome {
        Ok(EngineOutcome::Completed { final_response }) => {
            (Some(final_response.as_str()), None, None)
        }
        Ok(EngineOutcome::WaitingForInput { request }) => (None, Some(request), None),
        Err(e) => (None, None, Some(e)),
    };

    if let Some(request) = interaction {
        crate::runtime::interaction::print_pause_banner(request, &store.interaction_dir());
    }

    let result = build_run_result(
        &metadata,
        agent_name,
        workspace,
        usage,
        final_response,
        interaction,
        error,
    );
    emit(&result, format)?;

    // Sessions survive only a WAITING_FOR_INPUT pause.
    if metadata.status != delta_domain::run::RunStatus::WaitingForInput {
        cleanup_sessions(workspace);
    }

    store.flush()?;
    Ok(exit_code_for(metadata.status))
}

/// Resolve the target workspace.
///
/// An explicit `--work-dir` is used as-is and never touches `LAST_USED`.
/// Otherwise the user picks interactively (recorded in `LAST_USED`), or
/// `-y` takes the last used workspace, falling back to creating the
/// first one.
fn select_workspace(
    agent_home: &Path,
    work_dir: Option<PathBuf>,
    yes: bool,
) -> anyhow::Result<PathBuf> {
    if let Some(dir) = work_dir {
        std::fs::create_dir_all(&dir)?;
        return Ok(dir.canonicalize()?);
    }

    let manager = WorkspaceManager::new(agent_home);
    if yes {
        return Ok(match manager.last_used() {
            Some(path) => path,
            None => manager.create_next()?,
        });
    }

    let existing = manager.list()?;
    eprintln!("select a workspace:");
    for (i, ws) in existing.iter().enumerate() {
        let name = ws.file_name().and_then(|n| n.to_str()).unwrap_or("?");
        eprintln!("  [{}] {name}", i + 1);
    }
    eprintln!("  [n] create a new workspace");

    let mut editor =
        rustyline::DefaultEditor::new().map_err(|e| anyhow::anyhow!("prompt init: {e}"))?;
    let selected = loop {
        let line = editor
            .readline("workspace> ")
            .map_err(|e| anyhow::anyhow!("reading selection: {e}"))?;
        let choice = line.trim();
        if choice.eq_ignore_ascii_case("n") {
            break manager.create_next()?;
        }
        if let Ok(idx) = choice.parse::<usize>() {
            if idx >= 1 && idx <= existing.len() {
                break existing[idx - 1].clone();
            }
        }
        eprintln!("enter a number between 1 and {} or 'n'", existing.len());
    };

    manager.set_last_used(&selected)?;
    Ok(selected)
}
