//! `delta continue` — resume an existing run.

use std::path::PathBuf;
use std::sync::Arc;

use delta_domain::run::RunStatus;
use delta_providers::{LlmClient, OpenAiCompatClient};
use delta_store::RunStore;

use crate::agent::load_agent;
use crate::env::load_env_cascade;
use crate::runtime::engine::EngineConfig;
use crate::runtime::janitor::{self, reclaim_if_orphaned};
use crate::runtime::{lifecycle, signals};

use super::run::drive;
use super::OutputFormat;

pub async fn continue_run(
    work_dir: PathBuf,
    run_id: String,
    message: Option<String>,
    force: bool,
    interactive: bool,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    let workspace = work_dir
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("workspace {}: {e}", work_dir.display()))?;

    let store = Arc::new(RunStore::open(&workspace, &run_id)?);
    let metadata = store.read_metadata()?;

    // A RUNNING run needs the janitor's verdict before anything else.
    if metadata.status == RunStatus::Running {
        reclaim_if_orphaned(&store, force)?;
    }

    let metadata = store.read_metadata()?;
    let has_response = store.read_interaction_response()?.is_some();
    lifecycle::check_resume(metadata.status, message.is_some(), has_response)?;

    // For a paused run with no file-based response yet, the message *is*
    // the answer — route it through the interaction handshake instead of
    // the conversation.
    let mut engine_message = message;
    if metadata.status == RunStatus::WaitingForInput && !has_response {
        if let Some(answer) = engine_message.take() {
            let dir = store.interaction_dir();
            std::fs::create_dir_all(&dir)?;
            std::fs::write(dir.join("response.txt"), answer)?;
        }
    }

    // Take ownership of the run.
    store.update_metadata(|m| {
        m.status = RunStatus::Running;
        m.end_time = None;
        m.pid = std::process::id();
        m.hostname = janitor::current_hostname();
    })?;

    let agent_home = PathBuf::from(&metadata.agent_ref);
    let loaded = load_env_cascade(&workspace, &agent_home, &std::env::current_dir()?);
    for file in &loaded {
        eprintln!("loaded env: {}", file.display());
    }

    let agent_def = load_agent(&agent_home)?;
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiCompatClient::from_env()?);

    signals::install(store.clone(), workspace.clone());

    let config = EngineConfig {
        max_iterations: agent_def.max_iterations,
        agent: agent_def,
        agent_home,
        workspace: workspace.clone(),
        interactive,
    };
    let agent_name = config.agent.name.clone();

    drive(
        config,
        store,
        llm,
        engine_message,
        &agent_name,
        &workspace,
        format,
    )
    .await
}
