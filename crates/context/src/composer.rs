//! Manifest resolution — one pass per iteration.
//!
//! Sources resolve in declaration order; the per-source message lists are
//! concatenated. The very first message handed to the LLM is always the
//! agent's system prompt.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use delta_domain::manifest::{ContextManifest, ContextSource, OnMissing};
use delta_domain::message::ChatMessage;
use delta_domain::{Error, Result};
use delta_store::RunStore;

use crate::reconstruct::reconstruct_messages;
use crate::vars;

/// Everything a composition pass needs besides the manifest itself.
pub struct ComposeEnv<'a> {
    pub agent_home: &'a Path,
    /// Workspace data-plane root; generators run here and `${CWD}`
    /// expands to it.
    pub workspace: &'a Path,
    pub run_id: &'a str,
    pub system_prompt: &'a str,
}

/// Resolve the manifest into the ordered message list for one request.
pub async fn compose(
    manifest: &ContextManifest,
    env: &ComposeEnv<'_>,
    store: &RunStore,
) -> Result<Vec<ChatMessage>> {
    let mut messages = vec![ChatMessage::system(env.system_prompt.to_string())];

    for source in &manifest.sources {
        match source {
            ContextSource::File { path, on_missing } => {
                if let Some(content) = read_file_source(path, *on_missing, env)? {
                    messages.push(ChatMessage::system(content));
                }
            }
            ContextSource::ComputedFile {
                generator_command,
                output_path,
                timeout_ms,
            } => {
                let content =
                    run_generator(generator_command, output_path, *timeout_ms, env).await?;
                messages.push(ChatMessage::system(content));
            }
            ContextSource::Journal { max_iterations } => {
                let events = store.read_journal()?;
                messages.extend(reconstruct_messages(&events, *max_iterations));
            }
        }
    }

    Ok(messages)
}

fn read_file_source(
    path: &str,
    on_missing: OnMissing,
    env: &ComposeEnv<'_>,
) -> Result<Option<String>> {
    let expanded = PathBuf::from(vars::expand(path, env.agent_home, env.workspace));
    match std::fs::read_to_string(&expanded) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => match on_missing {
            OnMissing::Skip => {
                tracing::debug!(path = %expanded.display(), "skipping missing context file");
                Ok(None)
            }
            OnMissing::Error => Err(Error::ContextSource(format!(
                "required context file missing: {}",
                expanded.display()
            ))),
        },
        Err(e) => Err(e.into()),
    }
}

/// Run a generator command, then read its `output_path` like a file
/// source. Timeout kills the child and fails the composition.
async fn run_generator(
    command: &[String],
    output_path: &str,
    timeout_ms: u64,
    env: &ComposeEnv<'_>,
) -> Result<String> {
    if command.is_empty() {
        return Err(Error::ContextSource("empty generator command".into()));
    }

    let argv: Vec<String> = command
        .iter()
        .map(|c| vars::expand(c, env.agent_home, env.workspace))
        .collect();

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..])
        .current_dir(env.workspace)
        .env("DELTA_RUN_ID", env.run_id)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| Error::ContextSource(format!("spawning generator '{}': {e}", argv[0])))?;

    let output = match tokio::time::timeout(
        std::time::Duration::from_millis(timeout_ms),
        child.wait_with_output(),
    )
    .await
    {
        Ok(result) => {
            result.map_err(|e| Error::ContextSource(format!("waiting for generator: {e}")))?
        }
        Err(_) => {
            // kill_on_drop reaps the child when the future is dropped.
            return Err(Error::Timeout(format!(
                "context generator '{}' exceeded {timeout_ms}ms",
                argv[0]
            )));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ContextSource(format!(
            "generator '{}' exited with {:?}: {}",
            argv[0],
            output.status.code(),
            stderr.trim()
        )));
    }

    let produced = PathBuf::from(vars::expand(output_path, env.agent_home, env.workspace));
    std::fs::read_to_string(&produced).map_err(|e| {
        Error::ContextSource(format!(
            "generator '{}' did not produce {}: {e}",
            argv[0],
            produced.display()
        ))
    })
}
