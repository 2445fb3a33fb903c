//! The TAO driver.
//!
//! Stateless by design: no conversation survives in memory across
//! iterations. Every iteration rebuilds its messages from the journal,
//! which makes any crash, signal, or external continuation resumable by
//! re-entering the same run directory.

use std::path::PathBuf;
use std::sync::Arc;

use delta_context::{compose, ComposeEnv};
use delta_domain::agent::AgentDefinition;
use delta_domain::interaction::{InteractionRequest, ASK_HUMAN_TOOL};
use delta_domain::journal::{ActionStatus, EventPayload, SystemLevel};
use delta_domain::result::UsageMetrics;
use delta_domain::run::RunStatus;
use delta_domain::{Error, Result};
use delta_providers::schema::all_schemas;
use delta_providers::{build_request, LlmClient};
use delta_store::{HookPayload, RunStore, ToolExecutionRecord};
use delta_tools::{build_invocation, execute, format_observation};

use super::hooks::HookExecutor;
use super::interaction::{self, PendingAction};

/// Final response when the iteration budget runs out.
pub const MAX_ITERATIONS_MESSAGE: &str =
    "Maximum iterations reached. Task may be incomplete.";
/// Final response when the model stops without content.
const DEFAULT_COMPLETION: &str = "Task completed.";

pub struct EngineConfig {
    pub agent: AgentDefinition,
    pub agent_home: PathBuf,
    /// Workspace data-plane root.
    pub workspace: PathBuf,
    /// Agent default, possibly overridden by the caller.
    pub max_iterations: u32,
    pub interactive: bool,
}

#[derive(Debug)]
pub enum EngineOutcome {
    Completed { final_response: String },
    WaitingForInput { request: InteractionRequest },
}

enum StepOutcome {
    Continue,
    Paused(InteractionRequest),
}

pub struct Engine {
    config: EngineConfig,
    store: Arc<RunStore>,
    llm: Arc<dyn LlmClient>,
    hooks: HookExecutor,
    usage: UsageMetrics,
}

impl Engine {
    pub fn new(config: EngineConfig, store: Arc<RunStore>, llm: Arc<dyn LlmClient>) -> Self {
        let hooks = HookExecutor::new(
            store.clone(),
            config.agent.hooks.clone(),
            &config.workspace,
        );
        Self {
            config,
            store,
            llm,
            hooks,
            usage: UsageMetrics::default(),
        }
    }

    pub fn usage(&self) -> &UsageMetrics {
        &self.usage
    }

    /// Drive the run to completion, a pause, or an error.
    ///
    /// `new_message` is an additional user message supplied by a
    /// continuation; fresh runs take their task from the metadata.
    pub async fn run(&mut self, new_message: Option<String>) -> Result<EngineOutcome> {
        let result = self.run_inner(new_message).await;
        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.handle_fatal(&e).await;
                Err(e)
            }
        }
    }

    async fn run_inner(&mut self, new_message: Option<String>) -> Result<EngineOutcome> {
        let events = self.store.read_journal()?;
        if events.is_empty() {
            let metadata = self.store.read_metadata()?;
            self.store.append_event(EventPayload::RunStart {
                task: metadata.task.clone(),
                agent_ref: metadata.agent_ref.clone(),
            })?;
            self.store.append_event(EventPayload::UserMessage {
                content: metadata.task,
            })?;
            self.store.log_line("run started");
        } else {
            self.store.log_line("resuming run from journal");
            if let Some(message) = new_message {
                self.store
                    .append_event(EventPayload::UserMessage { content: message })?;
            }
        }

        // ── Resolve work left over from a previous process ───────────
        let events = self.store.read_journal()?;
        if let Some(pending) = interaction::pending_ask_human(&events) {
            match self.resolve_pending_ask_human(&pending).await? {
                StepOutcome::Continue => {}
                StepOutcome::Paused(request) => {
                    return Ok(EngineOutcome::WaitingForInput { request });
                }
            }
        }
        let leftovers: Vec<PendingAction> = interaction::pending_actions(&events)
            .into_iter()
            .filter(|p| p.tool_name != ASK_HUMAN_TOOL)
            .collect();
        if !leftovers.is_empty() {
            self.store.log_line(&format!(
                "re-dispatching {} pending tool call(s)",
                leftovers.len()
            ));
            if let StepOutcome::Paused(request) = self.dispatch_actions(leftovers).await? {
                return Ok(EngineOutcome::WaitingForInput { request });
            }
        }

        // ── TAO loop ─────────────────────────────────────────────────
        let mut iteration = 0u32;
        while iteration < self.config.max_iterations {
            tracing::debug!(iteration, "TAO iteration");

            // Think.
            let response = self.think(iteration).await?;

            // Advisory post-response hook.
            self.hooks
                .run(
                    "post_llm_resp",
                    serde_json::json!({
                        "iteration": iteration,
                        "run_id": self.store.run_id(),
                    }),
                    Some(HookPayload::Json(response.raw.clone())),
                )
                .await;

            // No tool calls — the model is done.
            if response.tool_calls.is_empty() {
                let final_response = response
                    .content
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| DEFAULT_COMPLETION.to_string());
                self.finalize_completed(&final_response).await?;
                return Ok(EngineOutcome::Completed { final_response });
            }

            // Act + Observe, strictly in emission order.
            let actions: Vec<PendingAction> = response
                .tool_calls
                .iter()
                .map(|tc| PendingAction {
                    action_id: tc.id.clone(),
                    tool_name: tc.name.clone(),
                    tool_args: tc.arguments.clone(),
                    requested: false,
                })
                .collect();
            if let StepOutcome::Paused(request) = self.dispatch_actions(actions).await? {
                return Ok(EngineOutcome::WaitingForInput { request });
            }

            self.store.update_metadata(|m| {
                m.iterations_completed += 1;
            })?;
            iteration += 1;
        }

        // Iteration limit exhausted.
        self.store.append_event(EventPayload::SystemMessage {
            level: SystemLevel::Warn,
            content: format!(
                "maximum iterations ({}) reached without a final response",
                self.config.max_iterations
            ),
        })?;
        self.finalize_completed(MAX_ITERATIONS_MESSAGE).await?;
        Ok(EngineOutcome::Completed {
            final_response: MAX_ITERATIONS_MESSAGE.to_string(),
        })
    }

    // ── Think ────────────────────────────────────────────────────────

    /// Compose the request, offer it to `pre_llm_req`, call the LLM, and
    /// journal the THOUGHT with its invocation artifact.
    async fn think(&mut self, iteration: u32) -> Result<delta_providers::LlmResponse> {
        let env = ComposeEnv {
            agent_home: &self.config.agent_home,
            workspace: &self.config.workspace,
            run_id: self.store.run_id(),
            system_prompt: &self.config.agent.system_prompt,
        };
        let messages = compose(&self.config.agent.context, &env, &self.store).await?;

        let p_base = build_request(
            &self.config.agent.llm,
            &messages,
            &all_schemas(&self.config.agent.tools),
        );

        let hook_outcome = self
            .hooks
            .run(
                "pre_llm_req",
                serde_json::json!({
                    "iteration": iteration,
                    "run_id": self.store.run_id(),
                }),
                Some(HookPayload::Json(p_base.clone())),
            )
            .await;
        // Hook failure falls back to the baseline payload.
        let p_final = hook_outcome.payload_override.unwrap_or(p_base);

        let started = std::time::Instant::now();
        let response = self.llm.call(&p_final).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        if let Some(usage) = &response.usage {
            self.usage.record(
                &self.config.agent.llm.model,
                usage.prompt_tokens,
                usage.completion_tokens,
            );
        }

        // Artifact first, event second.
        let invocation_id = new_artifact_id("inv");
        let meta = serde_json::json!({
            "model": self.config.agent.llm.model,
            "duration_ms": duration_ms,
            "finish_reason": response.finish_reason,
            "usage": response.usage,
        });
        self.store
            .save_llm_invocation(&invocation_id, &p_final, &response.raw, &meta)?;
        self.store.append_event(EventPayload::Thought {
            content: response.content.clone().unwrap_or_default(),
            invocation_ref: invocation_id,
            tool_calls: response.raw_tool_calls.clone(),
        })?;

        Ok(response)
    }

    // ── Act ──────────────────────────────────────────────────────────

    /// Dispatch actions sequentially. An `ask_human` in non-interactive
    /// mode pauses the run; everything else records a result and
    /// continues so the model can react on the next turn.
    async fn dispatch_actions(&mut self, actions: Vec<PendingAction>) -> Result<StepOutcome> {
        for action in actions {
            if action.tool_name == ASK_HUMAN_TOOL {
                if !action.requested {
                    self.store.append_event(EventPayload::ActionRequest {
                        action_id: action.action_id.clone(),
                        tool_name: ASK_HUMAN_TOOL.into(),
                        tool_args: action.tool_args.clone(),
                        resolved_command: ASK_HUMAN_TOOL.into(),
                    })?;
                }
                match self.handle_ask_human(&action).await? {
                    StepOutcome::Continue => continue,
                    paused => return Ok(paused),
                }
            }

            self.execute_tool_action(&action).await?;
        }
        Ok(StepOutcome::Continue)
    }

    async fn execute_tool_action(&mut self, action: &PendingAction) -> Result<()> {
        let Some(tool) = self.config.agent.find_tool(&action.tool_name).cloned() else {
            self.store.append_event(EventPayload::SystemMessage {
                level: SystemLevel::Error,
                content: format!("tool '{}' is not defined", action.tool_name),
            })?;
            if !action.requested {
                self.store.append_event(EventPayload::ActionRequest {
                    action_id: action.action_id.clone(),
                    tool_name: action.tool_name.clone(),
                    tool_args: action.tool_args.clone(),
                    resolved_command: action.tool_name.clone(),
                })?;
            }
            self.store.append_event(EventPayload::ActionResult {
                action_id: action.action_id.clone(),
                status: ActionStatus::Error,
                observation_content: format!(
                    "Error: tool '{}' is not defined for this agent",
                    action.tool_name
                ),
                execution_ref: None,
            })?;
            return Ok(());
        };

        let invocation = match build_invocation(&tool, &action.tool_args) {
            Ok(inv) => inv,
            Err(e) => {
                if !action.requested {
                    self.store.append_event(EventPayload::ActionRequest {
                        action_id: action.action_id.clone(),
                        tool_name: action.tool_name.clone(),
                        tool_args: action.tool_args.clone(),
                        resolved_command: action.tool_name.clone(),
                    })?;
                }
                self.store.append_event(EventPayload::ActionResult {
                    action_id: action.action_id.clone(),
                    status: ActionStatus::Error,
                    observation_content: format!("Error: {e}"),
                    execution_ref: None,
                })?;
                return Ok(());
            }
        };
        let resolved_command = invocation.display();

        if !action.requested {
            self.store.append_event(EventPayload::ActionRequest {
                action_id: action.action_id.clone(),
                tool_name: action.tool_name.clone(),
                tool_args: action.tool_args.clone(),
                resolved_command: resolved_command.clone(),
            })?;
        }

        // Pre-execution hook may skip the tool entirely.
        let pre = self
            .hooks
            .run(
                "pre_tool_exec",
                serde_json::json!({
                    "action_id": action.action_id,
                    "tool_name": action.tool_name,
                }),
                Some(HookPayload::Json(serde_json::json!({
                    "tool_name": action.tool_name,
                    "arguments": action.tool_args,
                    "command": invocation.argv,
                }))),
            )
            .await;
        if pre.skip {
            self.store.append_event(EventPayload::ActionResult {
                action_id: action.action_id.clone(),
                status: ActionStatus::Success,
                observation_content: "(Tool execution skipped by pre_tool_exec hook)".into(),
                execution_ref: None,
            })?;
            return Ok(());
        }

        match execute(&invocation, &self.config.workspace).await {
            Ok(result) => {
                let execution_id = new_artifact_id("exec");
                self.store.save_tool_execution(
                    &execution_id,
                    &ToolExecutionRecord {
                        command: resolved_command,
                        stdout: result.stdout.clone(),
                        stderr: result.stderr.clone(),
                        exit_code: result.exit_code,
                        duration_ms: result.duration_ms,
                    },
                )?;
                let observation = format_observation(&result);
                let status = if result.success {
                    ActionStatus::Success
                } else {
                    ActionStatus::Failed
                };
                self.store.append_event(EventPayload::ActionResult {
                    action_id: action.action_id.clone(),
                    status,
                    observation_content: observation.clone(),
                    execution_ref: Some(execution_id),
                })?;

                self.hooks
                    .run(
                        "post_tool_exec",
                        serde_json::json!({
                            "action_id": action.action_id,
                            "tool_name": action.tool_name,
                        }),
                        Some(HookPayload::Json(serde_json::json!({
                            "tool_name": action.tool_name,
                            "exit_code": result.exit_code,
                            "observation": observation,
                        }))),
                    )
                    .await;
            }
            Err(e) => {
                // Spawn failure: surfaced to the model, not fatal.
                self.store.append_event(EventPayload::ActionResult {
                    action_id: action.action_id.clone(),
                    status: ActionStatus::Error,
                    observation_content: format!("Error: {e}"),
                    execution_ref: None,
                })?;
            }
        }
        Ok(())
    }

    // ── Ask-human ────────────────────────────────────────────────────

    async fn handle_ask_human(&mut self, action: &PendingAction) -> Result<StepOutcome> {
        let request =
            InteractionRequest::from_tool_args(action.action_id.clone(), &action.tool_args);

        if self.config.interactive {
            let answer = interaction::prompt_locally(&request)?;
            self.record_human_answer(&action.action_id, &answer)?;
            return Ok(StepOutcome::Continue);
        }

        self.store.write_interaction_request(&request)?;
        self.store.update_metadata(|m| {
            m.status = RunStatus::WaitingForInput;
        })?;
        self.store
            .log_line(&format!("paused for human input ({})", action.action_id));
        Ok(StepOutcome::Paused(request))
    }

    /// Ingest a leftover `ask_human` on resume: prefer `response.txt`,
    /// fall back to a local prompt in interactive mode, otherwise stay
    /// paused.
    async fn resolve_pending_ask_human(&mut self, pending: &PendingAction) -> Result<StepOutcome> {
        if let Some(response) = self.store.read_interaction_response()? {
            self.record_human_answer(&pending.action_id, &response)?;
            return Ok(StepOutcome::Continue);
        }
        if self.config.interactive {
            let request =
                InteractionRequest::from_tool_args(pending.action_id.clone(), &pending.tool_args);
            let answer = interaction::prompt_locally(&request)?;
            self.record_human_answer(&pending.action_id, &answer)?;
            return Ok(StepOutcome::Continue);
        }

        // Still unanswered — make sure the request file exists and stay
        // paused.
        let request = match self.store.read_interaction_request()? {
            Some(existing) => existing,
            None => {
                let request = InteractionRequest::from_tool_args(
                    pending.action_id.clone(),
                    &pending.tool_args,
                );
                self.store.write_interaction_request(&request)?;
                request
            }
        };
        self.store.update_metadata(|m| {
            m.status = RunStatus::WaitingForInput;
        })?;
        Ok(StepOutcome::Paused(request))
    }

    /// Record a human answer exactly once: artifact first, then the
    /// `ACTION_RESULT`, then the interaction directory is cleared so a
    /// repeated `continue` cannot ingest the response twice.
    fn record_human_answer(&mut self, action_id: &str, answer: &str) -> Result<()> {
        let execution_id = new_artifact_id("exec");
        self.store.save_tool_execution(
            &execution_id,
            &ToolExecutionRecord {
                command: ASK_HUMAN_TOOL.into(),
                stdout: answer.to_string(),
                stderr: String::new(),
                exit_code: 0,
                duration_ms: 0,
            },
        )?;
        self.store.append_event(EventPayload::ActionResult {
            action_id: action_id.to_string(),
            status: ActionStatus::Success,
            observation_content: answer.to_string(),
            execution_ref: Some(execution_id),
        })?;
        self.store.clear_interaction()?;
        self.store.update_metadata(|m| {
            m.status = RunStatus::Running;
        })?;
        Ok(())
    }

    // ── Termination ──────────────────────────────────────────────────

    async fn finalize_completed(&mut self, final_response: &str) -> Result<()> {
        self.store.append_event(EventPayload::RunEnd {
            status: RunStatus::Completed,
            final_response: Some(final_response.to_string()),
        })?;
        self.store.update_metadata(|m| {
            m.status = RunStatus::Completed;
            m.end_time = Some(chrono::Utc::now());
        })?;
        self.hooks
            .run(
                "on_run_end",
                serde_json::json!({
                    "status": "COMPLETED",
                    "final_response": final_response,
                }),
                None,
            )
            .await;
        self.store.flush()?;
        self.store.log_line("run completed");
        Ok(())
    }

    /// Unhandled error: journal it, give `on_error` a look, close the
    /// run as FAILED. Never raises — the original error propagates.
    async fn handle_fatal(&mut self, error: &Error) {
        self.store.log_line(&format!("fatal: {error}"));
        let _ = self.store.append_event(EventPayload::SystemMessage {
            level: SystemLevel::Error,
            content: error.to_string(),
        });
        self.hooks
            .run(
                "on_error",
                serde_json::json!({ "error": error.to_string() }),
                None,
            )
            .await;
        let _ = self.store.append_event(EventPayload::RunEnd {
            status: RunStatus::Failed,
            final_response: None,
        });
        let _ = self.store.update_metadata(|m| {
            m.status = RunStatus::Failed;
            m.end_time = Some(chrono::Utc::now());
        });
        self.hooks
            .run(
                "on_run_end",
                serde_json::json!({ "status": "FAILED" }),
                None,
            )
            .await;
        let _ = self.store.flush();
    }
}

fn new_artifact_id(prefix: &str) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &hex[..12])
}
