//! Ask-human handling and pending-action recovery.
//!
//! Async contract: the engine writes `interaction/request.json`, pauses,
//! and the process exits 101; a human writes `response.txt`; the next
//! `continue` finds the unresolved request and ingests the reply.
//! Interactive contract (`-i`): the engine prompts on the terminal and
//! skips the file handshake.

use std::collections::HashSet;
use std::io::Write;

use delta_domain::interaction::{InputType, InteractionRequest, ASK_HUMAN_TOOL};
use delta_domain::journal::{EventPayload, JournalEvent};
use delta_domain::{Error, Result};

/// A tool call the model asked for that has no `ACTION_RESULT` yet.
///
/// Derived from `THOUGHT` events, not `ACTION_REQUEST`s: a crash can land
/// between the two, and the result is the only execution guard — no
/// action ID is ever executed twice.
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub action_id: String,
    pub tool_name: String,
    pub tool_args: serde_json::Value,
    /// Whether an `ACTION_REQUEST` for this ID is already journaled.
    pub requested: bool,
}

fn parse_call_arguments(call: &serde_json::Value) -> serde_json::Value {
    match call.pointer("/function/arguments") {
        Some(serde_json::Value::String(raw)) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed == "undefined" || trimmed == "null" {
                serde_json::Value::Object(Default::default())
            } else {
                serde_json::from_str(trimmed)
                    .unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
            }
        }
        Some(v @ serde_json::Value::Object(_)) => v.clone(),
        _ => serde_json::Value::Object(Default::default()),
    }
}

/// Tool calls from `THOUGHT` events lacking a matching `ACTION_RESULT`,
/// in emission order.
pub fn pending_actions(events: &[JournalEvent]) -> Vec<PendingAction> {
    let resolved: HashSet<&str> = events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::ActionResult { action_id, .. } => Some(action_id.as_str()),
            _ => None,
        })
        .collect();
    let requested: HashSet<&str> = events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::ActionRequest { action_id, .. } => Some(action_id.as_str()),
            _ => None,
        })
        .collect();

    let mut pending = Vec::new();
    for event in events {
        let EventPayload::Thought {
            tool_calls: Some(calls),
            ..
        } = &event.payload
        else {
            continue;
        };
        let Some(calls) = calls.as_array() else {
            continue;
        };
        for call in calls {
            let Some(id) = call.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            if resolved.contains(id) {
                continue;
            }
            let name = call
                .pointer("/function/name")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            pending.push(PendingAction {
                action_id: id.to_string(),
                tool_name: name.to_string(),
                tool_args: parse_call_arguments(call),
                requested: requested.contains(id),
            });
        }
    }
    pending
}

/// The unresolved `ask_human` call, if any.
pub fn pending_ask_human(events: &[JournalEvent]) -> Option<PendingAction> {
    pending_actions(events)
        .into_iter()
        .find(|p| p.tool_name == ASK_HUMAN_TOOL)
}

/// Prompt the human on the local terminal (interactive mode).
pub fn prompt_locally(request: &InteractionRequest) -> Result<String> {
    match request.input_type {
        InputType::Password => rpassword::prompt_password(format!("{}: ", request.prompt))
            .map_err(|e| Error::Other(format!("reading password: {e}"))),
        InputType::Confirmation => {
            let mut editor = rustyline::DefaultEditor::new()
                .map_err(|e| Error::Other(format!("initializing prompt: {e}")))?;
            loop {
                let line = editor
                    .readline(&format!("{} [y/n]: ", request.prompt))
                    .map_err(|e| Error::Other(format!("reading confirmation: {e}")))?;
                match line.trim().to_ascii_lowercase().as_str() {
                    "y" | "yes" => return Ok("yes".into()),
                    "n" | "no" => return Ok("no".into()),
                    _ => eprintln!("please answer y or n"),
                }
            }
        }
        InputType::Text => {
            let mut editor = rustyline::DefaultEditor::new()
                .map_err(|e| Error::Other(format!("initializing prompt: {e}")))?;
            editor
                .readline(&format!("{}: ", request.prompt))
                .map_err(|e| Error::Other(format!("reading input: {e}")))
        }
    }
}

/// Print the pause banner to stderr (stdout is reserved for the
/// structured result).
pub fn print_pause_banner(request: &InteractionRequest, interaction_dir: &std::path::Path) {
    let mut err = std::io::stderr();
    let _ = writeln!(err, "\n[waiting for human input]");
    let _ = writeln!(err, "  prompt: {}", request.prompt);
    let _ = writeln!(
        err,
        "  reply:  write your answer to {}",
        interaction_dir.join("response.txt").display()
    );
    let _ = writeln!(err, "  then:   delta continue --run-id <run-id>");
}
