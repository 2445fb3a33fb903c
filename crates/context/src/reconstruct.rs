//! Journal → conversation reconstruction.
//!
//! The stateless core: every iteration rebuilds its working conversation
//! from the journal. `THOUGHT` events carry the provider-native
//! `tool_calls` blob verbatim, so re-sending preserves the ID correlation
//! with the `tool` messages derived from `ACTION_RESULT` events.

use delta_domain::journal::{EventPayload, JournalEvent};
use delta_domain::message::{ChatMessage, Role};

/// Rebuild chat history from journal events.
///
/// - `USER_MESSAGE` → user
/// - `THOUGHT` → assistant (content + verbatim `tool_calls`)
/// - `ACTION_RESULT` → tool (`tool_call_id` = `action_id`)
/// - everything else is skipped
///
/// With `max_iterations = Some(n)`, only the last `n` assistant messages
/// and their paired tool messages are kept; user messages always survive
/// the window.
pub fn reconstruct_messages(
    events: &[JournalEvent],
    max_iterations: Option<usize>,
) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = Vec::new();

    for event in events {
        match &event.payload {
            EventPayload::UserMessage { content } => {
                messages.push(ChatMessage::user(content.clone()));
            }
            EventPayload::Thought {
                content,
                tool_calls,
                ..
            } => {
                messages.push(ChatMessage::assistant(content.clone(), tool_calls.clone()));
            }
            EventPayload::ActionResult {
                action_id,
                observation_content,
                ..
            } => {
                messages.push(ChatMessage::tool(
                    action_id.clone(),
                    observation_content.clone(),
                ));
            }
            _ => {}
        }
    }

    match max_iterations {
        Some(n) => window(messages, n),
        None => messages,
    }
}

fn window(messages: Vec<ChatMessage>, keep_assistants: usize) -> Vec<ChatMessage> {
    let assistant_total = messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .count();
    if assistant_total <= keep_assistants {
        return messages;
    }
    let drop_assistants = assistant_total - keep_assistants;

    let mut dropped = 0usize;
    let mut dropped_call_ids: Vec<String> = Vec::new();
    let mut out = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            Role::Assistant => {
                if dropped < drop_assistants {
                    dropped += 1;
                    if let Some(ids) = call_ids(&msg) {
                        dropped_call_ids.extend(ids);
                    }
                    continue;
                }
                out.push(msg);
            }
            Role::Tool => {
                let paired_to_dropped = msg
                    .tool_call_id
                    .as_ref()
                    .is_some_and(|id| dropped_call_ids.contains(id));
                if !paired_to_dropped {
                    out.push(msg);
                }
            }
            _ => out.push(msg),
        }
    }
    out
}

/// Extract call IDs from a provider-native `tool_calls` blob.
fn call_ids(msg: &ChatMessage) -> Option<Vec<String>> {
    let calls = msg.tool_calls.as_ref()?.as_array()?;
    Some(
        calls
            .iter()
            .filter_map(|c| c.get("id").and_then(|v| v.as_str()).map(String::from))
            .collect(),
    )
}
