//! Observation formatting — what the model sees of a tool execution.

use crate::executor::ExecutionResult;

/// Per-stream cap. The artifact store keeps the full output; the model
/// only ever sees the trimmed head.
pub const STREAM_CAP_CHARS: usize = 5000;

const TRUNCATION_MARKER: &str = "\n... [truncated]";
const EMPTY_OUTPUT: &str = "(Command executed with no output)";

/// Truncate to `cap` characters, appending an explicit marker when
/// anything was dropped. Character-based so multi-byte output cannot be
/// split mid-codepoint.
fn truncate_stream(s: &str, cap: usize) -> String {
    match s.char_indices().nth(cap) {
        None => s.to_string(),
        Some((byte_idx, _)) => {
            let mut out = s[..byte_idx].to_string();
            out.push_str(TRUNCATION_MARKER);
            out
        }
    }
}

/// Render the observation string fed back to the LLM.
pub fn format_observation(result: &ExecutionResult) -> String {
    if result.stdout.is_empty() && result.stderr.is_empty() {
        return EMPTY_OUTPUT.to_string();
    }
    format!(
        "=== STDOUT ===\n{}\n=== STDERR ===\n{}\n=== EXIT CODE: {} ===",
        truncate_stream(&result.stdout, STREAM_CAP_CHARS),
        truncate_stream(&result.stderr, STREAM_CAP_CHARS),
        result.exit_code
    )
}
