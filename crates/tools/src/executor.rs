//! Child-process construction and execution.
//!
//! Invocation contract:
//! 1. Start from the tool's argv template; `${name}` slots embedded in
//!    template tokens are substituted in place.
//! 2. Remaining parameters, in declaration order: `argument` appends the
//!    value; `option` appends `option_name` then the value as two argv
//!    elements (never joined with `=`); `stdin` is written to the child's
//!    stdin, which is then closed.
//! 3. The child is spawned directly (no shell), cwd = workspace data
//!    plane, environment inherited.

use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use delta_domain::tool::{Injection, ToolDefinition};
use delta_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Invocation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A fully resolved invocation, ready to spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub stdin: Option<String>,
}

impl Invocation {
    /// Human-readable command line for journaling and display.
    pub fn display(&self) -> String {
        self.argv
            .iter()
            .map(|arg| {
                if arg.is_empty() || arg.chars().any(char::is_whitespace) {
                    format!("{arg:?}")
                } else {
                    arg.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Coerce an LLM-supplied argument to a string. The model sends strings
/// for string-typed schemas, but other scalars are tolerated.
fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Single-quote a value for embedding in a `/bin/sh -c` template.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn is_shell_wrapper(command: &[String]) -> bool {
    matches!(
        command,
        [first, flag, ..]
            if (first.as_str() == "/bin/sh" || first.as_str() == "sh") && flag.as_str() == "-c"
    )
}

/// Substitute `${name}` / `${name:raw}` slots inside one template token.
/// Inside a shell wrapper the plain form is quoted; elsewhere (direct
/// exec) substitution is verbatim since there is no shell to re-parse it.
fn substitute_token(
    token: &str,
    args: &serde_json::Map<String, serde_json::Value>,
    shell_mode: bool,
    consumed: &mut HashSet<String>,
) -> String {
    let re = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:raw)?\}").expect("slot regex");
    re.replace_all(token, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        let raw = caps.get(2).is_some();
        let value = args.get(name).map(value_to_string).unwrap_or_default();
        consumed.insert(name.to_string());
        if shell_mode && !raw {
            shell_quote(&value)
        } else {
            value
        }
    })
    .into_owned()
}

/// Build the argv and stdin payload for one tool call.
pub fn build_invocation(
    tool: &ToolDefinition,
    arguments: &serde_json::Value,
) -> Result<Invocation> {
    let empty = serde_json::Map::new();
    let args = arguments.as_object().unwrap_or(&empty);

    let shell_mode = is_shell_wrapper(&tool.command);
    let mut consumed = HashSet::new();
    let mut argv: Vec<String> = tool
        .command
        .iter()
        .map(|token| substitute_token(token, args, shell_mode, &mut consumed))
        .collect();

    let mut stdin = None;
    for param in &tool.parameters {
        if consumed.contains(&param.name) {
            continue;
        }
        let value = args.get(&param.name).map(value_to_string);
        match &param.inject {
            Injection::Argument => argv.push(value.unwrap_or_default()),
            Injection::Option { option_name } => {
                if let Some(value) = value {
                    argv.push(option_name.clone());
                    argv.push(value);
                }
            }
            Injection::Stdin => stdin = Some(value.unwrap_or_default()),
        }
    }

    if argv.is_empty() {
        return Err(Error::Config(format!(
            "tool '{}' resolves to an empty command",
            tool.name
        )));
    }
    Ok(Invocation { argv, stdin })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Execution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub success: bool,
}

/// Spawn the invocation and wait for it, capturing both streams.
///
/// `workdir` is the workspace data-plane root. The environment is
/// inherited from the engine.
pub async fn execute(invocation: &Invocation, workdir: &Path) -> Result<ExecutionResult> {
    let started = Instant::now();

    let mut cmd = Command::new(&invocation.argv[0]);
    cmd.args(&invocation.argv[1..])
        .current_dir(workdir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::Other(format!("failed to spawn '{}': {e}", invocation.argv[0])))?;

    // One write, then close — the child sees EOF either way.
    let mut child_stdin = child.stdin.take();
    if let Some(payload) = &invocation.stdin {
        if let Some(stdin) = child_stdin.as_mut() {
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|e| Error::Other(format!("writing tool stdin: {e}")))?;
        }
    }
    drop(child_stdin);

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| Error::Other(format!("waiting for tool: {e}")))?;

    let exit_code = output.status.code().unwrap_or(-1);
    let duration_ms = started.elapsed().as_millis() as u64;
    tracing::debug!(
        command = %invocation.display(),
        exit_code,
        duration_ms,
        "tool execution finished"
    );

    Ok(ExecutionResult {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code,
        duration_ms,
        success: exit_code == 0,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use delta_domain::tool::ToolParameter;

    fn tool(command: &[&str], parameters: Vec<ToolParameter>) -> ToolDefinition {
        ToolDefinition {
            name: "t".into(),
            command: command.iter().map(|s| s.to_string()).collect(),
            parameters,
            description: None,
        }
    }

    fn param(name: &str, inject: Injection) -> ToolParameter {
        ToolParameter {
            name: name.into(),
            param_type: "string".into(),
            inject,
            description: None,
        }
    }

    #[test]
    fn argument_injection_appends_positionally() {
        let t = tool(
            &["echo"],
            vec![param("a", Injection::Argument), param("b", Injection::Argument)],
        );
        let inv = build_invocation(&t, &serde_json::json!({"a": "one", "b": "two"})).unwrap();
        assert_eq!(inv.argv, vec!["echo", "one", "two"]);
        assert!(inv.stdin.is_none());
    }

    #[test]
    fn option_injection_uses_two_elements() {
        let t = tool(
            &["grep"],
            vec![param(
                "pattern",
                Injection::Option {
                    option_name: "-e".into(),
                },
            )],
        );
        let inv = build_invocation(&t, &serde_json::json!({"pattern": "foo bar"})).unwrap();
        assert_eq!(inv.argv, vec!["grep", "-e", "foo bar"]);
    }

    #[test]
    fn missing_option_argument_is_omitted() {
        let t = tool(
            &["ls"],
            vec![param(
                "depth",
                Injection::Option {
                    option_name: "-d".into(),
                },
            )],
        );
        let inv = build_invocation(&t, &serde_json::json!({})).unwrap();
        assert_eq!(inv.argv, vec!["ls"]);
    }

    #[test]
    fn stdin_injection_captured() {
        let t = tool(&["cat"], vec![param("content", Injection::Stdin)]);
        let inv = build_invocation(&t, &serde_json::json!({"content": "hello"})).unwrap();
        assert_eq!(inv.argv, vec!["cat"]);
        assert_eq!(inv.stdin.as_deref(), Some("hello"));
    }

    #[test]
    fn inline_slots_substituted_in_place() {
        let t = tool(
            &["grep", "-n", "${pattern}", "${file}"],
            vec![param("pattern", Injection::Argument), param("file", Injection::Argument)],
        );
        let inv =
            build_invocation(&t, &serde_json::json!({"pattern": "x y", "file": "a.txt"})).unwrap();
        // Direct exec: verbatim substitution, no quoting artifacts.
        assert_eq!(inv.argv, vec!["grep", "-n", "x y", "a.txt"]);
    }

    #[test]
    fn shell_template_quotes_plain_slots() {
        let t = tool(
            &["/bin/sh", "-c", "head -n ${n:raw} ${file}"],
            vec![param("n", Injection::Argument), param("file", Injection::Argument)],
        );
        let inv = build_invocation(
            &t,
            &serde_json::json!({"n": "3", "file": "my file.txt"}),
        )
        .unwrap();
        assert_eq!(inv.argv[2], "head -n 3 'my file.txt'");
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        let t = tool(
            &["/bin/sh", "-c", "echo ${msg}"],
            vec![param("msg", Injection::Argument)],
        );
        let inv = build_invocation(&t, &serde_json::json!({"msg": "it's"})).unwrap();
        assert_eq!(inv.argv[2], r"echo 'it'\''s'");
    }

    #[test]
    fn non_string_argument_coerced() {
        let t = tool(&["echo"], vec![param("n", Injection::Argument)]);
        let inv = build_invocation(&t, &serde_json::json!({"n": 42})).unwrap();
        assert_eq!(inv.argv, vec!["echo", "42"]);
    }

    #[test]
    fn display_quotes_whitespace() {
        let inv = Invocation {
            argv: vec!["echo".into(), "two words".into()],
            stdin: None,
        };
        assert_eq!(inv.display(), "echo \"two words\"");
    }

    #[tokio::test]
    async fn execute_captures_streams_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let inv = Invocation {
            argv: vec![
                "/bin/sh".into(),
                "-c".into(),
                "echo out; echo err >&2; exit 3".into(),
            ],
            stdin: None,
        };
        let result = execute(&inv, dir.path()).await.unwrap();
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert_eq!(result.exit_code, 3);
        assert!(!result.success);
    }

    #[tokio::test]
    async fn execute_writes_stdin_once_then_closes() {
        let dir = tempfile::tempdir().unwrap();
        let inv = Invocation {
            argv: vec!["cat".into()],
            stdin: Some("piped in".into()),
        };
        let result = execute(&inv, dir.path()).await.unwrap();
        assert_eq!(result.stdout, "piped in");
        assert!(result.success);
    }

    #[tokio::test]
    async fn execute_runs_in_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let inv = Invocation {
            argv: vec!["ls".into()],
            stdin: None,
        };
        let result = execute(&inv, dir.path()).await.unwrap();
        assert!(result.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn execute_spawn_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let inv = Invocation {
            argv: vec!["definitely-not-a-real-binary-xyz".into()],
            stdin: None,
        };
        assert!(execute(&inv, dir.path()).await.is_err());
    }
}
