//! Tool definitions in their post-expansion form, and the parsed tool-call
//! request the engine dispatches.
//!
//! The `exec:` / `shell:` configuration sugars in [`crate::sugar`] expand to
//! this representation before validation; the executor only ever sees it.

use serde::{Deserialize, Serialize};

/// How a parameter value is delivered to the child process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "inject_as")]
pub enum Injection {
    /// Appended as the next positional argv element.
    Argument,
    /// Written to the child's stdin, which is closed afterwards.
    Stdin,
    /// Appended as `<option_name>` then the value (two argv elements).
    Option { option_name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    /// Semantic type hint surfaced in the generated schema description.
    #[serde(default = "d_string", rename = "type")]
    pub param_type: String,
    #[serde(flatten)]
    pub inject: Injection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn d_string() -> String {
    "string".into()
}

/// An executable tool: an argv template plus parameter injection slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    /// Argv template. `command[0]` is the executable; parameters are
    /// injected per their declared mode, in declaration order.
    pub command: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ToolDefinition {
    /// Validate the invariants the executor relies on.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::Config("tool name must not be empty".into()));
        }
        if self.command.is_empty() {
            return Err(crate::Error::Config(format!(
                "tool '{}': command must not be empty",
                self.name
            )));
        }
        let stdin_count = self
            .parameters
            .iter()
            .filter(|p| matches!(p.inject, Injection::Stdin))
            .count();
        if stdin_count > 1 {
            return Err(crate::Error::Config(format!(
                "tool '{}': at most one parameter may use stdin injection (found {stdin_count})",
                self.name
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for p in &self.parameters {
            if !seen.insert(p.name.as_str()) {
                return Err(crate::Error::Config(format!(
                    "tool '{}': duplicate parameter '{}'",
                    self.name, p.name
                )));
            }
            if let Injection::Option { option_name } = &p.inject {
                if option_name.trim().is_empty() {
                    return Err(crate::Error::Config(format!(
                        "tool '{}': parameter '{}' uses option injection without option_name",
                        self.name, p.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A tool invocation parsed out of an LLM response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, inject: Injection) -> ToolParameter {
        ToolParameter {
            name: name.into(),
            param_type: "string".into(),
            inject,
            description: None,
        }
    }

    #[test]
    fn validate_accepts_single_stdin() {
        let tool = ToolDefinition {
            name: "write".into(),
            command: vec!["tee".into(), "out.txt".into()],
            parameters: vec![param("content", Injection::Stdin)],
            description: None,
        };
        assert!(tool.validate().is_ok());
    }

    #[test]
    fn validate_rejects_two_stdin_params() {
        let tool = ToolDefinition {
            name: "bad".into(),
            command: vec!["cat".into()],
            parameters: vec![
                param("a", Injection::Stdin),
                param("b", Injection::Stdin),
            ],
            description: None,
        };
        assert!(tool.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_params() {
        let tool = ToolDefinition {
            name: "bad".into(),
            command: vec!["echo".into()],
            parameters: vec![
                param("x", Injection::Argument),
                param("x", Injection::Argument),
            ],
            description: None,
        };
        assert!(tool.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_option_name() {
        let tool = ToolDefinition {
            name: "bad".into(),
            command: vec!["grep".into()],
            parameters: vec![param(
                "pattern",
                Injection::Option {
                    option_name: "".into(),
                },
            )],
            description: None,
        };
        assert!(tool.validate().is_err());
    }

    #[test]
    fn injection_mode_deserializes_from_yaml_shape() {
        let json = serde_json::json!({
            "name": "pattern",
            "type": "string",
            "inject_as": "option",
            "option_name": "-e"
        });
        let p: ToolParameter = serde_json::from_value(json).unwrap();
        assert_eq!(
            p.inject,
            Injection::Option {
                option_name: "-e".into()
            }
        );
    }
}
