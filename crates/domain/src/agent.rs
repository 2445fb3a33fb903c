//! Agent definition — the immutable per-run configuration.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::manifest::ContextManifest;
use crate::sugar::ToolConfig;
use crate::tool::ToolDefinition;
use crate::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmParams {
    pub model: String,
    #[serde(default = "d_temperature")]
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
}

fn d_temperature() -> f64 {
    0.7
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lifecycle hooks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One hook: a command invoked at a lifecycle point over file-based I/O.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookDefinition {
    pub command: Vec<String>,
    /// Wall-clock bound for the hook process.
    #[serde(default = "d_hook_timeout")]
    pub timeout_ms: u64,
}

fn d_hook_timeout() -> u64 {
    60_000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleHooks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_llm_req: Option<HookDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_llm_resp: Option<HookDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_tool_exec: Option<HookDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_tool_exec: Option<HookDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<HookDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_run_end: Option<HookDefinition>,
}

impl LifecycleHooks {
    pub fn is_empty(&self) -> bool {
        self.pre_llm_req.is_none()
            && self.post_llm_resp.is_none()
            && self.pre_tool_exec.is_none()
            && self.post_tool_exec.is_none()
            && self.on_error.is_none()
            && self.on_run_end.is_none()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Raw (file) form
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The agent file as written on disk, before sugar expansion and import
/// resolution. The loader merges `imports:` and expands tools into the
/// validated [`AgentDefinition`].
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default = "d_version")]
    pub version: String,
    /// Inline system prompt. When absent the loader reads
    /// `system_prompt.md` from the agent directory.
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub llm: LlmParams,
    #[serde(default = "d_max_iterations")]
    pub max_iterations: u32,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub hooks: Option<LifecycleHooks>,
    #[serde(default)]
    pub context: Option<ContextManifest>,
    /// Additional tool-definition files, resolved relative to this file.
    #[serde(default)]
    pub imports: Vec<PathBuf>,
}

/// An imported tool-definition file: just more tools.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolImport {
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    /// Nested imports, resolved relative to the importing file.
    #[serde(default)]
    pub imports: Vec<PathBuf>,
}

fn d_version() -> String {
    "0.1.0".into()
}

fn d_max_iterations() -> u32 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Expanded form
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The immutable, validated agent definition a run executes against.
#[derive(Debug, Clone, Serialize)]
pub struct AgentDefinition {
    pub name: String,
    pub version: String,
    pub llm: LlmParams,
    pub max_iterations: u32,
    pub system_prompt: String,
    pub tools: Vec<ToolDefinition>,
    pub hooks: LifecycleHooks,
    pub context: ContextManifest,
}

impl AgentDefinition {
    /// Expand sugars, merge imported tools, and validate.
    ///
    /// `imported_tools` come from the loader after resolving `imports:`;
    /// they are appended after the agent's own tools and must not collide
    /// by name.
    pub fn from_config(
        config: AgentConfig,
        system_prompt: String,
        imported_tools: Vec<ToolConfig>,
    ) -> Result<Self> {
        if config.name.trim().is_empty() {
            return Err(Error::Config("agent name must not be empty".into()));
        }
        if config.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be at least 1".into()));
        }

        let mut tools = Vec::new();
        let mut by_name: HashMap<String, ()> = HashMap::new();
        for tc in config.tools.into_iter().chain(imported_tools) {
            let def = crate::sugar::expand_tool(tc)?;
            if def.name == crate::interaction::ASK_HUMAN_TOOL {
                return Err(Error::Config(format!(
                    "tool name '{}' is reserved for the built-in interaction tool",
                    def.name
                )));
            }
            if by_name.insert(def.name.clone(), ()).is_some() {
                return Err(Error::Config(format!(
                    "duplicate tool definition '{}'",
                    def.name
                )));
            }
            tools.push(def);
        }

        Ok(Self {
            name: config.name,
            version: config.version,
            llm: config.llm,
            max_iterations: config.max_iterations,
            system_prompt,
            tools,
            hooks: config.hooks.unwrap_or_default(),
            context: config
                .context
                .map(crate::manifest::ContextManifest::normalized)
                .unwrap_or_default(),
        })
    }

    pub fn find_tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> AgentConfig {
        serde_yaml::from_str(
            r#"
name: echo-agent
llm:
  model: gpt-4o
"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_apply() {
        let cfg = minimal_config();
        assert_eq!(cfg.max_iterations, 30);
        assert_eq!(cfg.version, "0.1.0");
        assert!((cfg.llm.temperature - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn from_config_expands_tools() {
        let cfg: AgentConfig = serde_yaml::from_str(
            r#"
name: searcher
llm:
  model: gpt-4o
tools:
  - name: grep
    exec: "grep -n ${pattern} ${file}"
"#,
        )
        .unwrap();
        let def = AgentDefinition::from_config(cfg, "sys".into(), vec![]).unwrap();
        assert_eq!(def.tools.len(), 1);
        assert_eq!(def.tools[0].command[0], "grep");
    }

    #[test]
    fn duplicate_tool_names_rejected() {
        let cfg: AgentConfig = serde_yaml::from_str(
            r#"
name: dup
llm:
  model: gpt-4o
tools:
  - name: t
    exec: "echo a"
  - name: t
    exec: "echo b"
"#,
        )
        .unwrap();
        assert!(AgentDefinition::from_config(cfg, "s".into(), vec![]).is_err());
    }

    #[test]
    fn ask_human_name_is_reserved() {
        let cfg: AgentConfig = serde_yaml::from_str(
            r#"
name: bad
llm:
  model: gpt-4o
tools:
  - name: ask_human
    exec: "echo hi"
"#,
        )
        .unwrap();
        assert!(AgentDefinition::from_config(cfg, "s".into(), vec![]).is_err());
    }

    #[test]
    fn custom_manifest_gains_journal_source() {
        let cfg: AgentConfig = serde_yaml::from_str(
            r#"
name: ctx
llm:
  model: gpt-4o
context:
  sources:
    - type: file
      path: "${AGENT_HOME}/knowledge.md"
      on_missing: skip
"#,
        )
        .unwrap();
        let def = AgentDefinition::from_config(cfg, "s".into(), vec![]).unwrap();
        assert_eq!(def.context.sources.len(), 2);
        assert!(matches!(
            def.context.sources[1],
            crate::manifest::ContextSource::Journal { .. }
        ));
    }

    #[test]
    fn zero_max_iterations_rejected() {
        let mut cfg = minimal_config();
        cfg.max_iterations = 0;
        assert!(AgentDefinition::from_config(cfg, "s".into(), vec![]).is_err());
    }
}
