//! Agent loading: YAML parse, `imports:` resolution with cycle
//! detection, sugar expansion, validation.
//!
//! An agent lives in a directory containing `agent.yaml` and (unless the
//! YAML carries an inline `system_prompt`) a `system_prompt.md`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use delta_domain::agent::{AgentConfig, AgentDefinition, ToolImport};
use delta_domain::sugar::ToolConfig;
use delta_domain::{Error, Result};

pub const AGENT_FILE: &str = "agent.yaml";
pub const SYSTEM_PROMPT_FILE: &str = "system_prompt.md";

/// Load and validate the agent rooted at `agent_dir`.
pub fn load_agent(agent_dir: &Path) -> Result<AgentDefinition> {
    let agent_file = agent_dir.join(AGENT_FILE);
    let raw = std::fs::read_to_string(&agent_file).map_err(|e| {
        Error::Config(format!("reading {}: {e}", agent_file.display()))
    })?;
    let config: AgentConfig = serde_yaml::from_str(&raw)
        .map_err(|e| Error::Config(format!("parsing {}: {e}", agent_file.display())))?;

    let system_prompt = match &config.system_prompt {
        Some(inline) => inline.clone(),
        None => {
            let prompt_file = agent_dir.join(SYSTEM_PROMPT_FILE);
            std::fs::read_to_string(&prompt_file).map_err(|e| {
                Error::Config(format!(
                    "agent has no inline system_prompt and {} is unreadable: {e}",
                    prompt_file.display()
                ))
            })?
        }
    };

    let mut visited = HashSet::new();
    let mut imported = Vec::new();
    for import in &config.imports {
        collect_imports(agent_dir, import, &mut visited, &mut imported)?;
    }

    AgentDefinition::from_config(config, system_prompt, imported)
}

/// Depth-first import resolution. Paths resolve relative to the importing
/// file's directory; a revisited canonical path is a cycle.
fn collect_imports(
    base_dir: &Path,
    import: &Path,
    visited: &mut HashSet<PathBuf>,
    out: &mut Vec<ToolConfig>,
) -> Result<()> {
    let path = if import.is_absolute() {
        import.to_path_buf()
    } else {
        base_dir.join(import)
    };
    let canonical = path
        .canonicalize()
        .map_err(|e| Error::Config(format!("resolving import {}: {e}", path.display())))?;

    if !visited.insert(canonical.clone()) {
        return Err(Error::Config(format!(
            "import cycle involving {}",
            canonical.display()
        )));
    }

    let raw = std::fs::read_to_string(&canonical)
        .map_err(|e| Error::Config(format!("reading import {}: {e}", canonical.display())))?;
    let file: ToolImport = serde_yaml::from_str(&raw)
        .map_err(|e| Error::Config(format!("parsing import {}: {e}", canonical.display())))?;

    out.extend(file.tools);

    let nested_base = canonical
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| base_dir.to_path_buf());
    for nested in &file.imports {
        collect_imports(&nested_base, nested, visited, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_agent(dir: &Path, yaml: &str) {
        std::fs::write(dir.join(AGENT_FILE), yaml).unwrap();
    }

    #[test]
    fn loads_minimal_agent_with_prompt_file() {
        let dir = tempfile::tempdir().unwrap();
        write_agent(
            dir.path(),
            "name: echo\nllm:\n  model: gpt-4o\n",
        );
        std::fs::write(dir.path().join(SYSTEM_PROMPT_FILE), "You echo things.").unwrap();

        let agent = load_agent(dir.path()).unwrap();
        assert_eq!(agent.name, "echo");
        assert_eq!(agent.system_prompt, "You echo things.");
        assert_eq!(agent.max_iterations, 30);
        assert!(agent.tools.is_empty());
    }

    #[test]
    fn inline_system_prompt_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_agent(
            dir.path(),
            "name: echo\nsystem_prompt: inline prompt\nllm:\n  model: gpt-4o\n",
        );
        let agent = load_agent(dir.path()).unwrap();
        assert_eq!(agent.system_prompt, "inline prompt");
    }

    #[test]
    fn missing_prompt_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        write_agent(dir.path(), "name: echo\nllm:\n  model: gpt-4o\n");
        assert!(matches!(load_agent(dir.path()), Err(Error::Config(_))));
    }

    #[test]
    fn imports_merge_tools() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("extra.yaml"),
            "tools:\n  - name: lister\n    exec: \"ls -la\"\n",
        )
        .unwrap();
        write_agent(
            dir.path(),
            "name: echo\nsystem_prompt: p\nllm:\n  model: gpt-4o\nimports:\n  - extra.yaml\n",
        );

        let agent = load_agent(dir.path()).unwrap();
        assert_eq!(agent.tools.len(), 1);
        assert_eq!(agent.tools[0].name, "lister");
    }

    #[test]
    fn import_cycle_detected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.yaml"),
            "tools: []\nimports:\n  - b.yaml\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.yaml"),
            "tools: []\nimports:\n  - a.yaml\n",
        )
        .unwrap();
        write_agent(
            dir.path(),
            "name: echo\nsystem_prompt: p\nllm:\n  model: gpt-4o\nimports:\n  - a.yaml\n",
        );

        let err = load_agent(dir.path()).unwrap_err();
        assert!(err.to_string().contains("cycle"), "got: {err}");
    }

    #[test]
    fn duplicate_across_import_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("extra.yaml"),
            "tools:\n  - name: t\n    exec: \"echo b\"\n",
        )
        .unwrap();
        write_agent(
            dir.path(),
            "name: echo\nsystem_prompt: p\nllm:\n  model: gpt-4o\ntools:\n  - name: t\n    exec: \"echo a\"\nimports:\n  - extra.yaml\n",
        );
        assert!(load_agent(dir.path()).is_err());
    }

    #[test]
    fn missing_agent_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_agent(dir.path()), Err(Error::Config(_))));
    }
}
