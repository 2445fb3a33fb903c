//! Context manifest — the declarative list of context sources resolved
//! once per iteration into the LLM request.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnMissing {
    Error,
    Skip,
}

impl Default for OnMissing {
    fn default() -> Self {
        Self::Error
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ContextSource {
    /// A static file, read each iteration. `${AGENT_HOME}` and `${CWD}`
    /// expand in the path.
    File {
        path: String,
        #[serde(default)]
        on_missing: OnMissing,
    },
    /// A generator command producing `output_path`; the produced file is
    /// then treated like a `file` source.
    ComputedFile {
        generator_command: Vec<String>,
        output_path: String,
        #[serde(default = "d_generator_timeout")]
        timeout_ms: u64,
    },
    /// Conversation reconstructed from the journal.
    Journal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<usize>,
    },
}

fn d_generator_timeout() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextManifest {
    pub sources: Vec<ContextSource>,
}

impl Default for ContextManifest {
    fn default() -> Self {
        Self {
            sources: vec![ContextSource::Journal {
                max_iterations: None,
            }],
        }
    }
}

impl ContextManifest {
    /// The manifest always conceptually includes a journal source; append
    /// one if the configuration omitted it.
    pub fn normalized(mut self) -> Self {
        let has_journal = self
            .sources
            .iter()
            .any(|s| matches!(s, ContextSource::Journal { .. }));
        if !has_journal {
            self.sources.push(ContextSource::Journal {
                max_iterations: None,
            });
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_manifest_is_journal_only() {
        let m = ContextManifest::default();
        assert_eq!(m.sources.len(), 1);
        assert!(matches!(m.sources[0], ContextSource::Journal { .. }));
    }

    #[test]
    fn normalized_appends_missing_journal() {
        let m = ContextManifest {
            sources: vec![ContextSource::File {
                path: "${AGENT_HOME}/system.md".into(),
                on_missing: OnMissing::Skip,
            }],
        }
        .normalized();
        assert_eq!(m.sources.len(), 2);
        assert!(matches!(m.sources[1], ContextSource::Journal { .. }));
    }

    #[test]
    fn normalized_keeps_existing_journal() {
        let m = ContextManifest::default().normalized();
        assert_eq!(m.sources.len(), 1);
    }

    #[test]
    fn sources_deserialize_from_config() {
        let yaml_as_json = serde_json::json!({
            "sources": [
                {"type": "file", "path": "${CWD}/NOTES.md", "on_missing": "skip"},
                {"type": "computed_file",
                 "generator_command": ["python3", "gen.py"],
                 "output_path": "${CWD}/summary.md"},
                {"type": "journal", "max_iterations": 5}
            ]
        });
        let m: ContextManifest = serde_json::from_value(yaml_as_json).unwrap();
        assert_eq!(m.sources.len(), 3);
        match &m.sources[1] {
            ContextSource::ComputedFile { timeout_ms, .. } => {
                assert_eq!(*timeout_ms, 30_000);
            }
            other => panic!("unexpected source: {other:?}"),
        }
        match &m.sources[2] {
            ContextSource::Journal { max_iterations } => {
                assert_eq!(*max_iterations, Some(5));
            }
            other => panic!("unexpected source: {other:?}"),
        }
    }
}
