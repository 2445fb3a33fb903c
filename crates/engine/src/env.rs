//! `.env` cascade: workspace overrides agent home overrides CWD.
//!
//! `dotenvy::from_path` never overwrites variables that are already set,
//! so loading in precedence order (workspace first) yields the cascade.
//! The loaded file list is returned for diagnostic display.

use std::path::{Path, PathBuf};

/// Load `.env` files in cascading precedence. Returns the files that
/// were actually loaded, highest precedence first.
pub fn load_env_cascade(workspace: &Path, agent_home: &Path, cwd: &Path) -> Vec<PathBuf> {
    let mut loaded = Vec::new();
    for dir in [workspace, agent_home, cwd] {
        let candidate = dir.join(".env");
        if !candidate.is_file() {
            continue;
        }
        if loaded.contains(&candidate) {
            continue;
        }
        match dotenvy::from_path(&candidate) {
            Ok(()) => {
                tracing::debug!(path = %candidate.display(), ".env loaded");
                loaded.push(candidate);
            }
            Err(e) => {
                tracing::warn!(path = %candidate.display(), error = %e, ".env load failed");
            }
        }
    }
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_env_wins() {
        let ws = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        std::fs::write(ws.path().join(".env"), "DELTA_TEST_CASCADE=workspace\n").unwrap();
        std::fs::write(home.path().join(".env"), "DELTA_TEST_CASCADE=home\n").unwrap();

        std::env::remove_var("DELTA_TEST_CASCADE");
        let loaded = load_env_cascade(ws.path(), home.path(), cwd.path());
        assert_eq!(loaded.len(), 2);
        assert_eq!(std::env::var("DELTA_TEST_CASCADE").unwrap(), "workspace");
        std::env::remove_var("DELTA_TEST_CASCADE");
    }

    #[test]
    fn missing_files_are_skipped() {
        let ws = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        let loaded = load_env_cascade(ws.path(), home.path(), cwd.path());
        assert!(loaded.is_empty());
    }

    #[test]
    fn same_directory_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "DELTA_TEST_ONCE=1\n").unwrap();
        let loaded = load_env_cascade(dir.path(), dir.path(), dir.path());
        assert_eq!(loaded.len(), 1);
        std::env::remove_var("DELTA_TEST_ONCE");
    }
}
