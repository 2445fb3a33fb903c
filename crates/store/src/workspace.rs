//! Workspace discovery and creation.
//!
//! Workspaces live under `<agent_home>/workspaces/` and are named `W001`,
//! `W002`, … The `LAST_USED` file records the most recently
//! *interactively selected* workspace; explicit `--work-dir` overrides do
//! not update it. There is deliberately no "latest run" pointer — run
//! discovery is a directory scan, which keeps concurrent runs free of any
//! shared mutable object.

use std::fs;
use std::path::{Path, PathBuf};

use delta_domain::run::RunMetadata;
use delta_domain::{Error, Result};

use crate::paths;
use crate::run_store;

pub const WORKSPACES_DIR: &str = "workspaces";
pub const LAST_USED_FILE: &str = "LAST_USED";

pub struct WorkspaceManager {
    agent_home: PathBuf,
}

impl WorkspaceManager {
    pub fn new(agent_home: impl Into<PathBuf>) -> Self {
        Self {
            agent_home: agent_home.into(),
        }
    }

    pub fn workspaces_root(&self) -> PathBuf {
        self.agent_home.join(WORKSPACES_DIR)
    }

    /// All existing workspace directories, sorted by name.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let root = self.workspaces_root();
        if !root.exists() {
            return Ok(Vec::new());
        }
        let mut dirs: Vec<PathBuf> = fs::read_dir(&root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    /// Create the next free `W###` workspace and return its path.
    pub fn create_next(&self) -> Result<PathBuf> {
        let root = self.workspaces_root();
        fs::create_dir_all(&root)?;

        let mut next = 1u32;
        for existing in self.list()? {
            if let Some(n) = existing
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_workspace_number)
            {
                next = next.max(n + 1);
            }
        }

        let path = root.join(format!("W{next:03}"));
        fs::create_dir(&path)?;
        Ok(path)
    }

    /// The workspace recorded by the last interactive selection, if it
    /// still exists.
    pub fn last_used(&self) -> Option<PathBuf> {
        let raw = fs::read_to_string(self.workspaces_root().join(LAST_USED_FILE)).ok()?;
        let name = raw.trim();
        if name.is_empty() {
            return None;
        }
        let path = self.workspaces_root().join(name);
        path.is_dir().then_some(path)
    }

    /// Record an interactive workspace selection.
    pub fn set_last_used(&self, workspace: &Path) -> Result<()> {
        let name = workspace
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Other(format!("bad workspace path: {}", workspace.display())))?;
        fs::create_dir_all(self.workspaces_root())?;
        fs::write(
            self.workspaces_root().join(LAST_USED_FILE),
            format!("{name}\n"),
        )?;
        Ok(())
    }
}

fn parse_workspace_number(name: &str) -> Option<u32> {
    name.strip_prefix('W')?.parse().ok()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run discovery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Metadata of every run in a workspace, sorted by run ID (monotonic for
/// default timestamp-prefixed IDs).
pub fn list_runs(workspace: &Path) -> Result<Vec<RunMetadata>> {
    let control = paths::control_plane(workspace);
    if !control.exists() {
        return Ok(Vec::new());
    }

    let mut run_dirs: Vec<PathBuf> = fs::read_dir(&control)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && paths::metadata_file(p).exists())
        .collect();
    run_dirs.sort();

    let mut runs = Vec::with_capacity(run_dirs.len());
    for dir in run_dirs {
        match run_store::read_metadata(&dir) {
            Ok(meta) => runs.push(meta),
            Err(e) => {
                tracing::warn!(
                    run_dir = %dir.display(),
                    error = %e,
                    "skipping run with unreadable metadata"
                );
            }
        }
    }
    Ok(runs)
}

/// Whether a run directory exists in this workspace.
pub fn run_exists(workspace: &Path, run_id: &str) -> bool {
    paths::run_dir(workspace, run_id).is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_store::RunStore;

    #[test]
    fn create_next_allocates_sequential_names() {
        let home = tempfile::tempdir().unwrap();
        let mgr = WorkspaceManager::new(home.path());

        let w1 = mgr.create_next().unwrap();
        let w2 = mgr.create_next().unwrap();
        assert!(w1.ends_with("W001"));
        assert!(w2.ends_with("W002"));
    }

    #[test]
    fn create_next_skips_past_gaps() {
        let home = tempfile::tempdir().unwrap();
        let mgr = WorkspaceManager::new(home.path());
        fs::create_dir_all(home.path().join("workspaces/W007")).unwrap();

        let w = mgr.create_next().unwrap();
        assert!(w.ends_with("W008"));
    }

    #[test]
    fn last_used_round_trip() {
        let home = tempfile::tempdir().unwrap();
        let mgr = WorkspaceManager::new(home.path());
        assert!(mgr.last_used().is_none());

        let w1 = mgr.create_next().unwrap();
        mgr.set_last_used(&w1).unwrap();
        assert_eq!(mgr.last_used().unwrap(), w1);
    }

    #[test]
    fn last_used_ignores_deleted_workspace() {
        let home = tempfile::tempdir().unwrap();
        let mgr = WorkspaceManager::new(home.path());
        let w1 = mgr.create_next().unwrap();
        mgr.set_last_used(&w1).unwrap();
        fs::remove_dir_all(&w1).unwrap();
        assert!(mgr.last_used().is_none());
    }

    #[test]
    fn list_runs_sorted_by_id() {
        let ws = tempfile::tempdir().unwrap();
        RunStore::create(ws.path(), "20250101_000002_bbbbbb", "/a", "t", "h").unwrap();
        RunStore::create(ws.path(), "20250101_000001_aaaaaa", "/a", "t", "h").unwrap();

        let runs = list_runs(ws.path()).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, "20250101_000001_aaaaaa");
        assert_eq!(runs[1].run_id, "20250101_000002_bbbbbb");
    }

    #[test]
    fn list_runs_empty_workspace() {
        let ws = tempfile::tempdir().unwrap();
        assert!(list_runs(ws.path()).unwrap().is_empty());
        assert!(!run_exists(ws.path(), "nope"));
    }
}
