//! `${AGENT_HOME}` / `${CWD}` expansion for manifest paths and generator
//! commands.

use std::path::Path;

pub fn expand(input: &str, agent_home: &Path, cwd: &Path) -> String {
    input
        .replace("${AGENT_HOME}", &agent_home.to_string_lossy())
        .replace("${CWD}", &cwd.to_string_lossy())
}
