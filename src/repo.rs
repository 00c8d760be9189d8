//! Locating the project root: the directory that holds `dev.yml`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::DevError;

pub const CONFIG_FILE: &str = "dev.yml";

/// Finds the project root for `start`.
///
/// The git top-level directory wins when it has a `dev.yml`; otherwise the
/// nearest ancestor of `start` (itself included) that has one.
pub fn find_root(start: &Path) -> Result<PathBuf, DevError> {
    if let Some(toplevel) = git_toplevel(start) {
        if toplevel.join(CONFIG_FILE).is_file() {
            tracing::debug!(root = %toplevel.display(), "project root from git");
            return Ok(toplevel);
        }
    }
    start
        .ancestors()
        .find(|dir| dir.join(CONFIG_FILE).is_file())
        .map(|dir| {
            tracing::debug!(root = %dir.display(), "project root from ancestors");
            dir.to_path_buf()
        })
        .ok_or_else(|| DevError::NoProjectRoot {
            start: start.to_path_buf(),
        })
}

fn git_toplevel(start: &Path) -> Option<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(start)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let toplevel = String::from_utf8(output.stdout).ok()?;
    let toplevel = toplevel.trim_end_matches(['\r', '\n']);
    if toplevel.is_empty() {
        None
    } else {
        Some(PathBuf::from(toplevel))
    }
}
