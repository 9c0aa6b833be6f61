// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Log path resolution shared by backends.
//!
//! Tasks may set `stdin`, `stdout`, and `stderr` paths directly; when they
//! do not, output lands under `logs/` in files derived from the task id.

use jet_core::Task;
use std::path::{Path, PathBuf};

/// Directory for default task logs, relative to the run's working directory.
pub const LOGS_DIR: &str = "logs";

/// Strip whitespace from a task id so it is usable as a file name.
pub fn sanitize_tid(tid: &str) -> String {
    tid.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Resolve the task's stdout path: the `stdout` directive, or
/// `logs/<sanitized-tid>.out`.
pub fn stdout_path(task: &Task) -> PathBuf {
    match task.directives().stdout() {
        Some(path) => PathBuf::from(path),
        None => Path::new(LOGS_DIR).join(format!("{}.out", sanitize_tid(task.tid()))),
    }
}

/// Resolve the task's stderr path: the `stderr` directive, the `stdout`
/// directive when only that is set (merged streams), or
/// `logs/<sanitized-tid>.err`.
pub fn stderr_path(task: &Task) -> PathBuf {
    match (task.directives().stderr(), task.directives().stdout()) {
        (Some(path), _) => PathBuf::from(path),
        (None, Some(stdout)) => PathBuf::from(stdout),
        (None, None) => Path::new(LOGS_DIR).join(format!("{}.err", sanitize_tid(task.tid()))),
    }
}

/// The task's stdin path, if one was given.
pub fn stdin_path(task: &Task) -> Option<PathBuf> {
    task.directives().stdin().map(PathBuf::from)
}

/// Create the parent directory of a log path if it does not exist yet.
pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
