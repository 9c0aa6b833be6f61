// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Shared helpers for the execution specs.

use jet_backends::{LocalBackend, LocalSettings, RunContext};
use jet_core::{Directives, Task};
use jet_runner::{AsyncRunner, RunReport, RunnerSettings};
use jet_workflow::Workflow;
use std::path::Path;
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING: Once = Once::new();

/// Install a subscriber once so `RUST_LOG=debug` shows runner activity.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Build a named shell task whose output lands in `dir`.
pub fn shell_task(name: &str, cmd: &str, dir: &Path) -> Task {
    let mut directives = Directives::new();
    directives.set("name", name);
    directives.set("cmd", cmd);
    directives.set("stdout", dir.join(format!("{name}.out")).display().to_string());
    directives.set("stderr", dir.join(format!("{name}.err")).display().to_string());
    Task::new(directives)
}

/// Same as [`shell_task`] plus extra directives (`after`, `input`, ...).
pub fn shell_task_with(
    name: &str,
    cmd: &str,
    dir: &Path,
    extra: &[(&str, serde_json::Value)],
) -> Task {
    let mut directives = Directives::new();
    directives.set("name", name);
    directives.set("cmd", cmd);
    directives.set("stdout", dir.join(format!("{name}.out")).display().to_string());
    directives.set("stderr", dir.join(format!("{name}.err")).display().to_string());
    for (key, value) in extra {
        directives.set(*key, value.clone());
    }
    Task::new(directives)
}

/// Run the workflow against a local backend with the given CPU capacity.
pub async fn run_local(workflow: &Workflow, cpus: usize) -> RunReport {
    init_tracing();
    let ctx = RunContext::new();
    let backend = Arc::new(LocalBackend::new(
        ctx.clone(),
        LocalSettings { cpus: Some(cpus), ..LocalSettings::default() },
    ));
    AsyncRunner::new(RunnerSettings {
        idle_delay: Duration::from_millis(10),
        ..RunnerSettings::default()
    })
    .run(workflow, backend, &ctx)
    .await
    .expect("runner should not fail fatally")
}

/// Read whitespace-separated lines from a file produced by the tasks.
pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Parse a nanosecond timestamp written by `date +%s%N`.
pub fn read_nanos(path: &Path) -> u128 {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("missing timestamp file {}: {e}", path.display()))
        .trim()
        .parse()
        .expect("timestamp should be an integer")
}
