// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Linear chain: three tasks run strictly in dependency order.

use crate::prelude::*;
use jet_core::TaskStatus;
use jet_workflow::Workflow;
use serde_json::json;

#[tokio::test]
async fn chain_executes_in_order_and_completes() {
    let dir = tempfile::tempdir().unwrap();
    let order_file = dir.path().join("order.txt");
    let append = |name: &str| format!("echo {name} >> {}", order_file.display());

    let workflow = Workflow::new();
    workflow.add_task(shell_task("a", &append("a"), dir.path())).unwrap();
    workflow
        .add_task(shell_task_with("b", &append("b"), dir.path(), &[("after", json!("a"))]))
        .unwrap();
    workflow
        .add_task(shell_task_with("c", &append("c"), dir.path(), &[("after", json!("b"))]))
        .unwrap();

    let report = run_local(&workflow, 4).await;

    assert_eq!(read_lines(&order_file), ["a", "b", "c"]);
    assert!(report.is_ok());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.counts.get(&TaskStatus::Complete), Some(&3));
    for name in ["a", "b", "c"] {
        assert_eq!(workflow.get_task(name).unwrap().returncode(), Some(0));
    }
}

#[tokio::test]
async fn task_stdout_lands_in_configured_file() {
    let dir = tempfile::tempdir().unwrap();
    let workflow = Workflow::new();
    workflow.add_task(shell_task("greeter", "echo hello from jetstream", dir.path())).unwrap();

    run_local(&workflow, 2).await;

    let stdout = std::fs::read_to_string(dir.path().join("greeter.out")).unwrap();
    assert_eq!(stdout.trim(), "hello from jetstream");
}

#[tokio::test]
async fn cmdless_task_completes_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let workflow = Workflow::new();
    let mut directives = jet_core::Directives::new();
    directives.set("name", "noop");
    directives.set("stdout", dir.path().join("noop.out").display().to_string());
    workflow.new_task(directives).unwrap();

    let report = run_local(&workflow, 2).await;
    assert!(report.is_ok());
    assert_eq!(workflow.get_task("noop").unwrap().returncode(), Some(0));
}
