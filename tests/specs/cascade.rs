// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Failure cascade: a failed task takes its whole dependent subtree with it,
//! and the dependents are never spawned.

use crate::prelude::*;
use jet_core::{TaskStatus, DEPENDENCY_FAILURE_RC};
use jet_workflow::Workflow;
use serde_json::json;

#[tokio::test]
async fn failed_task_cascades_to_dependents() {
    let dir = tempfile::tempdir().unwrap();
    let witness = dir.path().join("never-ran.txt");

    let workflow = Workflow::new();
    workflow.add_task(shell_task("a", "exit 2", dir.path())).unwrap();
    workflow
        .add_task(shell_task_with(
            "b",
            &format!("touch {}", witness.display()),
            dir.path(),
            &[("after", json!("a"))],
        ))
        .unwrap();
    workflow
        .add_task(shell_task_with(
            "c",
            &format!("touch {}", witness.display()),
            dir.path(),
            &[("after", json!("b"))],
        ))
        .unwrap();

    let report = run_local(&workflow, 4).await;

    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.failed.len(), 3);

    let a = workflow.get_task("a").unwrap();
    assert_eq!(a.status(), TaskStatus::Failed);
    assert_eq!(a.returncode(), Some(2));

    for name in ["b", "c"] {
        let task = workflow.get_task(name).unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.returncode(), Some(DEPENDENCY_FAILURE_RC));
    }

    // dependents never spawned a subprocess
    assert!(!witness.exists());
}

#[tokio::test]
async fn unrelated_branches_survive_a_failure() {
    let dir = tempfile::tempdir().unwrap();

    let workflow = Workflow::new();
    workflow.add_task(shell_task("broken", "exit 1", dir.path())).unwrap();
    workflow
        .add_task(shell_task_with(
            "victim",
            "echo never",
            dir.path(),
            &[("after", json!("broken"))],
        ))
        .unwrap();
    workflow.add_task(shell_task("bystander", "echo fine", dir.path())).unwrap();

    let report = run_local(&workflow, 4).await;

    assert_eq!(report.exit_code(), 1);
    assert_eq!(workflow.get_task("bystander").unwrap().status(), TaskStatus::Complete);
    assert_eq!(
        workflow.get_task("victim").unwrap().returncode(),
        Some(DEPENDENCY_FAILURE_RC)
    );
}
