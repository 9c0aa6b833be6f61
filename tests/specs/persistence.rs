// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Persistence: a run's workflow round-trips through disk with its state,
//! and a failed document supports retry + re-run.

use crate::prelude::*;
use jet_core::TaskStatus;
use jet_workflow::Workflow;
use serde_json::json;
use std::collections::BTreeSet;

fn edge_set(workflow: &Workflow) -> BTreeSet<(String, String)> {
    workflow.edges().into_iter().map(|(f, t)| (f.to_string(), t.to_string())).collect()
}

#[tokio::test]
async fn finished_run_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let doc_path = dir.path().join("workflow.yaml");

    let workflow = Workflow::new();
    workflow.add_task(shell_task("a", "echo a", dir.path())).unwrap();
    workflow
        .add_task(shell_task_with("b", "echo b", dir.path(), &[("after", json!("a"))]))
        .unwrap();

    let report = run_local(&workflow, 2).await;
    assert!(report.is_ok());

    workflow.save(&doc_path).unwrap();
    let loaded = Workflow::load(&doc_path).unwrap();

    assert_eq!(loaded.len(), workflow.len());
    assert_eq!(edge_set(&loaded), edge_set(&workflow));
    for name in ["a", "b"] {
        assert_eq!(loaded.get_task(name).unwrap().status(), TaskStatus::Complete);
    }
}

#[tokio::test]
async fn failed_run_persists_for_retry() {
    let dir = tempfile::tempdir().unwrap();
    let doc_path = dir.path().join("workflow.yaml");

    let workflow = Workflow::new();
    workflow.add_task(shell_task("ok", "echo fine", dir.path())).unwrap();
    workflow
        .add_task(shell_task_with("bad", "exit 2", dir.path(), &[("after", json!("ok"))]))
        .unwrap();

    let report = run_local(&workflow, 2).await;
    assert_eq!(report.exit_code(), 1);

    // the failed workflow serializes completely
    workflow.save(&doc_path).unwrap();
    let loaded = Workflow::load(&doc_path).unwrap();
    assert_eq!(loaded.get_task("ok").unwrap().status(), TaskStatus::Complete);
    assert_eq!(loaded.get_task("bad").unwrap().status(), TaskStatus::Failed);

    // retry resets the failure, keeps the success, and the run repeats the
    // failed task only
    loaded.retry();
    assert_eq!(loaded.get_task("bad").unwrap().status(), TaskStatus::New);
    assert_eq!(loaded.get_task("ok").unwrap().status(), TaskStatus::Complete);

    let rerun = run_local(&loaded, 2).await;
    assert_eq!(rerun.exit_code(), 1);
    assert_eq!(loaded.get_task("bad").unwrap().returncode(), Some(2));
    // "ok" was already complete; its returncode is untouched from the first run
    assert_eq!(loaded.get_task("ok").unwrap().status(), TaskStatus::Complete);
}
