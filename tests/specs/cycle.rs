// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Cycle rejection: a transaction that would make the graph cyclic aborts
//! with nothing added.

use crate::prelude::*;
use jet_workflow::{Workflow, WorkflowError};
use serde_json::json;

#[test]
fn cyclic_transaction_aborts_completely() {
    let dir = tempfile::tempdir().unwrap();
    let workflow = Workflow::new();

    let mut session = workflow.edit();
    session
        .add_task(shell_task_with("x", "true", dir.path(), &[("after", json!("y"))]))
        .unwrap();
    session
        .add_task(shell_task_with("y", "true", dir.path(), &[("after", json!("x"))]))
        .unwrap();
    let err = session.commit().unwrap_err();

    assert!(matches!(err, WorkflowError::NotDag { .. }));
    assert!(!workflow.contains("x"));
    assert!(!workflow.contains("y"));
    assert!(workflow.is_empty());
}

#[test]
fn cyclic_transaction_leaves_prior_tasks_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let workflow = Workflow::new();
    workflow.add_task(shell_task("keeper", "true", dir.path())).unwrap();

    let mut session = workflow.edit();
    session
        .add_task(shell_task_with("x", "true", dir.path(), &[("after", json!("y"))]))
        .unwrap();
    session
        .add_task(shell_task_with("y", "true", dir.path(), &[("after", json!("x"))]))
        .unwrap();
    assert!(session.commit().is_err());

    assert_eq!(workflow.len(), 1);
    assert!(workflow.contains("keeper"));
}
