// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Input/output linking: `input`/`output` directives produce the same
//! execution order as an explicit `after`.

use crate::prelude::*;
use jet_workflow::Workflow;
use serde_json::json;
use std::collections::BTreeSet;

fn edge_set(workflow: &Workflow) -> BTreeSet<(String, String)> {
    workflow.edges().into_iter().map(|(f, t)| (f.to_string(), t.to_string())).collect()
}

#[tokio::test]
async fn consumer_waits_for_producer() {
    let dir = tempfile::tempdir().unwrap();
    let order_file = dir.path().join("order.txt");
    let append = |name: &str| format!("echo {name} >> {}", order_file.display());

    let workflow = Workflow::new();
    workflow
        .add_task(shell_task_with("p", &append("p"), dir.path(), &[("output", json!("foo.bam"))]))
        .unwrap();
    workflow
        .add_task(shell_task_with("q", &append("q"), dir.path(), &[("input", json!("foo.bam"))]))
        .unwrap();

    let report = run_local(&workflow, 4).await;

    assert!(report.is_ok());
    assert_eq!(read_lines(&order_file), ["p", "q"]);
}

#[test]
fn io_linking_matches_explicit_after_edges() {
    let dir = tempfile::tempdir().unwrap();

    let by_io = Workflow::new();
    by_io
        .add_task(shell_task_with("p", "true", dir.path(), &[("output", json!("foo.bam"))]))
        .unwrap();
    by_io
        .add_task(shell_task_with("q", "true", dir.path(), &[("input", json!("foo.bam"))]))
        .unwrap();

    let by_after = Workflow::new();
    by_after.add_task(shell_task("p", "true", dir.path())).unwrap();
    by_after
        .add_task(shell_task_with("q", "true", dir.path(), &[("after", json!("p"))]))
        .unwrap();

    assert_eq!(edge_set(&by_io), edge_set(&by_after));
}

#[test]
fn output_patterns_match_multiple_producers() {
    let dir = tempfile::tempdir().unwrap();
    let workflow = Workflow::new();
    workflow
        .add_task(shell_task_with("s1", "true", dir.path(), &[("output", json!("s1.bam"))]))
        .unwrap();
    workflow
        .add_task(shell_task_with("s2", "true", dir.path(), &[("output", json!("s2.bam"))]))
        .unwrap();
    workflow
        .add_task(shell_task_with("merge", "true", dir.path(), &[("input", json!(".*\\.bam"))]))
        .unwrap();

    assert_eq!(workflow.dependencies("merge").unwrap().len(), 2);
}
