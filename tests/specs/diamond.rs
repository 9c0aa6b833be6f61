// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Diamond: independent branches run concurrently, the join waits for both.

use crate::prelude::*;
use jet_workflow::Workflow;
use serde_json::json;

#[tokio::test]
async fn branches_overlap_and_join_waits() {
    let dir = tempfile::tempdir().unwrap();
    let stamp = |name: &str, when: &str| {
        format!("date +%s%N > {}", dir.path().join(format!("{name}.{when}")).display())
    };

    let workflow = Workflow::new();
    workflow.add_task(shell_task("a", "true", dir.path())).unwrap();
    for branch in ["b", "c"] {
        workflow
            .add_task(shell_task_with(
                branch,
                &format!("{}; sleep 1; {}", stamp(branch, "start"), stamp(branch, "end")),
                dir.path(),
                &[("after", json!("a"))],
            ))
            .unwrap();
    }
    workflow
        .add_task(shell_task_with(
            "d",
            &stamp("d", "start"),
            dir.path(),
            &[("after", json!(["b", "c"]))],
        ))
        .unwrap();

    let report = run_local(&workflow, 4).await;
    assert!(report.is_ok());

    let b_start = read_nanos(&dir.path().join("b.start"));
    let b_end = read_nanos(&dir.path().join("b.end"));
    let c_start = read_nanos(&dir.path().join("c.start"));
    let c_end = read_nanos(&dir.path().join("c.end"));
    let d_start = read_nanos(&dir.path().join("d.start"));

    // branches truly overlapped
    assert!(b_start < c_end && c_start < b_end, "branches b and c should run concurrently");
    let skew = b_start.abs_diff(c_start);
    assert!(skew < 800_000_000, "branch starts {skew}ns apart");

    // the join started only after both branches ended
    assert!(d_start >= b_end, "d started before b finished");
    assert!(d_start >= c_end, "d started before c finished");
}
