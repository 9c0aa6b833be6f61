// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Resource bounds: independent tasks never exceed the backend's CPU
//! capacity, even when many are ready at once.

use crate::prelude::*;
use jet_workflow::Workflow;

#[tokio::test]
async fn independent_tasks_respect_cpu_capacity() {
    let capacity = 2;
    let tasks = 6;

    let dir = tempfile::tempdir().unwrap();
    let workflow = Workflow::new();
    for i in 0..tasks {
        let name = format!("t{i}");
        let cmd = format!(
            "date +%s%N > {dir}/{name}.start; sleep 0.3; date +%s%N > {dir}/{name}.end",
            dir = dir.path().display(),
        );
        workflow.add_task(shell_task(&name, &cmd, dir.path())).unwrap();
    }

    let report = run_local(&workflow, capacity).await;
    assert!(report.is_ok());

    // reconstruct intervals and sweep for the maximum overlap
    let mut events: Vec<(u128, i32)> = Vec::new();
    for i in 0..tasks {
        let start = read_nanos(&dir.path().join(format!("t{i}.start")));
        let end = read_nanos(&dir.path().join(format!("t{i}.end")));
        assert!(start < end);
        events.push((start, 1));
        events.push((end, -1));
    }
    events.sort_unstable();

    let mut live = 0;
    let mut peak = 0;
    for (_, delta) in events {
        live += delta;
        peak = peak.max(live);
    }
    assert!(
        peak <= capacity as i32,
        "{peak} tasks ran concurrently with capacity {capacity}"
    );
}

#[tokio::test]
async fn multi_cpu_request_holds_multiple_permits() {
    let dir = tempfile::tempdir().unwrap();
    let workflow = Workflow::new();

    // a 2-cpu task and a 1-cpu task cannot overlap under capacity 2
    for (name, cpus) in [("wide", 2u64), ("narrow", 1u64)] {
        let cmd = format!(
            "date +%s%N > {dir}/{name}.start; sleep 0.3; date +%s%N > {dir}/{name}.end",
            dir = dir.path().display(),
        );
        let task = shell_task_with(name, &cmd, dir.path(), &[("cpus", serde_json::json!(cpus))]);
        workflow.add_task(task).unwrap();
    }

    let report = run_local(&workflow, 2).await;
    assert!(report.is_ok());

    let wide = (
        read_nanos(&dir.path().join("wide.start")),
        read_nanos(&dir.path().join("wide.end")),
    );
    let narrow = (
        read_nanos(&dir.path().join("narrow.start")),
        read_nanos(&dir.path().join("narrow.end")),
    );
    let overlap = wide.0 < narrow.1 && narrow.0 < wide.1;
    assert!(!overlap, "2-cpu and 1-cpu tasks overlapped under capacity 2");
}
