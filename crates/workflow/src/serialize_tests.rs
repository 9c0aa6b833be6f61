// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

use super::*;
use jet_core::{Task, TaskStatus};
use std::collections::BTreeSet;

fn sample_workflow() -> Workflow {
    let workflow = Workflow::new();
    workflow
        .add_task(Task::builder().name("a").cmd("echo a").output("a.out").build())
        .unwrap();
    workflow
        .add_task(Task::builder().name("b").cmd("echo b").after("a").cpus(2).build())
        .unwrap();
    workflow.add_task(Task::builder().name("c").cmd("echo c").input("a.out").build()).unwrap();
    workflow
}

fn edge_set(workflow: &Workflow) -> BTreeSet<(String, String)> {
    workflow.edges().into_iter().map(|(f, t)| (f.to_string(), t.to_string())).collect()
}

#[test]
fn document_shape() {
    let doc = sample_workflow().serialize();
    assert!(doc.directed);
    assert!(!doc.multigraph);
    assert_eq!(doc.nodes.len(), 3);
    assert_eq!(doc.links.len(), 2);

    let ids: Vec<&str> = doc.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
}

#[test]
fn yaml_round_trip_preserves_structure() {
    let workflow = sample_workflow();
    let yaml = workflow.to_yaml().unwrap();
    let doc: NodeLinkDocument = serde_yaml::from_str(&yaml).unwrap();
    let back = Workflow::deserialize(doc).unwrap();

    assert_eq!(back.len(), workflow.len());
    assert_eq!(edge_set(&back), edge_set(&workflow));
    assert_eq!(
        back.get_task("b").unwrap().directives(),
        workflow.get_task("b").unwrap().directives()
    );
}

#[test]
fn json_round_trip_preserves_structure() {
    let workflow = sample_workflow();
    let json = workflow.to_json().unwrap();
    let doc: NodeLinkDocument = serde_json::from_str(&json).unwrap();
    let back = Workflow::deserialize(doc).unwrap();
    assert_eq!(edge_set(&back), edge_set(&workflow));
}

#[test]
fn round_trip_preserves_task_state() {
    let workflow = sample_workflow();
    let a = workflow.get_task("a").unwrap();
    a.start().unwrap();
    a.annotate("slurm_job_id", "4242");
    a.complete(0).unwrap();
    let c = workflow.get_task("c").unwrap();
    c.start().unwrap();
    c.fail(3).unwrap();

    let back = Workflow::deserialize(workflow.serialize()).unwrap();
    let a2 = back.get_task("a").unwrap();
    assert_eq!(a2.status(), TaskStatus::Complete);
    assert_eq!(a2.returncode(), Some(0));
    assert_eq!(a2.annotation("slurm_job_id"), Some("4242".into()));
    assert_eq!(back.get_task("c").unwrap().returncode(), Some(3));
}

#[test]
fn failed_workflow_serializes_completely_for_retry() {
    let workflow = sample_workflow();
    let a = workflow.get_task("a").unwrap();
    a.start().unwrap();
    a.fail(1).unwrap();

    let back = Workflow::deserialize(workflow.serialize()).unwrap();
    assert_eq!(back.len(), 3);
    back.retry();
    assert_eq!(back.status_counts().get(&TaskStatus::New), Some(&3));
}

#[test]
fn save_and_load_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workflow.yaml");

    let workflow = sample_workflow();
    workflow.save(&path).unwrap();

    // atomic save leaves no lock file behind
    assert!(path.exists());
    assert!(!dir.path().join("workflow.yaml.lock").exists());

    let back = Workflow::load(&path).unwrap();
    assert_eq!(back.len(), 3);
    assert_eq!(edge_set(&back), edge_set(&workflow));
}

#[test]
fn save_and_load_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workflow.json");

    let workflow = sample_workflow();
    workflow.save(&path).unwrap();
    let data = std::fs::read_to_string(&path).unwrap();
    assert!(data.trim_start().starts_with('{'));

    let back = Workflow::load(&path).unwrap();
    assert_eq!(edge_set(&back), edge_set(&workflow));
}

#[test]
fn save_overwrites_existing_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workflow.yaml");

    sample_workflow().save(&path).unwrap();
    let small = Workflow::new();
    small.add_task(Task::builder().name("only").cmd("true").build()).unwrap();
    small.save(&path).unwrap();

    assert_eq!(Workflow::load(&path).unwrap().len(), 1);
}

#[test]
fn load_missing_file_is_io_error() {
    let err = Workflow::load(std::path::Path::new("/nonexistent/wf.yaml")).unwrap_err();
    assert!(matches!(err, WorkflowError::Io(_)));
}

#[test]
fn cytoscape_export_stringifies_node_data() {
    let data = sample_workflow().to_cytoscape_json();
    let nodes = data["elements"]["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 3);
    // cpus was numeric in directives; export forces strings
    let b = nodes.iter().find(|n| n["data"]["id"] == "b").unwrap();
    assert_eq!(b["data"]["cpus"], "2");

    let edges = data["elements"]["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 2);
}
