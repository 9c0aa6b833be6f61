// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Node-link serialization and on-disk persistence.
//!
//! Workflows persist as node-link documents (the same shape whether dumped
//! to YAML or JSON): nodes carry the task id, directives, and run state;
//! links carry `(source, target)` dependency edges. Edges are informational
//! on load — they are recomputed from the directives, which stay the source
//! of truth.

use crate::error::WorkflowError;
use crate::workflow::Workflow;
use jet_core::{Directives, RunState, Task, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Instant;

/// Node-link form of a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeLinkDocument {
    pub directed: bool,
    pub multigraph: bool,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub graph: serde_json::Map<String, Value>,
    pub nodes: Vec<NodeEntry>,
    pub links: Vec<LinkEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: TaskId,
    pub obj: NodeObject,
}

/// The serialized task carried by a node: its directives plus run state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeObject {
    #[serde(default, skip_serializing_if = "Directives::is_empty")]
    pub directives: Directives,
    #[serde(default)]
    pub state: RunState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEntry {
    pub source: TaskId,
    pub target: TaskId,
}

impl Workflow {
    /// Convert the workflow to a node-link document.
    pub fn serialize(&self) -> NodeLinkDocument {
        let tasks = self.tasks();
        let nodes = tasks
            .iter()
            .map(|t| NodeEntry {
                id: t.tid().clone(),
                obj: NodeObject { directives: t.directives().clone(), state: t.state() },
            })
            .collect();
        let links = self
            .edges()
            .into_iter()
            .map(|(source, target)| LinkEntry { source, target })
            .collect();
        NodeLinkDocument {
            directed: true,
            multigraph: false,
            graph: serde_json::Map::new(),
            nodes,
            links,
        }
    }

    /// Rebuild a workflow from a node-link document.
    ///
    /// Runs in one edit session; edges are relinked from the directives.
    pub fn deserialize(doc: NodeLinkDocument) -> Result<Self, WorkflowError> {
        let workflow = Workflow::new();
        let mut session = workflow.edit();
        for node in doc.nodes {
            session.add_task(Task::restore(node.id, node.obj.directives, node.obj.state))?;
        }
        session.commit()?;
        Ok(workflow)
    }

    /// All dependency edges `(dependent, prerequisite)`.
    pub fn edges(&self) -> Vec<(TaskId, TaskId)> {
        self.with_graph(|graph| graph.edges())
    }

    pub fn to_yaml(&self) -> Result<String, WorkflowError> {
        Ok(serde_yaml::to_string(&self.serialize())?)
    }

    pub fn to_json(&self) -> Result<String, WorkflowError> {
        Ok(serde_json::to_string_pretty(&self.serialize())?)
    }

    /// One-way export for Cytoscape graph visualization.
    ///
    /// Cytoscape rejects non-string node data, so every value is stringified;
    /// these documents cannot be loaded back.
    pub fn to_cytoscape_json(&self) -> Value {
        let nodes: Vec<Value> = self
            .tasks()
            .iter()
            .map(|t| {
                let mut data = serde_json::Map::new();
                data.insert("id".into(), Value::String(t.tid().to_string()));
                for (key, value) in t.directives().iter() {
                    let text = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    data.insert(key.clone(), Value::String(text));
                }
                serde_json::json!({ "data": data })
            })
            .collect();
        let edges: Vec<Value> = self
            .edges()
            .into_iter()
            .map(|(source, target)| {
                serde_json::json!({
                    "data": { "source": source.to_string(), "target": target.to_string() }
                })
            })
            .collect();
        serde_json::json!({ "elements": { "nodes": nodes, "edges": edges } })
    }

    /// Save the workflow to disk, atomically: the document is written to a
    /// `<path>.lock` sibling and renamed over the destination.
    pub fn save(&self, path: &Path) -> Result<(), WorkflowError> {
        let start = Instant::now();
        let data = match extension(path) {
            Some("json") => self.to_json()?,
            _ => self.to_yaml()?,
        };

        let mut lock_path = path.as_os_str().to_owned();
        lock_path.push(".lock");
        let lock_path = std::path::PathBuf::from(lock_path);

        std::fs::write(&lock_path, data)?;
        std::fs::rename(&lock_path, path)?;

        tracing::info!(
            path = %path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "workflow saved"
        );
        Ok(())
    }

    /// Load a workflow from a file, dispatching on the extension
    /// (`.json` for JSON, anything else parses as YAML).
    pub fn load(path: &Path) -> Result<Self, WorkflowError> {
        let data = std::fs::read_to_string(path)?;
        let doc: NodeLinkDocument = match extension(path) {
            Some("json") => serde_json::from_str(&data)?,
            _ => serde_yaml::from_str(&data)?,
        };
        Self::deserialize(doc)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

#[cfg(test)]
#[path = "serialize_tests.rs"]
mod tests;
