// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Workflow errors

use jet_core::{TaskError, TaskId};
use thiserror::Error;

/// Errors from building, mutating, or persisting a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("duplicate task id: {0}")]
    DuplicateTask(TaskId),

    #[error("unknown task id: {0}")]
    UnknownTask(TaskId),

    #[error("edge {from} -> {to} would make the workflow cyclic")]
    NotDag { from: TaskId, to: TaskId },

    #[error("task {tid}: \"{directive}\" directive cannot match itself (pattern: {pattern})")]
    SelfDependency { tid: TaskId, directive: &'static str, pattern: String },

    #[error("no tasks match pattern: {0}")]
    NoMatch(String),

    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("no tasks were found in the data")]
    EmptyTaskList,

    #[error("task {tid}: unknown directive {key:?}")]
    UnknownDirective { tid: TaskId, key: String },

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("workflow io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("workflow yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("workflow json error: {0}")]
    Json(#[from] serde_json::Error),
}
