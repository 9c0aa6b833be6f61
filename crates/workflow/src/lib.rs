// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jet-workflow: DAG model, dependency linking, ready-task iteration, and
//! node-link persistence for the Jetstream workflow engine

pub mod error;
mod graph;
pub mod iterator;
pub mod serialize;
pub mod workflow;

pub use error::WorkflowError;
pub use iterator::{NextTask, WorkflowIterator};
pub use serialize::{LinkEntry, NodeEntry, NodeLinkDocument, NodeObject};
pub use workflow::{build_workflow, build_workflow_strict, EditSession, Workflow};
