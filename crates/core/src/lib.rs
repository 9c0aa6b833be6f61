// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jet-core: task model and run identity for the Jetstream workflow engine

pub mod macros;

pub mod directives;
pub mod fingerprint;
pub mod task;

pub use directives::{coerce_sequence, Directives, KNOWN_DIRECTIVES};
pub use fingerprint::{Fingerprint, RunId};
#[cfg(any(test, feature = "test-support"))]
pub use task::TaskBuilder;
pub use task::{
    RunState, Task, TaskError, TaskGraph, TaskId, TaskStatus, CANCELLED_RC, DEPENDENCY_FAILURE_RC,
};
