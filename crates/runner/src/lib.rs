// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jet-runner: the cooperative event loop that executes Jetstream workflows

pub mod runner;

pub use runner::{AsyncRunner, RunReport, RunnerError, RunnerSettings};
