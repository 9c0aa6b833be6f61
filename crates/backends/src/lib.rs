// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jet-backends: pluggable task executors for the Jetstream workflow engine
//!
//! A backend turns a ready task into running external work — a local
//! subprocess or a Slurm batch job — and reports the outcome back onto the
//! task itself.

mod backend;
pub mod local;
pub mod paths;
pub mod slurm;

pub use backend::{Backend, BackendError, RunContext, SpawnOutcome};
pub use local::{guess_concurrency, LocalBackend, LocalSettings};
pub use slurm::{sacct, SlurmBackend, SlurmSettings};
