// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Backend contract: how the runner hands tasks to an executor.

use async_trait::async_trait;
use jet_core::{Fingerprint, RunId, TaskError};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Errors from backend execution.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("task requested {requested} cpus but backend capacity is {capacity}")]
    ResourceRequest { requested: u64, capacity: usize },

    #[error("backend io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("slurm command failed: {0}")]
    Slurm(String),

    #[error(transparent)]
    Task(#[from] TaskError),
}

/// What a completed spawn means for the task it carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// The backend drove the task to a terminal state.
    Finished,
    /// External submission did not stick; the runner should reset the task
    /// and hand it out again later.
    Resubmit,
}

/// Per-run state shared by the runner and every backend: the run identity
/// used to name and annotate external jobs, plus the cancellation token that
/// carries cooperative shutdown.
#[derive(Clone)]
pub struct RunContext {
    fingerprint: Arc<Fingerprint>,
    cancel: CancellationToken,
}

impl RunContext {
    /// Capture a fresh fingerprint for a new run.
    pub fn new() -> Self {
        Self { fingerprint: Arc::new(Fingerprint::capture()), cancel: CancellationToken::new() }
    }

    pub fn run_id(&self) -> &RunId {
        &self.fingerprint.id
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Request cooperative shutdown of everything holding this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the run is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A pluggable executor that turns a ready task into running external work.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute one task.
    ///
    /// Must finish by calling exactly one of `task.complete(rc)` or
    /// `task.fail(rc)` and returning [`SpawnOutcome::Finished`], or return
    /// [`SpawnOutcome::Resubmit`] with the task untouched. On run
    /// cancellation the task fails with [`jet_core::CANCELLED_RC`] and all
    /// held resources are released.
    async fn spawn(&self, task: jet_core::Task) -> Result<SpawnOutcome, BackendError>;

    /// Long-running background loops the runner drives alongside spawns
    /// (e.g. the Slurm polling loop). Loops observe the backend's
    /// [`RunContext`] for shutdown.
    fn coroutines(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        Vec::new()
    }

    /// Emit one structured status line for the periodic run logger.
    fn log_status(&self) {}
}
