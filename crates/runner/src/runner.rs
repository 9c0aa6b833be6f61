// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! The asynchronous runner: a cooperative event loop that pulls ready tasks
//! from the workflow iterator, fans them out to a backend, and shepherds the
//! run to a clean finish or a graceful cancellation.

use indexmap::IndexMap;
use jet_backends::{Backend, BackendError, RunContext, SpawnOutcome};
use jet_core::{RunId, Task, TaskId, TaskStatus};
use jet_workflow::{NextTask, Workflow, WorkflowIterator};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::sleep;

/// Tunables for [`AsyncRunner`].
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Interval between periodic status log lines.
    pub logging_interval: Duration,
    /// How long to yield when the iterator has no ready task.
    pub idle_delay: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self { logging_interval: Duration::from_secs(3), idle_delay: Duration::from_millis(100) }
    }
}

/// Fatal runner failures. Task-level failures are not errors — they land in
/// the [`RunReport`].
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("backend spawn panicked: {0}")]
    SpawnPanic(String),
}

/// Summary of a finished (or cancelled) run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub counts: IndexMap<TaskStatus, usize>,
    pub failed: Vec<TaskId>,
    pub elapsed: Duration,
}

impl RunReport {
    /// True when every task in the workflow completed successfully.
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty() && self.counts.keys().all(|s| *s == TaskStatus::Complete)
    }

    /// Process exit code for this run: 0 on full success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_ok() {
            0
        } else {
            1
        }
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run {} finished in {:?}:", self.run_id, self.elapsed)?;
        for (status, n) in &self.counts {
            write!(f, " {status}={n}")?;
        }
        Ok(())
    }
}

/// Drives one workflow against one backend on the current tokio runtime.
pub struct AsyncRunner {
    settings: RunnerSettings,
}

impl Default for AsyncRunner {
    fn default() -> Self {
        Self::new(RunnerSettings::default())
    }
}

impl AsyncRunner {
    pub fn new(settings: RunnerSettings) -> Self {
        Self { settings }
    }

    /// Run the workflow to completion.
    ///
    /// Schedules the periodic status logger and the backend's background
    /// coroutines, then loops the workflow manager until the iterator is
    /// exhausted or the run is cancelled (explicitly via the context, or by
    /// Ctrl-C). Always drains in-flight spawns and backend coroutines before
    /// returning, so no external work outlives the call.
    pub async fn run(
        &self,
        workflow: &Workflow,
        backend: Arc<dyn Backend>,
        ctx: &RunContext,
    ) -> Result<RunReport, RunnerError> {
        let started = Instant::now();
        tracing::info!(run_id = %ctx.run_id(), "runner starting");

        let interrupt_watch = tokio::spawn({
            let ctx = ctx.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, shutting down");
                    ctx.cancel();
                }
            }
        });
        let logger = tokio::spawn(status_logger(
            workflow.clone(),
            Arc::clone(&backend),
            ctx.clone(),
            self.settings.logging_interval,
        ));
        let coroutines = Arc::clone(&backend).coroutines();

        let managed = self.manage(workflow, &backend, ctx).await;

        // Shutdown: stop background loops whether the run finished or died.
        ctx.cancel();
        for handle in coroutines {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "backend coroutine did not stop cleanly");
            }
        }
        let _ = logger.await;
        interrupt_watch.abort();

        let report = build_report(workflow, ctx, started.elapsed());
        managed?;
        tracing::info!(%report, "runner stopped");
        Ok(report)
    }

    /// The workflow manager loop: pull, dispatch, collect.
    async fn manage(
        &self,
        workflow: &Workflow,
        backend: &Arc<dyn Backend>,
        ctx: &RunContext,
    ) -> Result<(), RunnerError> {
        let mut iter = WorkflowIterator::new(workflow);
        let mut spawns: JoinSet<(Task, Result<SpawnOutcome, BackendError>)> = JoinSet::new();
        tracing::info!(tasks = iter.total(), "workflow manager started");

        loop {
            if ctx.is_cancelled() {
                break;
            }
            while let Some(joined) = spawns.try_join_next() {
                handle_spawn_result(joined, &mut iter)?;
            }

            match iter.next() {
                NextTask::Ready(task) => {
                    tracing::debug!(task = %task.tid(), "dispatching to backend");
                    let backend = Arc::clone(backend);
                    spawns.spawn(async move {
                        let result = backend.spawn(task.clone()).await;
                        (task, result)
                    });
                }
                NextTask::NotReady => {
                    tokio::select! {
                        _ = ctx.cancelled() => {}
                        _ = sleep(self.settings.idle_delay) => {}
                        Some(joined) = spawns.join_next(), if !spawns.is_empty() => {
                            handle_spawn_result(joined, &mut iter)?;
                        }
                    }
                }
                NextTask::Exhausted => break,
            }
        }

        // Drain in-flight work; cancelled backends fail their tasks quickly.
        while let Some(joined) = spawns.join_next().await {
            handle_spawn_result(joined, &mut iter)?;
        }
        tracing::info!("workflow manager stopped");
        Ok(())
    }
}

/// Fold one finished spawn back into the run.
fn handle_spawn_result(
    joined: Result<(Task, Result<SpawnOutcome, BackendError>), tokio::task::JoinError>,
    iter: &mut WorkflowIterator,
) -> Result<(), RunnerError> {
    let (task, result) = joined.map_err(|e| RunnerError::SpawnPanic(e.to_string()))?;
    match result {
        Ok(SpawnOutcome::Finished) => {
            // The task's own state is authoritative; a backend that returned
            // without a terminal call is defective and the task fails.
            if !task.is_done() {
                tracing::warn!(task = %task.tid(), "backend returned without terminal state");
                let _ = task.fail(1);
            }
        }
        Ok(SpawnOutcome::Resubmit) => {
            tracing::debug!(task = %task.tid(), "resubmit requested, requeueing");
            task.reset();
            iter.requeue(&task);
        }
        Err(e) => {
            tracing::warn!(task = %task.tid(), error = %e, "backend spawn failed");
            if !task.is_done() {
                let _ = task.fail(1);
            }
        }
    }
    Ok(())
}

async fn status_logger(
    workflow: Workflow,
    backend: Arc<dyn Backend>,
    ctx: RunContext,
    interval: Duration,
) {
    tracing::debug!("status logger started");
    loop {
        tokio::select! {
            _ = ctx.cancelled() => break,
            _ = sleep(interval) => {}
        }
        tracing::info!(workflow = %workflow, "run status");
        backend.log_status();
    }
    tracing::debug!("status logger stopped");
}

fn build_report(workflow: &Workflow, ctx: &RunContext, elapsed: Duration) -> RunReport {
    let failed = workflow
        .tasks()
        .iter()
        .filter(|t| t.status() == TaskStatus::Failed)
        .map(|t| t.tid().clone())
        .collect();
    RunReport { run_id: ctx.run_id().clone(), counts: workflow.status_counts(), failed, elapsed }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
