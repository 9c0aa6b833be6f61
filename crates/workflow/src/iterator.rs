// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Pull-based ready-task scheduler.
//!
//! The runner calls [`WorkflowIterator::next`] whenever it wants more work.
//! Tasks move `remaining -> pending -> (dropped when terminal)`; the iterator
//! never blocks, it reports "nothing ready right now" and lets the caller
//! decide how long to wait.

use crate::workflow::Workflow;
use jet_core::Task;

/// Result of one scheduler pull.
#[derive(Debug)]
pub enum NextTask {
    /// A task became ready; it has been started and handed out.
    Ready(Task),
    /// Work remains but nothing is ready yet; check back later.
    NotReady,
    /// Every task reached a terminal state.
    Exhausted,
}

/// Iterates a workflow in dependency order.
pub struct WorkflowIterator {
    total: usize,
    remaining: Vec<Task>,
    pending: Vec<Task>,
}

impl WorkflowIterator {
    /// Snapshot the workflow's tasks in insertion order.
    pub fn new(workflow: &Workflow) -> Self {
        let remaining = workflow.tasks();
        Self { total: remaining.len(), remaining, pending: Vec::new() }
    }

    /// Total number of tasks this iterator started with.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Tasks not yet terminal (not handed out plus in flight).
    pub fn outstanding(&self) -> usize {
        self.remaining.len() + self.pending.len()
    }

    /// Pull the next ready task.
    ///
    /// Scans `remaining` in reverse insertion order: the most recently added
    /// ready task wins, which walks multi-branch graphs depth-first and keeps
    /// the longest in-flight path short.
    pub fn next(&mut self) -> NextTask {
        self.pending.retain(|t| !t.is_done());

        if self.remaining.is_empty() && self.pending.is_empty() {
            return NextTask::Exhausted;
        }

        for i in (0..self.remaining.len()).rev() {
            let task = self.remaining[i].clone();
            if task.is_done() {
                // Completed out-of-band (failure cascade); nothing to hand out.
                self.remaining.remove(i);
            } else if task.is_ready() {
                self.remaining.remove(i);
                if let Err(e) = task.start() {
                    tracing::warn!(task = %task.tid(), error = %e, "ready task failed to start");
                    continue;
                }
                self.pending.push(task.clone());
                return NextTask::Ready(task);
            }
        }

        if self.remaining.is_empty() && self.pending.is_empty() {
            NextTask::Exhausted
        } else {
            NextTask::NotReady
        }
    }

    /// Return a handed-out task to the remaining pool (after a reset), so a
    /// later pull can hand it out again.
    pub fn requeue(&mut self, task: &Task) {
        self.pending.retain(|t| t != task);
        if !self.remaining.contains(task) {
            self.remaining.push(task.clone());
        }
    }
}

impl std::fmt::Debug for WorkflowIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WorkflowIterator({}/{} remaining)", self.outstanding(), self.total)
    }
}

#[cfg(test)]
#[path = "iterator_tests.rs"]
mod tests;
