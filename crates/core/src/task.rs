// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Task identity and state machine.
//!
//! A [`Task`] is the atomic unit of work: a stable id, a set of directives,
//! and a lifecycle state. Task handles are cheaply cloneable (`Arc` inside)
//! so the workflow, the iterator, and a backend can all hold the same task
//! while a run is in flight.

use crate::directives::Directives;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use smol_str::SmolStr;
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Returncode recorded when a task fails because one of its prerequisites
/// failed, rather than because its own command did.
pub const DEPENDENCY_FAILURE_RC: i32 = -12;

/// Returncode recorded when a run is cancelled while the task is in flight.
pub const CANCELLED_RC: i32 = -15;

/// Stable task identifier: the user-supplied name, or a content hash over
/// the directives when no name is given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(SmolStr);

impl TaskId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::borrow::Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl std::ops::Deref for TaskId {
    type Target = str;

    fn deref(&self) -> &str {
        self.0.as_str()
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet handed to a backend
    #[default]
    New,
    /// Handed to a backend, not yet terminal
    Pending,
    /// Finished with success
    Complete,
    /// Finished with failure (own command or dependency cascade)
    Failed,
}

impl TaskStatus {
    /// Check if this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Failed)
    }
}

crate::simple_display! {
    TaskStatus {
        New => "new",
        Pending => "pending",
        Complete => "complete",
        Failed => "failed",
    }
}

/// Mutable run state attached to a task.
///
/// `annotations` is a free-form mapping for ancillary bookkeeping set by
/// backends and the runner (`slurm_job_id`, `start_time`, `err`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returncode: Option<i32>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub annotations: IndexMap<String, Value>,
}

/// Errors from task state transitions.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid transition for task {tid}: {from} -> {to}")]
    InvalidTransition { tid: TaskId, from: TaskStatus, to: TaskStatus },
}

/// Dependency lookups a task delegates to its owning workflow.
///
/// The workflow holds the graph; the task holds only a weak back-pointer, so
/// dropping the workflow never leaks tasks and a detached task degrades to
/// "no prerequisites".
pub trait TaskGraph: Send + Sync {
    /// True when every prerequisite of `tid` is terminal with success.
    fn prerequisites_met(&self, tid: &TaskId) -> bool;

    /// Mark every `new` task that transitively depends on `tid` as failed
    /// with [`DEPENDENCY_FAILURE_RC`].
    fn cascade_failure(&self, tid: &TaskId);
}

struct TaskInner {
    tid: TaskId,
    directives: Directives,
    run: Mutex<RunState>,
    workflow: Mutex<Weak<dyn TaskGraph>>,
}

/// Cloneable handle to a single task.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    /// Create a new task from directives.
    ///
    /// The id is the `name` directive when present, otherwise a content hash
    /// over the directive mapping.
    pub fn new(directives: Directives) -> Self {
        let tid = match directives.name() {
            Some(name) => TaskId::new(name),
            None => content_id(&directives),
        };
        Self::restore(tid, directives, RunState::default())
    }

    /// Rebuild a task from persisted parts (id wins over the name directive).
    pub fn restore(tid: TaskId, directives: Directives, state: RunState) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                tid,
                directives,
                run: Mutex::new(state),
                workflow: Mutex::new(Weak::<DetachedGraph>::new() as Weak<dyn TaskGraph>),
            }),
        }
    }

    pub fn tid(&self) -> &TaskId {
        &self.inner.tid
    }

    pub fn directives(&self) -> &Directives {
        &self.inner.directives
    }

    /// The user-facing name directive, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.inner.directives.name()
    }

    /// Snapshot of the current run state.
    pub fn state(&self) -> RunState {
        self.inner.run.lock().clone()
    }

    pub fn status(&self) -> TaskStatus {
        self.inner.run.lock().status
    }

    pub fn returncode(&self) -> Option<i32> {
        self.inner.run.lock().returncode
    }

    /// Check if the task reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.status().is_terminal()
    }

    /// Check if the task is ready to run: status `new` and every prerequisite
    /// terminal with success. Delegates to the owning workflow; a detached
    /// task has no prerequisites.
    pub fn is_ready(&self) -> bool {
        if self.status() != TaskStatus::New {
            return false;
        }
        match self.inner.workflow.lock().upgrade() {
            Some(graph) => graph.prerequisites_met(&self.inner.tid),
            None => true,
        }
    }

    /// Attach this task to its owning workflow graph.
    ///
    /// Called by workflow containers when the task is added; replaces any
    /// previous attachment.
    pub fn attach(&self, graph: Weak<dyn TaskGraph>) {
        *self.inner.workflow.lock() = graph;
    }

    /// Record an ancillary state value.
    pub fn annotate(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.run.lock().annotations.insert(key.into(), value.into());
    }

    /// Read a copy of an ancillary state value.
    pub fn annotation(&self, key: &str) -> Option<Value> {
        self.inner.run.lock().annotations.get(key).cloned()
    }

    /// Transition `new -> pending` and stamp the start time.
    pub fn start(&self) -> Result<(), TaskError> {
        let mut run = self.inner.run.lock();
        if run.status != TaskStatus::New {
            return Err(self.invalid(run.status, TaskStatus::Pending));
        }
        run.status = TaskStatus::Pending;
        run.returncode = None;
        run.annotations.insert("start_time".into(), now_stamp().into());
        tracing::debug!(task = %self.inner.tid, "task started");
        Ok(())
    }

    /// Transition `pending -> complete` and store the returncode.
    pub fn complete(&self, returncode: i32) -> Result<(), TaskError> {
        let mut run = self.inner.run.lock();
        if run.status != TaskStatus::Pending {
            return Err(self.invalid(run.status, TaskStatus::Complete));
        }
        run.status = TaskStatus::Complete;
        run.returncode = Some(returncode);
        run.annotations.insert("done_time".into(), now_stamp().into());
        tracing::info!(task = %self.inner.tid, returncode, "task complete");
        Ok(())
    }

    /// Transition to `failed`, store the returncode, and cascade the failure
    /// to every `new` dependent in the owning workflow.
    ///
    /// Failing from `new` is allowed so out-of-band failures (cascades
    /// arriving before the task was ever handed out) are representable.
    pub fn fail(&self, returncode: i32) -> Result<(), TaskError> {
        {
            let mut run = self.inner.run.lock();
            if run.status.is_terminal() {
                return Err(self.invalid(run.status, TaskStatus::Failed));
            }
            run.status = TaskStatus::Failed;
            run.returncode = Some(returncode);
            run.annotations.insert("done_time".into(), now_stamp().into());
        }
        tracing::info!(task = %self.inner.tid, returncode, "task failed");
        let graph = self.inner.workflow.lock().upgrade();
        if let Some(graph) = graph {
            graph.cascade_failure(&self.inner.tid);
        }
        Ok(())
    }

    /// Mark this task failed because a prerequisite failed.
    ///
    /// No-op unless the task is still `new`; never re-triggers a cascade
    /// (the caller walks the graph transitively). Returns true when the
    /// status changed.
    pub fn mark_dependency_failed(&self) -> bool {
        let mut run = self.inner.run.lock();
        if run.status != TaskStatus::New {
            return false;
        }
        run.status = TaskStatus::Failed;
        run.returncode = Some(DEPENDENCY_FAILURE_RC);
        run.annotations.insert("done_time".into(), now_stamp().into());
        run.annotations.insert("err".into(), "dependency failed".into());
        tracing::info!(task = %self.inner.tid, "task failed by dependency");
        true
    }

    /// Return the task to a clean `new` state, dropping the returncode and
    /// all ancillary state.
    pub fn reset(&self) {
        let mut run = self.inner.run.lock();
        run.status = TaskStatus::New;
        run.returncode = None;
        run.annotations.clear();
        tracing::debug!(task = %self.inner.tid, "task reset");
    }

    fn invalid(&self, from: TaskStatus, to: TaskStatus) -> TaskError {
        TaskError::InvalidTransition { tid: self.inner.tid.clone(), from, to }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.inner.tid == other.inner.tid
    }
}

impl Eq for Task {}

impl std::hash::Hash for Task {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.tid.hash(state);
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("tid", &self.inner.tid)
            .field("status", &self.status())
            .finish()
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner.tid)
    }
}

/// Placeholder graph type used only to mint an empty `Weak`.
struct DetachedGraph;

impl TaskGraph for DetachedGraph {
    fn prerequisites_met(&self, _tid: &TaskId) -> bool {
        true
    }

    fn cascade_failure(&self, _tid: &TaskId) {}
}

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Derive a content-hash id for an anonymous task.
fn content_id(directives: &Directives) -> TaskId {
    let canonical = serde_json::to_string(directives).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(18);
    hex.push_str("js");
    for byte in digest.iter().take(8) {
        hex.push_str(&format!("{byte:02x}"));
    }
    TaskId::new(hex)
}

/// Test builder for tasks: directive-by-directive construction.
#[cfg(any(test, feature = "test-support"))]
pub struct TaskBuilder {
    directives: Directives,
}

#[cfg(any(test, feature = "test-support"))]
impl TaskBuilder {
    pub fn new() -> Self {
        Self { directives: Directives::new() }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.directives.set("name", name);
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.directives.set("cmd", cmd);
        self
    }

    pub fn after(mut self, pattern: &str) -> Self {
        self.directives.set("after", pattern);
        self
    }

    pub fn before(mut self, pattern: &str) -> Self {
        self.directives.set("before", pattern);
        self
    }

    pub fn input(mut self, value: &str) -> Self {
        self.directives.set("input", value);
        self
    }

    pub fn output(mut self, value: &str) -> Self {
        self.directives.set("output", value);
        self
    }

    pub fn cpus(mut self, cpus: u64) -> Self {
        self.directives.set("cpus", cpus);
        self
    }

    pub fn directive(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.directives.set(key, value);
        self
    }

    pub fn build(self) -> Task {
        Task::new(self.directives)
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Task {
    /// Create a builder with test defaults.
    pub fn builder() -> TaskBuilder {
        TaskBuilder::new()
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
