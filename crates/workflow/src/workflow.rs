// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Network graph model of computational workflows.
//!
//! A [`Workflow`] models a computation as a directed acyclic graph: nodes are
//! tasks to complete, edges are dependencies between them. Workflows are
//! built from rendered task lists (a collaborator produces those), executed
//! through [`crate::WorkflowIterator`], and persisted in node-link form
//! (see [`crate::serialize`]).
//!
//! Workflows do not change in response to events that occur during runtime:
//! once built, the task set and edges are final. The only exception is that
//! a task fails automatically when any of its prerequisites fails.

use crate::error::WorkflowError;
use crate::graph::Graph;
use indexmap::{IndexMap, IndexSet};
use jet_core::{Directives, Task, TaskGraph, TaskId, TaskStatus};
use parking_lot::{Mutex, MutexGuard};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Which task attribute a dependency pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchOn {
    Name,
    Id,
    Output,
}

#[derive(Debug)]
pub(crate) struct GraphState {
    pub(crate) graph: Graph,
    /// Anchored-pattern cache; dependency matching is a hot path during build.
    patterns: HashMap<String, Regex>,
}

impl GraphState {
    fn new() -> Self {
        Self { graph: Graph::default(), patterns: HashMap::new() }
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) state: Mutex<GraphState>,
}

/// A directed acyclic graph of tasks with dependency linking and
/// transactional mutation.
///
/// Handles are cheap clones over shared state; per-task lifecycle state lives
/// on the tasks themselves.
#[derive(Clone, Debug)]
pub struct Workflow {
    shared: Arc<Shared>,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow {
    /// Create an empty workflow.
    pub fn new() -> Self {
        Self { shared: Arc::new(Shared { state: Mutex::new(GraphState::new()) }) }
    }

    fn graph_weak(&self) -> Weak<dyn TaskGraph> {
        Arc::downgrade(&(Arc::clone(&self.shared) as Arc<dyn TaskGraph>))
    }

    /// Add a task and link its dependencies immediately.
    ///
    /// Rejects duplicate ids. If linking fails the node is removed again and
    /// the workflow is unchanged. For multi-task additions prefer [`edit`],
    /// which defers linking to commit time.
    ///
    /// [`edit`]: Workflow::edit
    pub fn add_task(&self, task: Task) -> Result<Task, WorkflowError> {
        let mut state = self.shared.state.lock();
        state.graph.insert(task.clone())?;
        task.attach(self.graph_weak());
        if let Err(e) = link_dependencies(&mut state, &task) {
            state.graph.remove(task.tid());
            return Err(e);
        }
        Ok(task)
    }

    /// Shortcut: create a task from directives and add it.
    pub fn new_task(&self, directives: Directives) -> Result<Task, WorkflowError> {
        self.add_task(Task::new(directives))
    }

    /// Remove a task and every edge touching it.
    pub fn remove_task(&self, tid: &str) -> Option<Task> {
        self.shared.state.lock().graph.remove(tid)
    }

    /// Open an edit session: a single-writer transaction over the graph.
    ///
    /// Tasks added through the session are linked all at once on
    /// [`EditSession::commit`]; on error (or drop without commit) every task
    /// staged by the session is removed again.
    pub fn edit(&self) -> EditSession<'_> {
        EditSession {
            weak: self.graph_weak(),
            guard: self.shared.state.lock(),
            staged: Vec::new(),
            committed: false,
        }
    }

    pub fn get_task(&self, tid: &str) -> Option<Task> {
        self.shared.state.lock().graph.get(tid).cloned()
    }

    pub fn contains(&self, tid: &str) -> bool {
        self.shared.state.lock().graph.contains(tid)
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().graph.is_empty()
    }

    /// Snapshot of all task handles in insertion order.
    pub fn tasks(&self) -> Vec<Task> {
        self.shared.state.lock().graph.tasks().cloned().collect()
    }

    /// Run a closure against the locked graph (crate-internal queries).
    pub(crate) fn with_graph<R>(&self, f: impl FnOnce(&Graph) -> R) -> R {
        let state = self.shared.state.lock();
        f(&state.graph)
    }

    /// Direct mutable graph access for tests.
    #[cfg(test)]
    pub(crate) fn with_graph_mut_for_tests<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> R {
        let mut state = self.shared.state.lock();
        f(&mut state.graph)
    }

    /// Prerequisites of a task (the tasks it depends upon).
    pub fn dependencies(&self, tid: &str) -> Result<Vec<Task>, WorkflowError> {
        let state = self.shared.state.lock();
        if !state.graph.contains(tid) {
            return Err(WorkflowError::UnknownTask(TaskId::new(tid)));
        }
        Ok(state
            .graph
            .successors(tid)
            .filter_map(|t| state.graph.get(t))
            .cloned()
            .collect())
    }

    /// Dependents of a task (the tasks that depend upon it).
    pub fn dependents(&self, tid: &str) -> Result<Vec<Task>, WorkflowError> {
        let state = self.shared.state.lock();
        if !state.graph.contains(tid) {
            return Err(WorkflowError::UnknownTask(TaskId::new(tid)));
        }
        Ok(state
            .graph
            .predecessors(tid)
            .filter_map(|t| state.graph.get(t))
            .cloned()
            .collect())
    }

    /// Check if a task is ready for execution: status `new` and every
    /// prerequisite complete.
    pub fn is_ready(&self, task: &Task) -> bool {
        task.status() == TaskStatus::New && self.shared.prerequisites_met(task.tid())
    }

    /// Find tasks whose `name` matches the anchored pattern.
    pub fn find(&self, pattern: &str) -> Result<IndexSet<TaskId>, WorkflowError> {
        let mut state = self.shared.state.lock();
        let matches = find_in(&mut state, MatchOn::Name, pattern)?;
        if matches.is_empty() {
            return Err(WorkflowError::NoMatch(pattern.to_string()));
        }
        Ok(matches)
    }

    /// Like [`find`](Workflow::find) but returns `fallback` on no match.
    pub fn find_or(
        &self,
        pattern: &str,
        fallback: IndexSet<TaskId>,
    ) -> Result<IndexSet<TaskId>, WorkflowError> {
        let mut state = self.shared.state.lock();
        let matches = find_in(&mut state, MatchOn::Name, pattern)?;
        Ok(if matches.is_empty() { fallback } else { matches })
    }

    /// Find tasks whose id matches the anchored pattern.
    pub fn find_by_id(&self, pattern: &str) -> Result<IndexSet<TaskId>, WorkflowError> {
        let mut state = self.shared.state.lock();
        let matches = find_in(&mut state, MatchOn::Id, pattern)?;
        if matches.is_empty() {
            return Err(WorkflowError::NoMatch(pattern.to_string()));
        }
        Ok(matches)
    }

    /// Like [`find_by_id`](Workflow::find_by_id) but returns `fallback` on no match.
    pub fn find_by_id_or(
        &self,
        pattern: &str,
        fallback: IndexSet<TaskId>,
    ) -> Result<IndexSet<TaskId>, WorkflowError> {
        let mut state = self.shared.state.lock();
        let matches = find_in(&mut state, MatchOn::Id, pattern)?;
        Ok(if matches.is_empty() { fallback } else { matches })
    }

    /// Find tasks with an `output` value matching the anchored pattern.
    pub fn find_by_output(&self, pattern: &str) -> Result<IndexSet<TaskId>, WorkflowError> {
        let mut state = self.shared.state.lock();
        let matches = find_in(&mut state, MatchOn::Output, pattern)?;
        if matches.is_empty() {
            return Err(WorkflowError::NoMatch(pattern.to_string()));
        }
        Ok(matches)
    }

    /// Like [`find_by_output`](Workflow::find_by_output) but returns `fallback` on no match.
    pub fn find_by_output_or(
        &self,
        pattern: &str,
        fallback: IndexSet<TaskId>,
    ) -> Result<IndexSet<TaskId>, WorkflowError> {
        let mut state = self.shared.state.lock();
        let matches = find_in(&mut state, MatchOn::Output, pattern)?;
        Ok(if matches.is_empty() { fallback } else { matches })
    }

    /// Count tasks by status, in status order, zero counts omitted.
    pub fn status_counts(&self) -> IndexMap<TaskStatus, usize> {
        let state = self.shared.state.lock();
        let mut counts: IndexMap<TaskStatus, usize> = IndexMap::new();
        for status in
            [TaskStatus::New, TaskStatus::Pending, TaskStatus::Complete, TaskStatus::Failed]
        {
            let n = state.graph.tasks().filter(|t| t.status() == status).count();
            if n > 0 {
                counts.insert(status, n);
            }
        }
        counts
    }

    /// True when every task is complete.
    pub fn is_complete(&self) -> bool {
        self.shared.state.lock().graph.tasks().all(|t| t.status() == TaskStatus::Complete)
    }

    /// Return all pending tasks to a new state (picking up an interrupted run).
    pub fn resume(&self) {
        for task in self.tasks() {
            if task.status() == TaskStatus::Pending {
                task.reset();
            }
        }
    }

    /// Reset all pending and failed tasks (re-run after failures).
    pub fn retry(&self) {
        for task in self.tasks() {
            if matches!(task.status(), TaskStatus::Pending | TaskStatus::Failed) {
                task.reset();
            }
        }
    }

    /// Reset every task.
    pub fn reset_all(&self) {
        tracing::warn!("resetting state for all tasks");
        for task in self.tasks() {
            task.reset();
        }
    }

    /// Merge another workflow into this one.
    ///
    /// New task ids are added; ids that collide with an existing *failed*
    /// task replace it; all other collisions keep the existing task. Runs in
    /// a single edit session.
    pub fn compose(&self, other: &Workflow) -> Result<(), WorkflowError> {
        let mut session = self.edit();
        for task in other.tasks() {
            if let Some(existing) = session.get_task(task.tid()) {
                if existing.status() == TaskStatus::Failed {
                    session.remove_task(task.tid());
                    session.add_task(task)?;
                }
            } else {
                session.add_task(task)?;
            }
        }
        session.commit()
    }
}

impl std::fmt::Display for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts = self.status_counts();
        if counts.is_empty() {
            return write!(f, "Workflow(empty)");
        }
        write!(f, "Workflow(")?;
        for (i, (status, n)) in counts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{status}: {n}")?;
        }
        write!(f, ")")
    }
}

impl TaskGraph for Shared {
    fn prerequisites_met(&self, tid: &TaskId) -> bool {
        let state = self.state.lock();
        let result = state
            .graph
            .successors(tid)
            .all(|p| state.graph.get(p).map(|t| t.status() == TaskStatus::Complete).unwrap_or(true));
        result
    }

    fn cascade_failure(&self, tid: &TaskId) {
        let state = self.state.lock();
        let mut visited: IndexSet<TaskId> = IndexSet::new();
        let mut stack: Vec<TaskId> = state.graph.predecessors(tid).cloned().collect();
        while let Some(next) = stack.pop() {
            if !visited.insert(next.clone()) {
                continue;
            }
            if let Some(task) = state.graph.get(&next) {
                task.mark_dependency_failed();
            }
            stack.extend(state.graph.predecessors(&next).cloned());
        }
        if !visited.is_empty() {
            tracing::info!(task = %tid, dependents = visited.len(), "failure cascade");
        }
    }
}

/// Single-writer transaction over a workflow's graph.
///
/// Holds the graph lock for its whole lifetime. Added tasks defer dependency
/// linking until [`commit`](EditSession::commit); dropping the session
/// without committing removes every staged task.
pub struct EditSession<'w> {
    weak: Weak<dyn TaskGraph>,
    guard: MutexGuard<'w, GraphState>,
    staged: Vec<TaskId>,
    committed: bool,
}

impl EditSession<'_> {
    /// Stage a task for addition. Linking happens at commit.
    pub fn add_task(&mut self, task: Task) -> Result<Task, WorkflowError> {
        self.guard.graph.insert(task.clone())?;
        task.attach(self.weak.clone());
        self.staged.push(task.tid().clone());
        Ok(task)
    }

    /// Shortcut: create a task from directives and stage it.
    pub fn new_task(&mut self, directives: Directives) -> Result<Task, WorkflowError> {
        self.add_task(Task::new(directives))
    }

    /// Remove a task inside the session. Removals are not rolled back.
    pub fn remove_task(&mut self, tid: &str) -> Option<Task> {
        self.staged.retain(|s| s.as_str() != tid);
        self.guard.graph.remove(tid)
    }

    pub fn get_task(&self, tid: &str) -> Option<Task> {
        self.guard.graph.get(tid).cloned()
    }

    /// Relink dependencies for every task and finish the session.
    ///
    /// On any linking error all staged tasks are removed before the lock is
    /// released and the error is returned; the rest of the workflow is left
    /// as it was.
    pub fn commit(mut self) -> Result<(), WorkflowError> {
        self.committed = true;
        let result = update(&mut self.guard);
        if let Err(e) = &result {
            tracing::debug!(error = %e, staged = self.staged.len(), "edit session rolled back");
            for tid in &self.staged {
                self.guard.graph.remove(tid);
            }
        }
        result
    }
}

impl Drop for EditSession<'_> {
    fn drop(&mut self) {
        if !self.committed {
            for tid in &self.staged {
                self.guard.graph.remove(tid);
            }
        }
    }
}

/// Recalculate the dependency edges for every task in the graph.
fn update(state: &mut GraphState) -> Result<(), WorkflowError> {
    let tasks: Vec<Task> = state.graph.tasks().cloned().collect();
    for task in &tasks {
        link_dependencies(state, task)?;
    }
    Ok(())
}

/// Add the edges declared by a task's `after`, `before`, and `input`
/// directives.
fn link_dependencies(state: &mut GraphState, task: &Task) -> Result<(), WorkflowError> {
    tracing::debug!(task = %task.tid(), "linking dependencies");

    // after: task ---depends on---> each match
    for pattern in task.directives().after() {
        let matches = require_matches(state, MatchOn::Name, &pattern)?;
        check_self_match(task, "after", &pattern, &matches)?;
        for target in &matches {
            state.graph.add_edge(task.tid(), target)?;
        }
    }

    // before: each match ---depends on---> task
    for pattern in task.directives().before() {
        let matches = require_matches(state, MatchOn::Name, &pattern)?;
        check_self_match(task, "before", &pattern, &matches)?;
        for target in &matches {
            state.graph.add_edge(target, task.tid())?;
        }
    }

    // input: task ---depends on---> each task producing a matching output
    for pattern in task.directives().input() {
        let matches = require_matches(state, MatchOn::Output, &pattern)?;
        check_self_match(task, "input", &pattern, &matches)?;
        for target in &matches {
            state.graph.add_edge(task.tid(), target)?;
        }
    }

    Ok(())
}

fn require_matches(
    state: &mut GraphState,
    on: MatchOn,
    pattern: &str,
) -> Result<IndexSet<TaskId>, WorkflowError> {
    let matches = find_in(state, on, pattern)?;
    if matches.is_empty() {
        return Err(WorkflowError::NoMatch(pattern.to_string()));
    }
    Ok(matches)
}

fn check_self_match(
    task: &Task,
    directive: &'static str,
    pattern: &str,
    matches: &IndexSet<TaskId>,
) -> Result<(), WorkflowError> {
    if matches.contains(task.tid()) {
        return Err(WorkflowError::SelfDependency {
            tid: task.tid().clone(),
            directive,
            pattern: pattern.to_string(),
        });
    }
    Ok(())
}

/// Match an anchored pattern against task names, ids, or outputs.
fn find_in(
    state: &mut GraphState,
    on: MatchOn,
    pattern: &str,
) -> Result<IndexSet<TaskId>, WorkflowError> {
    let regex = compiled(state, pattern)?;
    let mut matches = IndexSet::new();
    for task in state.graph.tasks() {
        let hit = match on {
            MatchOn::Name => task.name().map(|n| regex.is_match(n)).unwrap_or(false),
            MatchOn::Id => regex.is_match(task.tid()),
            MatchOn::Output => task.directives().output().iter().any(|o| regex.is_match(o)),
        };
        if hit {
            matches.insert(task.tid().clone());
        }
    }
    Ok(matches)
}

/// Compile `^pattern$`, caching the result.
fn compiled(state: &mut GraphState, pattern: &str) -> Result<Regex, WorkflowError> {
    if let Some(regex) = state.patterns.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(&format!("^{pattern}$")).map_err(|e| WorkflowError::Pattern {
        pattern: pattern.to_string(),
        source: Box::new(e),
    })?;
    state.patterns.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

/// Build a workflow from a rendered task list (a sequence of directive
/// mappings), in one edit session.
pub fn build_workflow(tasks: Vec<Directives>) -> Result<Workflow, WorkflowError> {
    build(tasks, false)
}

/// Like [`build_workflow`], but rejects directive keys the engine does not
/// understand.
pub fn build_workflow_strict(tasks: Vec<Directives>) -> Result<Workflow, WorkflowError> {
    build(tasks, true)
}

fn build(tasks: Vec<Directives>, strict: bool) -> Result<Workflow, WorkflowError> {
    tracing::info!(tasks = tasks.len(), strict, "building workflow");
    if tasks.is_empty() {
        return Err(WorkflowError::EmptyTaskList);
    }
    let workflow = Workflow::new();
    let mut session = workflow.edit();
    for directives in tasks {
        let task = Task::new(directives);
        if strict {
            if let Some(key) = task.directives().unknown_keys().first() {
                return Err(WorkflowError::UnknownDirective {
                    tid: task.tid().clone(),
                    key: key.to_string(),
                });
            }
        }
        session.add_task(task)?;
    }
    session.commit()?;
    Ok(workflow)
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
