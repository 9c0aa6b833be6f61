// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Task directives: the free-form mapping that describes what a task does.
//!
//! Directives are produced by template rendering (a collaborator) and consumed
//! by the workflow linker and the backends. Most keys are optional and several
//! accept either a scalar or a sequence; [`coerce_sequence`] normalizes those
//! uniformly.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Directive keys the engine and its backends understand. Anything else is
/// rejected when a workflow is built in strict mode.
pub const KNOWN_DIRECTIVES: &[&str] = &[
    "name",
    "cmd",
    "stdin",
    "stdout",
    "stderr",
    "cpus",
    "mem",
    "walltime",
    "tags",
    "before",
    "after",
    "input",
    "input-re",
    "output",
    "sbatch_args",
    "cloud-args",
];

/// Ordered free-form mapping of task directives.
///
/// Typed accessors cover the keys the core understands; everything else is
/// carried through untouched so backends can read their own pass-throughs
/// (`sbatch_args`, `cloud-args`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Directives(IndexMap<String, Value>);

impl Directives {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw access to a directive value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a directive value, replacing any existing value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// The user-supplied task name, if any.
    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    /// The shell command. Absent means the task completes immediately.
    pub fn cmd(&self) -> Option<&str> {
        self.get_str("cmd")
    }

    /// Path to redirect into the task's stdin.
    pub fn stdin(&self) -> Option<&str> {
        self.get_str("stdin")
    }

    /// Path for the task's stdout.
    pub fn stdout(&self) -> Option<&str> {
        self.get_str("stdout")
    }

    /// Path for the task's stderr.
    pub fn stderr(&self) -> Option<&str> {
        self.get_str("stderr")
    }

    /// Number of CPUs requested. Zero when absent or not an integer.
    pub fn cpus(&self) -> u64 {
        self.0.get("cpus").and_then(Value::as_u64).unwrap_or(0)
    }

    /// Memory request, coerced to a string (`4G`, `16000`, ...).
    pub fn mem(&self) -> Option<String> {
        self.0.get("mem").map(scalar_to_string)
    }

    /// Walltime request, coerced to a string.
    pub fn walltime(&self) -> Option<String> {
        self.0.get("walltime").map(scalar_to_string)
    }

    /// Tags attached to the task. A bare string is split on whitespace.
    pub fn tags(&self) -> Vec<String> {
        match self.0.get("tags") {
            Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
            Some(other) => coerce_sequence(other),
            None => Vec::new(),
        }
    }

    /// Patterns this task must run after (matched against task names).
    pub fn after(&self) -> Vec<String> {
        self.0.get("after").map(coerce_sequence).unwrap_or_default()
    }

    /// Patterns this task must run before (matched against task names).
    pub fn before(&self) -> Vec<String> {
        self.0.get("before").map(coerce_sequence).unwrap_or_default()
    }

    /// Input identifiers, matched against other tasks' `output` values.
    /// Accepts both `input` and the regex-flavored `input-re` key.
    pub fn input(&self) -> Vec<String> {
        let mut values = self.0.get("input").map(coerce_sequence).unwrap_or_default();
        if let Some(re) = self.0.get("input-re") {
            values.extend(coerce_sequence(re));
        }
        values
    }

    /// Output identifiers other tasks can depend on via `input`.
    pub fn output(&self) -> Vec<String> {
        self.0.get("output").map(coerce_sequence).unwrap_or_default()
    }

    /// Extra arguments passed through to sbatch. A bare string is kept as a
    /// single argument.
    pub fn sbatch_args(&self) -> Vec<String> {
        self.0.get("sbatch_args").map(coerce_sequence).unwrap_or_default()
    }

    /// Keys not in [`KNOWN_DIRECTIVES`], in insertion order.
    pub fn unknown_keys(&self) -> Vec<&str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|k| !KNOWN_DIRECTIVES.contains(k))
            .collect()
    }
}

impl From<IndexMap<String, Value>> for Directives {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Directives {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Coerce a scalar-or-sequence directive value to a list of strings.
///
/// Scalars become a one-element list; sequence items are stringified without
/// JSON quoting.
pub fn coerce_sequence(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(scalar_to_string).collect(),
        other => vec![scalar_to_string(other)],
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "directives_tests.rs"]
mod tests;
