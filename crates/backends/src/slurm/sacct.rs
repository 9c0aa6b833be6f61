// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! sacct output parsing and Slurm state taxonomy.
//!
//! sacct rows arrive as delimiter-separated tables. Job ids follow
//! `<jobid>[_<arraystepid>][.<stepid>]`; steps and array steps are grouped
//! under their parent job's record. The data restrictions on job fields are
//! loose, so an unparseable row is skipped with a warning, never fatal.

use crate::backend::BackendError;
use indexmap::IndexMap;
use regex::Regex;

/// Field separator passed to `sacct --delimiter` (unit separator, unlikely
/// to appear in job data).
pub const SACCT_DELIMITER: char = '\u{1f}';

/// Grammar for the `JobID` column.
pub const JOB_ID_PATTERN: &str =
    r"^(?P<jobid>\d+)(_(?P<arraystepid>\d+))?(\.(?P<stepid>\d+|batch|extern))?$";

/// States in which Slurm is still working on the job.
pub const ACTIVE_STATES: &[&str] =
    &["CONFIGURING", "COMPLETING", "PENDING", "RUNNING", "SPECIAL_EXIT"];

/// States in which the job will never run again.
pub const INACTIVE_STATES: &[&str] = &[
    "BOOT_FAIL",
    "CANCELLED",
    "COMPLETED",
    "FAILED",
    "NODE_FAIL",
    "PREEMPTED",
    "REVOKED",
    "STOPPED",
    "SUSPENDED",
    "TIMEOUT",
];

/// Aggregated sacct record for one job: top-level fields plus any steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobRecord {
    pub fields: IndexMap<String, String>,
    pub steps: Vec<IndexMap<String, String>>,
}

impl JobRecord {
    pub fn state(&self) -> Option<&str> {
        self.fields.get("State").map(String::as_str)
    }

    /// The job reached a state in the inactive set.
    pub fn is_done(&self) -> bool {
        self.state().map(|s| INACTIVE_STATES.contains(&s)).unwrap_or(false)
    }

    /// The job finished with success.
    pub fn is_ok(&self) -> bool {
        self.state() == Some("COMPLETED")
    }

    /// Standard integer exit code from Slurm's `<rc>:<signal>` derived exit
    /// code, falling back to 0 on success / 1 on failure when unparseable.
    pub fn returncode(&self) -> i32 {
        self.fields
            .get("ExitCode")
            .and_then(|e| e.split(':').next())
            .and_then(|rc| rc.parse().ok())
            .unwrap_or(if self.is_ok() { 0 } else { 1 })
    }
}

/// Parse sacct stdout into a map of job id -> aggregated record.
pub fn parse_sacct(data: &str) -> Result<IndexMap<String, JobRecord>, BackendError> {
    let mut jobs: IndexMap<String, JobRecord> = IndexMap::new();
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return Ok(jobs);
    }

    let id_pattern = Regex::new(JOB_ID_PATTERN)
        .map_err(|e| BackendError::Slurm(format!("job id pattern: {e}")))?;

    let mut lines = trimmed.lines();
    let header: Vec<&str> = match lines.next() {
        Some(line) => line.trim().split(SACCT_DELIMITER).collect(),
        None => return Ok(jobs),
    };

    for line in lines {
        let row: IndexMap<String, String> = header
            .iter()
            .zip(line.trim().split(SACCT_DELIMITER))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let Some(captures) = row.get("JobID").and_then(|id| id_pattern.captures(id)) else {
            tracing::warn!(line, "unable to parse sacct row, skipping");
            continue;
        };

        let jid = match captures.name("jobid") {
            Some(m) => m.as_str().to_string(),
            None => continue,
        };
        let is_step =
            captures.name("stepid").is_some() || captures.name("arraystepid").is_some();

        let record = jobs.entry(jid).or_default();
        if is_step {
            record.steps.push(row);
        } else {
            record.fields.extend(row);
        }
    }

    tracing::debug!(jobs = jobs.len(), "parsed sacct data");
    Ok(jobs)
}

#[cfg(test)]
#[path = "sacct_tests.rs"]
mod tests;
