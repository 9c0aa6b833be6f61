// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Slurm backend: submits tasks as batch jobs and tracks them through a
//! periodic sacct polling loop.
//!
//! The spawn side registers a submitted job in the tracking map and waits on
//! a completion channel; the [`SlurmBackend::job_monitor`] coroutine polls
//! sacct, pushes finished records through those channels, and issues a
//! blanket `scancel` for anything still outstanding when the run shuts down.

pub mod sacct;

use crate::backend::{Backend, BackendError, RunContext, SpawnOutcome};
use crate::paths;
use async_trait::async_trait;
use indexmap::IndexMap;
use jet_core::{Task, CANCELLED_RC};
use parking_lot::Mutex;
use sacct::JobRecord;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;

/// The Slurm comment field caps out at 1k; longer annotations are replaced
/// with an error stub.
const MAX_COMMENT_BYTES: usize = 1024;

/// Penalty sleep after a rejected submission before asking for a resubmit.
const SUBMISSION_PENALTY: Duration = Duration::from_secs(10);

/// Tunables for [`SlurmBackend`].
#[derive(Debug, Clone)]
pub struct SlurmSettings {
    /// How often the monitor asks sacct for job updates.
    pub sacct_frequency: Duration,
    /// Pause before each sbatch invocation (sbatch misbehaves when called
    /// too frequently).
    pub sbatch_delay: Duration,
    /// Maximum number of jobs outstanding on the cluster at once.
    pub max_concurrency: usize,
    /// Path to the sbatch binary.
    pub sbatch: PathBuf,
    /// Maximum job ids per sacct invocation.
    pub chunk_size: usize,
}

impl Default for SlurmSettings {
    fn default() -> Self {
        Self {
            sacct_frequency: Duration::from_secs(60),
            sbatch_delay: Duration::from_millis(100),
            max_concurrency: 9001,
            sbatch: PathBuf::from("sbatch"),
            chunk_size: 1000,
        }
    }
}

struct TrackedJob {
    done: oneshot::Sender<JobRecord>,
}

/// Submits tasks to a Slurm batch cluster.
pub struct SlurmBackend {
    ctx: RunContext,
    settings: SlurmSettings,
    seq: AtomicU64,
    jobs: Arc<Mutex<IndexMap<String, TrackedJob>>>,
    slots: Arc<Semaphore>,
}

impl SlurmBackend {
    pub fn new(ctx: RunContext, settings: SlurmSettings) -> Self {
        tracing::info!(
            max_concurrency = settings.max_concurrency,
            sacct_frequency = ?settings.sacct_frequency,
            "slurm backend initialized"
        );
        let slots = Arc::new(Semaphore::new(settings.max_concurrency));
        Self { ctx, settings, seq: AtomicU64::new(0), jobs: Arc::new(Mutex::new(IndexMap::new())), slots }
    }

    /// Check that the configured sbatch binary responds.
    pub async fn check_available(&self) -> Result<(), BackendError> {
        let output = Command::new(&self.settings.sbatch).arg("--version").output().await?;
        if !output.status.success() {
            return Err(BackendError::Slurm(format!(
                "{} --version exited {}",
                self.settings.sbatch.display(),
                output.status
            )));
        }
        Ok(())
    }

    /// Slurm job name for the next submission: `<run_id>.<seq>`.
    fn job_name(&self) -> String {
        format!("{}.{}", self.ctx.run_id(), self.seq.fetch_add(1, Ordering::Relaxed))
    }

    /// JSON comment attached to each job: run id plus task identity, with an
    /// error stub when the blob exceeds the comment field limit.
    fn job_comment(&self, task: &Task) -> String {
        let comment = serde_json::json!({
            "run": self.ctx.run_id().as_str(),
            "task": { "tid": task.tid().as_str(), "tags": task.directives().tags() },
        });
        let text = comment.to_string();
        if text.len() > MAX_COMMENT_BYTES {
            serde_json::json!({ "tid": task.tid().as_str(), "err": "Job comment too long!" })
                .to_string()
        } else {
            text
        }
    }

    async fn submit(&self, task: &Task) -> Result<SubmitResult, BackendError> {
        let (argv, script) = sbatch_argv(&self.settings, &self.job_name(), &self.job_comment(task), task)?;

        tracing::debug!(task = %task.tid(), argv = ?argv, "launching sbatch");
        let output = Command::new(&argv[0]).args(&argv[1..]).output().await?;
        drop(script);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(task = %task.tid(), %stderr, "sbatch rejected submission");
            return Ok(SubmitResult::Rejected);
        }

        // --parsable prints "<jobid>[;<cluster>]"
        let stdout = String::from_utf8_lossy(&output.stdout);
        let jid = stdout.trim().split(';').next().unwrap_or("").to_string();
        if jid.is_empty() {
            tracing::warn!(task = %task.tid(), "sbatch produced no job id");
            return Ok(SubmitResult::Rejected);
        }
        Ok(SubmitResult::Submitted { jid, argv })
    }

    async fn scancel(&self, job_ids: &[String]) {
        if job_ids.is_empty() {
            return;
        }
        tracing::info!(jobs = job_ids.len(), "launching scancel");
        match Command::new("scancel").args(job_ids).output().await {
            Ok(output) if !output.status.success() => {
                tracing::warn!(status = %output.status, "scancel failed");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "scancel did not launch"),
        }
    }

    async fn sacct_request(
        &self,
        job_ids: &[String],
    ) -> Result<IndexMap<String, JobRecord>, BackendError> {
        let mut cmd = Command::new("sacct");
        cmd.arg("-P")
            .arg("--format")
            .arg("all")
            .arg(format!("--delimiter={}", sacct::SACCT_DELIMITER));
        for jid in job_ids {
            cmd.arg("-j").arg(jid);
        }

        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(BackendError::Slurm(format!("sacct exited {}", output.status)));
        }
        sacct::parse_sacct(&String::from_utf8_lossy(&output.stdout))
    }

    /// Background polling loop: every `sacct_frequency`, update outstanding
    /// jobs from sacct and complete the ones that went inactive. On shutdown
    /// every job still outstanding is scancel'd.
    pub async fn job_monitor(self: Arc<Self>) {
        tracing::info!("slurm job monitor started");

        loop {
            tokio::select! {
                _ = self.ctx.cancelled() => break,
                _ = tokio::time::sleep(self.settings.sacct_frequency) => {}
            }

            let ids: Vec<String> = self.jobs.lock().keys().cloned().collect();
            if ids.is_empty() {
                tracing::debug!("no current jobs to check");
                continue;
            }

            tracing::debug!(jobs = ids.len(), "requesting sacct updates");
            let mut data: IndexMap<String, JobRecord> = IndexMap::new();
            for chunk in ids.chunks(self.settings.chunk_size) {
                match self.sacct_request(chunk).await {
                    Ok(chunk_data) => data.extend(chunk_data),
                    Err(e) => tracing::warn!(error = %e, "sacct request failed"),
                }
            }

            let mut finished: Vec<(oneshot::Sender<JobRecord>, JobRecord)> = Vec::new();
            {
                let mut jobs = self.jobs.lock();
                for (jid, record) in data {
                    if record.is_done() {
                        if let Some(tracked) = jobs.shift_remove(&jid) {
                            finished.push((tracked.done, record));
                        }
                    }
                }
            }
            for (done, record) in finished {
                let _ = done.send(record);
            }
        }

        let outstanding: Vec<String> = {
            let mut jobs = self.jobs.lock();
            jobs.drain(..).map(|(jid, _)| jid).collect()
        };
        if !outstanding.is_empty() {
            tracing::info!(jobs = outstanding.len(), "requesting scancel for outstanding jobs");
            self.scancel(&outstanding).await;
        }
        tracing::info!("slurm job monitor stopped");
    }
}

enum SubmitResult {
    Submitted { jid: String, argv: Vec<String> },
    Rejected,
}

#[async_trait]
impl Backend for SlurmBackend {
    async fn spawn(&self, task: Task) -> Result<SpawnOutcome, BackendError> {
        if task.directives().cmd().is_none() {
            task.complete(0)?;
            return Ok(SpawnOutcome::Finished);
        }

        let Ok(_slot) = self.slots.acquire().await else {
            task.annotate("err", "backend shut down before submit");
            task.fail(CANCELLED_RC)?;
            return Ok(SpawnOutcome::Finished);
        };

        tokio::select! {
            _ = self.ctx.cancelled() => {
                task.annotate("err", "runner cancelled backend spawn");
                task.fail(CANCELLED_RC)?;
                return Ok(SpawnOutcome::Finished);
            }
            _ = tokio::time::sleep(self.settings.sbatch_delay) => {}
        }

        let (jid, argv) = match self.submit(&task).await? {
            SubmitResult::Submitted { jid, argv } => (jid, argv),
            SubmitResult::Rejected => {
                tokio::select! {
                    _ = self.ctx.cancelled() => {
                        task.annotate("err", "runner cancelled backend spawn");
                        task.fail(CANCELLED_RC)?;
                        return Ok(SpawnOutcome::Finished);
                    }
                    _ = tokio::time::sleep(SUBMISSION_PENALTY) => {}
                }
                return Ok(SpawnOutcome::Resubmit);
            }
        };

        tracing::info!(task = %task.tid(), job = %jid, "submitted batch job");
        task.annotate("slurm_job_id", jid.clone());
        task.annotate("slurm_args", serde_json::json!(argv));

        let (done_tx, done_rx) = oneshot::channel();
        self.jobs.lock().insert(jid.clone(), TrackedJob { done: done_tx });

        tokio::select! {
            _ = self.ctx.cancelled() => {
                self.jobs.lock().shift_remove(&jid);
                self.scancel(std::slice::from_ref(&jid)).await;
                task.annotate("err", "runner cancelled backend spawn");
                task.fail(CANCELLED_RC)?;
                Ok(SpawnOutcome::Finished)
            }
            record = done_rx => {
                match record {
                    Ok(record) => {
                        if record.is_ok() {
                            task.complete(record.returncode())?;
                        } else {
                            task.annotate("slurm", serde_json::json!(record.fields));
                            task.fail(record.returncode())?;
                        }
                    }
                    Err(_) => {
                        // monitor tore down and dropped the channel
                        task.annotate("err", "job monitor stopped before completion");
                        task.fail(CANCELLED_RC)?;
                    }
                }
                Ok(SpawnOutcome::Finished)
            }
        }
    }

    fn coroutines(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(Arc::clone(&self).job_monitor())]
    }

    fn log_status(&self) {
        tracing::info!(
            jobs = self.jobs.lock().len(),
            slots = self.slots.available_permits(),
            "slurm backend status"
        );
    }
}

/// Build the sbatch argv and the temp script file it submits.
///
/// The script holds the task's `cmd`, prefixed with a bash shebang unless it
/// already is a script. The temp file must stay alive until sbatch has read
/// it, so the handle is returned to the caller.
pub(crate) fn sbatch_argv(
    settings: &SlurmSettings,
    job_name: &str,
    comment: &str,
    task: &Task,
) -> Result<(Vec<String>, tempfile::NamedTempFile), BackendError> {
    let directives = task.directives();
    let mut argv = vec![
        settings.sbatch.display().to_string(),
        "--parsable".to_string(),
        "-J".to_string(),
        job_name.to_string(),
        "--comment".to_string(),
        comment.to_string(),
    ];

    if let Some(stdin) = directives.stdin() {
        argv.push("--input".to_string());
        argv.push(stdin.to_string());
    }
    argv.push("-o".to_string());
    argv.push(paths::stdout_path(task).display().to_string());
    argv.push("-e".to_string());
    argv.push(paths::stderr_path(task).display().to_string());

    let cpus = directives.cpus();
    if cpus > 0 {
        argv.push("-c".to_string());
        argv.push(cpus.to_string());
    }
    if let Some(mem) = directives.mem() {
        argv.push("--mem".to_string());
        argv.push(mem);
    }
    if let Some(walltime) = directives.walltime() {
        argv.push("-t".to_string());
        argv.push(walltime);
    }
    argv.extend(directives.sbatch_args());

    let cmd = directives.cmd().unwrap_or_default();
    let script = if cmd.starts_with("#!") {
        cmd.to_string()
    } else {
        format!("#!/bin/bash\n{cmd}")
    };
    let file = tempfile::NamedTempFile::new()?;
    std::fs::write(file.path(), script)?;
    argv.push(file.path().display().to_string());

    Ok((argv, file))
}

#[cfg(test)]
#[path = "slurm_tests.rs"]
mod tests;
