// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Local backend: executes tasks as subprocesses on this machine, gated by
//! a CPU permit pool.

use crate::backend::{Backend, BackendError, RunContext, SpawnOutcome};
use crate::paths;
use async_trait::async_trait;
use jet_core::{Task, CANCELLED_RC};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;

/// Upper bound on a guessed permit pool, so a process limit of "unlimited"
/// does not turn into an unbounded semaphore.
const MAX_GUESSED_CONCURRENCY: usize = 4096;

const FALLBACK_CONCURRENCY: usize = 500;

/// Tunables for [`LocalBackend`].
#[derive(Debug, Clone)]
pub struct LocalSettings {
    /// Total CPU permits. `None` means guess from the system process limit.
    pub cpus: Option<usize>,
    /// How long to wait before retrying when the OS refuses new processes.
    pub blocking_io_penalty: Duration,
    /// Shell used to run task commands.
    pub shell: PathBuf,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            cpus: None,
            blocking_io_penalty: Duration::from_secs(30),
            shell: PathBuf::from("/bin/bash"),
        }
    }
}

/// Executes tasks as local shell subprocesses.
///
/// A task requesting `k` CPUs holds `k` permits for its whole lifetime, so
/// the machine never runs more than `capacity` permits worth of tasks.
pub struct LocalBackend {
    ctx: RunContext,
    settings: LocalSettings,
    capacity: usize,
    slots: Arc<Semaphore>,
}

impl LocalBackend {
    pub fn new(ctx: RunContext, settings: LocalSettings) -> Self {
        let capacity = settings.cpus.unwrap_or_else(guess_concurrency);
        tracing::info!(capacity, shell = %settings.shell.display(), "local backend initialized");
        Self { ctx, settings, capacity, slots: Arc::new(Semaphore::new(capacity)) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn spawn(&self, task: Task) -> Result<SpawnOutcome, BackendError> {
        let Some(cmd) = task.directives().cmd().map(str::to_string) else {
            task.complete(0)?;
            return Ok(SpawnOutcome::Finished);
        };

        let requested = task.directives().cpus().max(1);
        if requested > self.capacity as u64 {
            return Err(BackendError::ResourceRequest { requested, capacity: self.capacity });
        }

        let Ok(_permits) = self.slots.acquire_many(requested as u32).await else {
            task.annotate("err", "backend shut down before spawn");
            task.fail(CANCELLED_RC)?;
            return Ok(SpawnOutcome::Finished);
        };

        tracing::debug!(task = %task.tid(), cpus = requested, "spawning subprocess");

        let stdout = paths::stdout_path(&task);
        let stderr = paths::stderr_path(&task);
        paths::ensure_parent(&stdout)?;
        paths::ensure_parent(&stderr)?;

        let mut command = Command::new(&self.settings.shell);
        command.arg("-c").arg(&cmd);
        command.stdout(Stdio::from(std::fs::File::create(&stdout)?));
        if stderr == stdout {
            command.stderr(Stdio::from(std::fs::File::options().append(true).open(&stdout)?));
        } else {
            command.stderr(Stdio::from(std::fs::File::create(&stderr)?));
        }
        match paths::stdin_path(&task) {
            Some(path) => command.stdin(Stdio::from(std::fs::File::open(path)?)),
            None => command.stdin(Stdio::null()),
        };
        command.kill_on_drop(true);

        let mut child = loop {
            match command.spawn() {
                Ok(child) => break child,
                Err(e) if is_spawn_transient(&e) => {
                    tracing::warn!(
                        task = %task.tid(),
                        error = %e,
                        retry_in = ?self.settings.blocking_io_penalty,
                        "os refused subprocess, retrying"
                    );
                    tokio::select! {
                        _ = self.ctx.cancelled() => {
                            task.annotate("err", "runner cancelled backend spawn");
                            task.fail(CANCELLED_RC)?;
                            return Ok(SpawnOutcome::Finished);
                        }
                        _ = tokio::time::sleep(self.settings.blocking_io_penalty) => {}
                    }
                }
                Err(e) => return Err(e.into()),
            }
        };

        tokio::select! {
            _ = self.ctx.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                task.annotate("err", "runner cancelled backend spawn");
                task.fail(CANCELLED_RC)?;
                Ok(SpawnOutcome::Finished)
            }
            status = child.wait() => {
                let rc = exit_code(&status?);
                if rc == 0 {
                    task.complete(0)?;
                } else {
                    task.fail(rc)?;
                }
                Ok(SpawnOutcome::Finished)
            }
        }
    }

    fn log_status(&self) {
        tracing::info!(
            capacity = self.capacity,
            available = self.slots.available_permits(),
            "local backend status"
        );
    }
}

/// Map an exit status to a returncode; signal exits become negative codes.
fn exit_code(status: &ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.code().or_else(|| status.signal().map(|s| -s)).unwrap_or(-1)
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(-1)
    }
}

/// Transient "try again" spawn failures: the process table is momentarily
/// full, not broken.
fn is_spawn_transient(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == Some(nix::errno::Errno::EAGAIN as i32)
}

/// Estimate a sane number of concurrent task CPUs: a quarter of the soft
/// process limit, at least the CPU count.
pub fn guess_concurrency() -> usize {
    use nix::sys::resource::{getrlimit, Resource};

    let quarter = match getrlimit(Resource::RLIMIT_NPROC) {
        Ok((soft, _hard)) => {
            let quarter = (soft / 4) as usize;
            if quarter == 0 {
                FALLBACK_CONCURRENCY
            } else {
                quarter
            }
        }
        Err(_) => FALLBACK_CONCURRENCY,
    };
    quarter.clamp(num_cpus::get(), MAX_GUESSED_CONCURRENCY)
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
