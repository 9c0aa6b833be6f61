// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jetstream Contributors

//! Run identity: a per-invocation id plus the environment fingerprint that
//! gets attached to external jobs and persisted run history.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Identifier for a single runner invocation.
///
/// Format: `js<UTC yymmddHHMMSS>-<random suffix>`. Used as the Slurm
/// job-name prefix, so it stays short and shell-safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(SmolStr);

impl RunId {
    const SUFFIX_ALPHABET: [char; 36] = [
        '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h',
        'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    ];

    /// Generate a new run id stamped with the current UTC time.
    pub fn generate() -> Self {
        let stamp = chrono::Utc::now().format("%y%m%d%H%M%S");
        let suffix = nanoid::nanoid!(6, &Self::SUFFIX_ALPHABET);
        Self(SmolStr::new(format!("js{stamp}-{suffix}")))
    }

    /// Rebuild a run id from a persisted string.
    pub fn from_string(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Environment snapshot recorded for every run.
///
/// Serialized into run history and the Slurm comment field so a job on the
/// cluster can be traced back to the invocation that submitted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub id: RunId,
    pub datetime: String,
    pub user: String,
    pub hostname: String,
    pub pid: u32,
    pub args: Vec<String>,
    pub pwd: String,
    pub version: String,
}

impl Fingerprint {
    /// Capture the current process environment.
    pub fn capture() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("LOGNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        let pwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        Self {
            id: RunId::generate(),
            datetime: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            user,
            hostname,
            pid: std::process::id(),
            args: std::env::args().collect(),
            pwd,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
