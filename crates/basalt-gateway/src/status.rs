//! §7's `/health`-equivalent status surface. There is no HTTP server in this
//! process (§9's single background-bot architecture), so the running
//! instance periodically writes a small snapshot to `status.json` under the
//! workspace root, and the `status` CLI subcommand just reads it back.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use basalt_core::config::PROTOCOL_VERSION;
use basalt_core::fs::{read_json_or_default, write_json_atomic};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatusSnapshot {
    pub version: String,
    pub started_at: String,
    pub uptime_secs: u64,
    pub messages_total: u64,
    pub errors_total: u64,
    /// `true` once the first turn has completed successfully; lets `status`
    /// distinguish "just started, nothing has run yet" from "actually down".
    pub warmed_up: bool,
}

/// In-process counters `run.rs` updates as turns complete; `snapshot()`
/// turns them into the `StatusSnapshot` written to disk.
pub struct StatusTracker {
    started_at: Instant,
    started_at_wall: chrono::DateTime<chrono::Utc>,
    messages_total: AtomicU64,
    errors_total: AtomicU64,
    warmed_up: std::sync::atomic::AtomicBool,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            started_at_wall: chrono::Utc::now(),
            messages_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            warmed_up: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn record_message(&self) {
        self.messages_total.fetch_add(1, Ordering::Relaxed);
        self.warmed_up.store(true, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            version: PROTOCOL_VERSION.to_string(),
            started_at: self.started_at_wall.to_rfc3339(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            messages_total: self.messages_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            warmed_up: self.warmed_up.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

pub fn status_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join("status.json")
}

pub fn write_status(workspace_root: &Path, snapshot: &StatusSnapshot) -> basalt_core::Result<()> {
    write_json_atomic(&status_path(workspace_root), snapshot)
}

pub fn read_status(workspace_root: &Path) -> basalt_core::Result<StatusSnapshot> {
    read_json_or_default(&status_path(workspace_root))
}
