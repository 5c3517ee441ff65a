//! Move-only workspace hygiene.
//!
//! Three operations keep the workspace from feeding stale context to the agent
//! runtime: [`gc`] archives old daily notes, [`state`] archives stale handoff
//! snapshots, and [`legacy`] quarantines parallel memory databases. Each runs in
//! [`Mode::DryRun`] (report only, zero writes) or [`Mode::Apply`]. Nothing is ever
//! deleted and nothing is overwritten: a move whose destination already exists is
//! skipped, and a failed move halts the batch with `error` set.

pub mod gc;
pub mod legacy;
pub mod state;

use serde::Serialize;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

pub use gc::{GcReport, MemoryFileStats, NoteStat};
pub use legacy::{LegacyIndexInfo, LegacyIndexStats, QuarantineReport};
pub use state::{ArchiveStateReport, StateCheck, StateFileStats};

/// Snapshot files the agent runtime leaves at the workspace root between sessions.
pub const STATE_FILES: [&str; 3] = ["WAKE.md", "SESSION_HANDOFF.md", "LAST_ACTIVE_SPAN.md"];

/// Filenames of the legacy ("P9") memory databases. Matched by name only.
pub const LEGACY_INDEX_NAMES: [&str; 2] = ["agni_memory.db", "unified_memory.db"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    DryRun,
    Apply,
}

impl Mode {
    pub fn from_apply(apply: bool) -> Self {
        if apply {
            Self::Apply
        } else {
            Self::DryRun
        }
    }
}

/// A move that was planned (dry run) or executed (apply).
#[derive(Debug, Clone, Serialize)]
pub struct PlannedMove {
    pub src: PathBuf,
    pub dest: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_days: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_days: Option<f64>,
}

/// Accumulates the moves of one operation and stops at the first failure.
///
/// A destination already claimed earlier in the batch counts as existing, so a
/// dry run reports the same collisions an apply would hit.
pub(crate) struct MoveBatch {
    mode: Mode,
    claimed: HashSet<PathBuf>,
    pub moved: Vec<PlannedMove>,
    pub skipped: Vec<Skipped>,
    pub error: Option<String>,
}

impl MoveBatch {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            claimed: HashSet::new(),
            moved: Vec::new(),
            skipped: Vec::new(),
            error: None,
        }
    }

    pub fn skip(&mut self, path: impl Into<PathBuf>, reason: impl Into<String>, age_days: Option<f64>) {
        self.skipped.push(Skipped {
            path: path.into(),
            reason: reason.into(),
            age_days,
        });
    }

    /// Plan or perform one move. Returns `false` once the batch has halted.
    pub fn submit(&mut self, op: PlannedMove) -> bool {
        if self.error.is_some() {
            return false;
        }

        if op.dest.exists() || self.claimed.contains(&op.dest) {
            tracing::warn!(src = %op.src.display(), dest = %op.dest.display(), "destination exists, skipping");
            self.skip(op.src, "destination exists", op.age_days);
            return true;
        }

        if self.mode == Mode::Apply {
            if let Err(e) = move_path(&op.src, &op.dest) {
                tracing::error!(src = %op.src.display(), dest = %op.dest.display(), error = %e, "move failed, halting batch");
                self.error = Some(format!(
                    "failed to move {} -> {}: {e}",
                    op.src.display(),
                    op.dest.display()
                ));
                return false;
            }
            tracing::info!(src = %op.src.display(), dest = %op.dest.display(), "moved");
        }

        self.claimed.insert(op.dest.clone());
        self.moved.push(op);
        true
    }
}

/// Rename `src` to `dest`, creating parent directories. Falls back to
/// copy-then-remove when the two paths are on different filesystems.
pub(crate) fn move_path(src: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            std::fs::copy(src, dest)?;
            std::fs::remove_file(src)
        }
        Err(e) => Err(e),
    }
}
