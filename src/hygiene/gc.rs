//! Archive daily memory notes older than the retention window.
//!
//! Notes are the top-level `memory/*.md` files. An expired note moves to
//! `memory/archive/<YYYY-MM>/<name>`, with the month taken from the note's own
//! mtime so a late run files it under the month it was written.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{Mode, MoveBatch, PlannedMove, Skipped};
use crate::plane::ControlPlane;
use crate::time::{age_days, to_utc};

#[derive(Debug, Serialize)]
pub struct GcReport {
    pub mode: Mode,
    pub retention_days: u32,
    pub moved: Vec<PlannedMove>,
    pub skipped: Vec<Skipped>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One note as reported by the audit.
#[derive(Debug, Clone, Serialize)]
pub struct NoteStat {
    /// Workspace-relative path.
    pub path: String,
    pub mtime_iso: String,
    pub age_days: f64,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryFileStats {
    pub memory_dir: String,
    pub exists: bool,
    /// Sorted oldest first.
    pub active_files: Vec<NoteStat>,
    pub older_than_retention: Vec<NoteStat>,
    pub archive_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct Note {
    path: PathBuf,
    mtime: SystemTime,
    size: u64,
}

/// Top-level `*.md` regular files, sorted by path. Hidden files are not notes.
fn list_notes(memory_dir: &Path) -> io::Result<Vec<Note>> {
    let mut notes = Vec::new();
    for entry in std::fs::read_dir(memory_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') || path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        // follows symlinks, so a link to a note counts; directories never do
        let Ok(meta) = std::fs::metadata(&path) else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        notes.push(Note {
            path,
            mtime: meta.modified()?,
            size: meta.len(),
        });
    }
    notes.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(notes)
}

/// `memory/archive/<YYYY-MM>/` for a note last modified at `mtime`.
pub fn archive_month_dir(memory_dir: &Path, mtime: SystemTime) -> PathBuf {
    memory_dir
        .join("archive")
        .join(to_utc(mtime).format("%Y-%m").to_string())
}

impl ControlPlane {
    /// Plan or perform the archival of notes older than `retention_days`.
    pub fn gc_memory(&self, retention_days: u32, mode: Mode) -> GcReport {
        let memory_dir = &self.paths().memory_dir;
        let mut batch = MoveBatch::new(mode);
        let mut error = None;

        if !memory_dir.is_dir() {
            error = Some(format!("memory dir missing: {}", memory_dir.display()));
        } else {
            match list_notes(memory_dir) {
                Ok(notes) => plan_note_moves(memory_dir, notes, retention_days, Utc::now(), &mut batch),
                Err(e) => error = Some(format!("failed to list {}: {e}", memory_dir.display())),
            }
        }

        GcReport {
            mode,
            retention_days,
            moved: batch.moved,
            skipped: batch.skipped,
            error: error.or(batch.error),
        }
    }

    /// Every active note plus the subset past retention. Read-only.
    pub fn memory_file_stats(&self, retention_days: u32) -> MemoryFileStats {
        let paths = self.paths();
        let mut out = MemoryFileStats {
            memory_dir: paths.memory_dir.display().to_string(),
            exists: paths.memory_dir.is_dir(),
            archive_dir: paths.memory_dir.join("archive").display().to_string(),
            ..Default::default()
        };
        if !out.exists {
            return out;
        }

        let mut notes = match list_notes(&paths.memory_dir) {
            Ok(notes) => notes,
            Err(e) => {
                out.error = Some(e.to_string());
                return out;
            }
        };
        notes.sort_by_key(|n| n.mtime);

        let now = Utc::now();
        for note in notes {
            let stat = NoteStat {
                path: note
                    .path
                    .strip_prefix(&paths.workspace)
                    .unwrap_or(&note.path)
                    .display()
                    .to_string(),
                mtime_iso: to_utc(note.mtime).to_rfc3339(),
                age_days: age_days(note.mtime, now),
                size_bytes: note.size,
            };
            if stat.age_days > f64::from(retention_days) {
                out.older_than_retention.push(stat.clone());
            }
            out.active_files.push(stat);
        }
        out
    }
}

fn plan_note_moves(
    memory_dir: &Path,
    notes: Vec<Note>,
    retention_days: u32,
    now: DateTime<Utc>,
    batch: &mut MoveBatch,
) {
    for note in notes {
        let age = age_days(note.mtime, now);
        if age <= f64::from(retention_days) {
            batch.skip(note.path, "within retention", Some(age));
            continue;
        }
        let Some(name) = note.path.file_name() else {
            continue;
        };
        let dest = archive_month_dir(memory_dir, note.mtime).join(name);
        let op = PlannedMove {
            src: note.path,
            dest,
            age_days: Some(age),
            size: None,
        };
        if !batch.submit(op) {
            break;
        }
    }
}
