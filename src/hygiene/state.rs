use chrono::Utc;
use serde::Serialize;
use std::path::Path;

use super::{Mode, MoveBatch, PlannedMove, Skipped, STATE_FILES};
use crate::plane::ControlPlane;
use crate::time::{age_days, to_utc, utc_stamp};

/// Status of one well-known state snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StateCheck {
    pub name: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime_iso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_days: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale: Option<bool>,
}

impl StateCheck {
    pub fn is_stale(&self) -> bool {
        self.exists && self.stale == Some(true)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StateFileStats {
    pub stale_days_threshold: u32,
    pub files: Vec<StateCheck>,
}

impl StateFileStats {
    pub fn stale_count(&self) -> usize {
        self.files.iter().filter(|f| f.is_stale()).count()
    }
}

#[derive(Debug, Serialize)]
pub struct ArchiveStateReport {
    pub mode: Mode,
    pub stale_days: u32,
    pub checked: Vec<StateCheck>,
    pub archived: Vec<PlannedMove>,
    pub skipped: Vec<Skipped>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn check_state_files(workspace: &Path, stale_days: u32) -> Vec<StateCheck> {
    let now = Utc::now();
    STATE_FILES
        .iter()
        .map(|name| {
            let path = workspace.join(name);
            let mtime = std::fs::metadata(&path)
                .ok()
                .filter(|m| m.is_file())
                .and_then(|m| m.modified().ok());
            match mtime {
                None => StateCheck {
                    name: name.to_string(),
                    exists: false,
                    ..Default::default()
                },
                Some(mtime) => {
                    let age = age_days(mtime, now);
                    StateCheck {
                        name: name.to_string(),
                        exists: true,
                        path: Some(path.display().to_string()),
                        mtime_iso: Some(to_utc(mtime).to_rfc3339()),
                        age_days: Some(age),
                        stale: Some(age > f64::from(stale_days)),
                    }
                }
            }
        })
        .collect()
}

impl ControlPlane {
    /// Staleness of each well-known snapshot. Read-only.
    pub fn state_file_stats(&self, stale_days: u32) -> StateFileStats {
        StateFileStats {
            stale_days_threshold: stale_days,
            files: check_state_files(&self.paths().workspace, stale_days),
        }
    }

    /// Plan or perform moving stale snapshots to `state_archive/<stamp>_<name>`.
    ///
    /// The stamp is taken once, so every snapshot archived by one call shares it.
    pub fn archive_state(&self, stale_days: u32, mode: Mode) -> ArchiveStateReport {
        let workspace = &self.paths().workspace;
        let archive_dir = workspace.join("state_archive");
        let stamp = utc_stamp(Utc::now());
        let checked = check_state_files(workspace, stale_days);

        let mut batch = MoveBatch::new(mode);
        for check in checked.iter().filter(|c| c.is_stale()) {
            let op = PlannedMove {
                src: workspace.join(&check.name),
                dest: archive_dir.join(format!("{stamp}_{}", check.name)),
                age_days: check.age_days,
                size: None,
            };
            if !batch.submit(op) {
                break;
            }
        }

        ArchiveStateReport {
            mode,
            stale_days,
            checked,
            archived: batch.moved,
            skipped: batch.skipped,
            error: batch.error,
        }
    }
}
