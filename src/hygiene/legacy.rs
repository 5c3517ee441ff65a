//! Discovery and quarantine of legacy ("P9") memory databases.
//!
//! A legacy database next to the canonical index means two retrieval surfaces can
//! disagree. Discovery matches on filename only (see [`LEGACY_INDEX_NAMES`]); a
//! renamed legacy file is not found.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{Mode, MoveBatch, PlannedMove, Skipped, LEGACY_INDEX_NAMES};
use crate::index::{bytes_to_human, open_read_only};
use crate::plane::ControlPlane;

#[derive(Debug, Serialize)]
pub struct QuarantineReport {
    pub mode: Mode,
    pub quarantined: Vec<PlannedMove>,
    pub skipped: Vec<Skipped>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the audit can tell about one legacy database without modifying it.
#[derive(Debug, Clone, Serialize)]
pub struct LegacyIndexInfo {
    pub path: String,
    pub size_bytes: u64,
    pub size_human: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_documents_table: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LegacyIndexStats {
    pub databases: Vec<LegacyIndexInfo>,
}

/// Scan `workspace`, `workspace/scripts` and then `legacy_roots` for legacy
/// databases, deduplicated by canonical path in scan order.
pub fn discover_legacy_indexes(workspace: &Path, legacy_roots: &[PathBuf]) -> Vec<PathBuf> {
    let roots = [workspace.to_path_buf(), workspace.join("scripts")]
        .into_iter()
        .chain(legacy_roots.iter().cloned());

    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for root in roots {
        if !root.is_dir() {
            continue;
        }
        for name in LEGACY_INDEX_NAMES {
            let candidate = root.join(name);
            if !candidate.is_file() {
                continue;
            }
            let key = candidate
                .canonicalize()
                .unwrap_or_else(|_| candidate.clone());
            if seen.insert(key) {
                found.push(candidate);
            }
        }
    }
    found
}

fn inspect(path: &Path) -> LegacyIndexInfo {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let mut info = LegacyIndexInfo {
        path: path.display().to_string(),
        size_bytes: size,
        size_human: bytes_to_human(size),
        has_documents_table: None,
        documents_count: None,
        error: None,
    };

    let probe = || -> Result<(bool, Option<i64>), crate::error::IndexError> {
        let conn = open_read_only(path)?;
        let has_docs: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'documents'",
            [],
            |row| row.get(0),
        )?;
        let count = if has_docs {
            Some(conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?)
        } else {
            None
        };
        Ok((has_docs, count))
    };

    match probe() {
        Ok((has_docs, count)) => {
            info.has_documents_table = Some(has_docs);
            info.documents_count = count;
        }
        Err(e) => info.error = Some(e.to_string()),
    }
    info
}

impl ControlPlane {
    /// Inspect every discovered legacy database. Read-only.
    pub fn legacy_index_stats(&self, legacy_roots: &[PathBuf]) -> LegacyIndexStats {
        LegacyIndexStats {
            databases: discover_legacy_indexes(&self.paths().workspace, legacy_roots)
                .iter()
                .map(|p| inspect(p))
                .collect(),
        }
    }

    /// Plan or perform moving legacy databases into `memory/p9_quarantine/`.
    pub fn quarantine_p9(&self, legacy_roots: &[PathBuf], mode: Mode) -> QuarantineReport {
        let quarantine_root = self.paths().memory_dir.join("p9_quarantine");
        let mut batch = MoveBatch::new(mode);

        for src in discover_legacy_indexes(&self.paths().workspace, legacy_roots) {
            let Some(name) = src.file_name() else {
                continue;
            };
            let size = std::fs::metadata(&src).map(|m| m.len()).unwrap_or(0);
            let op = PlannedMove {
                dest: quarantine_root.join(name),
                src,
                age_days: None,
                size: Some(bytes_to_human(size)),
            };
            if !batch.submit(op) {
                break;
            }
        }

        QuarantineReport {
            mode,
            quarantined: batch.moved,
            skipped: batch.skipped,
            error: batch.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discovery_scans_workspace_scripts_and_roots() {
        let ws = TempDir::new().unwrap();
        let extra = TempDir::new().unwrap();
        std::fs::create_dir(ws.path().join("scripts")).unwrap();
        std::fs::write(ws.path().join("agni_memory.db"), "").unwrap();
        std::fs::write(ws.path().join("scripts").join("unified_memory.db"), "").unwrap();
        std::fs::write(extra.path().join("agni_memory.db"), "").unwrap();
        std::fs::write(extra.path().join("other.db"), "").unwrap();

        let found = discover_legacy_indexes(ws.path(), &[extra.path().to_path_buf()]);
        assert_eq!(
            found,
            vec![
                ws.path().join("agni_memory.db"),
                ws.path().join("scripts").join("unified_memory.db"),
                extra.path().join("agni_memory.db"),
            ]
        );
    }

    #[test]
    fn discovery_dedups_by_canonical_path() {
        let ws = TempDir::new().unwrap();
        std::fs::write(ws.path().join("agni_memory.db"), "").unwrap();
        // the workspace listed again as a legacy root, through a `..` detour
        let detour = ws.path().join("scripts").join("..");
        std::fs::create_dir(ws.path().join("scripts")).unwrap();

        let found = discover_legacy_indexes(ws.path(), &[detour, ws.path().to_path_buf()]);
        assert_eq!(found, vec![ws.path().join("agni_memory.db")]);
    }

    #[test]
    fn inspect_reports_documents_table() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("agni_memory.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE documents (id INTEGER PRIMARY KEY, body TEXT);
                 INSERT INTO documents (body) VALUES ('a'), ('b');",
            )
            .unwrap();
        }
        let info = inspect(&path);
        assert_eq!(info.has_documents_table, Some(true));
        assert_eq!(info.documents_count, Some(2));
        assert!(info.error.is_none());
    }

    #[test]
    fn inspect_tolerates_non_sqlite_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("unified_memory.db");
        std::fs::write(&path, "definitely not a database, just some bytes here").unwrap();
        let info = inspect(&path);
        assert!(info.error.is_some());
        assert!(info.has_documents_table.is_none());
    }
}
