//! Composite health snapshot of the memory surface.
//!
//! An [`Audit`] joins the OpenClaw memory switches, the canonical index health, and
//! the dry-run view of every hygiene operation, then derives human-readable
//! recommendations from them. Building one never writes to disk.

use serde::Serialize;
use std::path::PathBuf;

use crate::benchmark::{BenchmarkReport, RECALL_TARGET};
use crate::config::MemoryConfigSnapshot;
use crate::hygiene::{LegacyIndexStats, MemoryFileStats, StateFileStats};
use crate::index::DbHealth;
use crate::plane::ControlPlane;
use crate::time::utc_now_iso;

pub const CANONICAL_SYSTEM: &str = "openclaw_memory_main_sqlite";

#[derive(Debug, Clone, Default, Serialize)]
pub struct Audit {
    pub generated_at: String,
    pub canonical_system: String,
    pub memory_config: MemoryConfigSnapshot,
    pub db_health: DbHealth,
    pub memory_files: MemoryFileStats,
    pub state_files: StateFileStats,
    pub legacy_p9: LegacyIndexStats,
    pub recommendations: Vec<String>,
}

impl ControlPlane {
    pub fn audit(&self, retention_days: u32, stale_days: u32, legacy_roots: &[PathBuf]) -> Audit {
        let mut report = Audit {
            generated_at: utc_now_iso(),
            canonical_system: CANONICAL_SYSTEM.into(),
            memory_config: MemoryConfigSnapshot::read(self.paths()),
            db_health: self.index().db_health(),
            memory_files: self.memory_file_stats(retention_days),
            state_files: self.state_file_stats(stale_days),
            legacy_p9: self.legacy_index_stats(legacy_roots),
            recommendations: Vec::new(),
        };
        report.recommendations = recommendations(&report, retention_days);
        tracing::debug!(
            recommendations = report.recommendations.len(),
            index_exists = report.db_health.exists,
            "audit complete"
        );
        report
    }
}

impl Audit {
    pub fn stale_state_count(&self) -> usize {
        self.state_files.stale_count()
    }

    pub fn old_memory_count(&self) -> usize {
        self.memory_files.older_than_retention.len()
    }

    pub fn legacy_count(&self) -> usize {
        self.legacy_p9.databases.len()
    }

    /// Add the recall rule once a benchmark for this audit is known.
    pub fn note_benchmark(&mut self, benchmark: &BenchmarkReport) {
        if benchmark.recall_rate < RECALL_TARGET {
            self.recommendations.push(format!(
                "recall rate {:.3} is below {RECALL_TARGET}; curate missed queries into memory notes",
                benchmark.recall_rate
            ));
        }
    }
}

/// Rules over config, index and workspace state.
pub fn recommendations(audit: &Audit, retention_days: u32) -> Vec<String> {
    let mut recs = Vec::new();
    let cfg = &audit.memory_config;
    let db = &audit.db_health;

    if !db.exists {
        recs.push(format!(
            "canonical index not found at {}; start the agent runtime so it can build one",
            db.db_path
        ));
    } else if let Some(ref e) = db.error {
        recs.push(format!("canonical index unreadable ({e}); check it with sqlite3"));
    }
    if !cfg.has_source("memory") {
        recs.push("enable memory source in agents.defaults.memorySearch.sources".to_string());
    }
    if !cfg.has_source("sessions") {
        recs.push("enable sessions source in agents.defaults.memorySearch.sources".to_string());
    }
    if !cfg.session_memory_enabled {
        recs.push("set agents.defaults.memorySearch.experimental.sessionMemory=true".to_string());
    }
    if db.vec_unavailable() {
        recs.push(
            "vector extension unavailable; memory search will rely on BM25 fallback".to_string(),
        );
    }

    let old = audit.old_memory_count();
    if old > 0 {
        recs.push(format!(
            "archive {old} memory/*.md files older than {retention_days} days"
        ));
    }

    let mut stale: Vec<&str> = audit
        .state_files
        .files
        .iter()
        .filter(|f| f.is_stale())
        .map(|f| f.name.as_str())
        .collect();
    if !stale.is_empty() {
        stale.sort_unstable();
        recs.push(format!("archive stale state snapshots: {}", stale.join(", ")));
    }

    let legacy = audit.legacy_count();
    if legacy > 0 {
        recs.push(format!(
            "quarantine or freeze {legacy} legacy P9 database(s) to avoid split-brain memory"
        ));
    }

    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hygiene::{LegacyIndexInfo, NoteStat, StateCheck};

    fn healthy() -> Audit {
        Audit {
            memory_config: MemoryConfigSnapshot {
                memory_sources: vec!["memory".into(), "sessions".into()],
                session_memory_enabled: true,
                ..Default::default()
            },
            db_health: DbHealth {
                exists: true,
                vec_status: "ok".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn healthy_audit_has_no_recommendations() {
        assert!(recommendations(&healthy(), 30).is_empty());
    }

    #[test]
    fn each_rule_fires() {
        let mut audit = healthy();
        audit.memory_config.memory_sources = vec!["memory".into()];
        audit.memory_config.session_memory_enabled = false;
        audit.db_health.vec_status = "unavailable: no such module: vec0".into();
        audit.memory_files.older_than_retention = vec![NoteStat {
            path: "memory/2025-01-01.md".into(),
            mtime_iso: String::new(),
            age_days: 90.0,
            size_bytes: 10,
        }];
        audit.state_files.files = vec![
            StateCheck {
                name: "WAKE.md".into(),
                exists: true,
                stale: Some(true),
                ..Default::default()
            },
            StateCheck {
                name: "SESSION_HANDOFF.md".into(),
                exists: true,
                stale: Some(true),
                ..Default::default()
            },
        ];
        audit.legacy_p9.databases = vec![LegacyIndexInfo {
            path: "/ws/agni_memory.db".into(),
            size_bytes: 0,
            size_human: "0B".into(),
            has_documents_table: None,
            documents_count: None,
            error: None,
        }];

        let recs = recommendations(&audit, 30);
        assert_eq!(recs.len(), 6);
        assert!(recs[0].starts_with("enable sessions source"));
        assert!(recs.iter().any(|r| r.contains("BM25 fallback")));
        assert!(recs.iter().any(|r| r == "archive 1 memory/*.md files older than 30 days"));
        assert!(recs
            .iter()
            .any(|r| r == "archive stale state snapshots: SESSION_HANDOFF.md, WAKE.md"));
        assert!(recs.iter().any(|r| r.contains("split-brain")));
    }

    #[test]
    fn unknown_vec_status_is_not_flagged() {
        let mut audit = healthy();
        audit.db_health.vec_status = "unknown".into();
        assert!(recommendations(&audit, 30).is_empty());
    }

    #[test]
    fn missing_index_is_recommended_first() {
        let mut audit = healthy();
        audit.db_health = DbHealth {
            db_path: "/home/a/.openclaw/memory/main.sqlite".into(),
            ..Default::default()
        };
        let recs = recommendations(&audit, 30);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].starts_with("canonical index not found at /home/a/.openclaw"));
    }

    #[test]
    fn low_recall_adds_recommendation() {
        let mut audit = healthy();
        let bench = BenchmarkReport {
            queries_total: 4,
            queries_with_hits: 1,
            recall_rate: 0.25,
            rows: Vec::new(),
        };
        audit.note_benchmark(&bench);
        assert_eq!(audit.recommendations.len(), 1);
        assert!(audit.recommendations[0].contains("0.250"));
    }
}
