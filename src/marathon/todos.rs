use serde::Serialize;
use std::fmt;

use super::metrics::Metrics;
use crate::benchmark::{BenchmarkReport, RECALL_TARGET};
use crate::time::utc_now_iso;

/// Misses named in the recall TODO.
const MAX_LISTED_MISSES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    P0,
    P1,
    P2,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::P0, Priority::P1, Priority::P2];
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Todo {
    pub priority: Priority,
    pub title: String,
    pub reason: String,
    pub action: String,
    pub generated_at: String,
}

/// Turn one cycle's metrics into a remediation list.
///
/// Mirrors the audit's recommendation rules with a priority attached. The two
/// standing P2 reminders are always present; "Maintain baseline" is added only
/// when nothing at P0 or P1 fired.
pub fn generate_todos(
    benchmark: &BenchmarkReport,
    metrics: &Metrics,
    retention_days: u32,
    stale_days: u32,
) -> Vec<Todo> {
    let now = utc_now_iso();
    let mut todos = Vec::new();
    let add = |priority: Priority, title: &str, reason: String, action: String| Todo {
        priority,
        title: title.to_string(),
        reason,
        action,
        generated_at: now.clone(),
    };

    if !metrics.sources_ok {
        todos.push(add(
            Priority::P0,
            "Fix memory sources to canonical pair",
            "Expected sources are memory+sessions for one retrieval surface.".into(),
            "Set agents.defaults.memorySearch.sources to [\"memory\", \"sessions\"].".into(),
        ));
    }
    if !metrics.session_memory_enabled {
        todos.push(add(
            Priority::P0,
            "Enable session memory indexing",
            "Cross-session recall is reduced when session indexing is off.".into(),
            "Set agents.defaults.memorySearch.experimental.sessionMemory=true.".into(),
        ));
    }
    if !metrics.vec_ok {
        todos.push(add(
            Priority::P1,
            "Restore vector acceleration",
            "BM25-only fallback is active; semantic ranking quality is lower.".into(),
            "Load the sqlite-vec extension in the runtime and verify chunks_vec queries succeed."
                .into(),
        ));
    }
    if metrics.legacy_p9_count > 0 {
        todos.push(add(
            Priority::P0,
            "Quarantine legacy P9 indexes",
            format!(
                "{} legacy index(es) create split-brain retrieval and stale context.",
                metrics.legacy_p9_count
            ),
            "Run `memwarden quarantine-p9 --apply` for the legacy roots.".into(),
        ));
    }
    if metrics.stale_state_count > 0 {
        todos.push(add(
            Priority::P0,
            "Archive stale state snapshots",
            "Stale handoff state files can poison context in new sessions.".into(),
            format!("Run `memwarden archive-state --stale-days {stale_days} --apply`."),
        ));
    }
    if metrics.old_memory_count > 0 {
        todos.push(add(
            Priority::P1,
            "Archive old daily memory files",
            format!(
                "{} active notes are older than the {retention_days}-day retention policy.",
                metrics.old_memory_count
            ),
            format!("Run `memwarden gc --retention-days {retention_days} --apply`."),
        ));
    }
    if metrics.recall_rate < RECALL_TARGET {
        let misses: Vec<&str> = benchmark
            .misses()
            .take(MAX_LISTED_MISSES)
            .map(|r| r.query.as_str())
            .collect();
        todos.push(add(
            Priority::P0,
            "Improve retrieval recall benchmark",
            format!(
                "Recall rate is {:.3}, below {RECALL_TARGET} target.",
                metrics.recall_rate
            ),
            format!(
                "Curate missed topics into MEMORY.md and recent memory notes. Misses: {}",
                misses.join("; ")
            ),
        ));
    }

    let urgent = !todos.is_empty();

    todos.push(add(
        Priority::P2,
        "Weekly memory economics sweep",
        "Memory quality drifts without value-based pruning.".into(),
        "Score entries by reuse signal and archive low-value noise weekly.".into(),
    ));
    todos.push(add(
        Priority::P2,
        "Context poisoning audit",
        "Unverified state artifacts can silently distort prompts.".into(),
        "Tag ingest sources with provenance and reject unsigned digests.".into(),
    ));
    if !urgent {
        todos.push(add(
            Priority::P2,
            "Maintain baseline",
            "No immediate issues detected in this cycle.".into(),
            "Keep audit cadence and monitor health score drift.".into(),
        ));
    }

    todos
}
