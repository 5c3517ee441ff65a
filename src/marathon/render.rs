//! Markdown artifacts rewritten at the workspace root after every cycle.

use std::path::Path;

use super::metrics::Metrics;
use super::todos::{Priority, Todo};
use super::SummaryRow;
use crate::benchmark::{BenchmarkReport, RECALL_TARGET};
use crate::time::utc_now_iso;

pub const TODO_FILE: &str = "MEMORY_MARATHON_TODO.md";
pub const STATUS_FILE: &str = "MEMORY_MARATHON_STATUS.md";
pub const PLAN_FILE: &str = "MEMORY_MARATHON_PLAN.md";

/// Cycles shown in the status history.
pub const HISTORY_ROWS: usize = 10;

/// Identifies the cycle an artifact was rendered for.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub workspace: &'a Path,
    pub run_id: &'a str,
    pub cycle: usize,
}

impl RenderContext<'_> {
    fn header(&self, title: &str, stamp_label: &str, cycle_label: &str) -> Vec<String> {
        vec![
            format!("# {title}"),
            String::new(),
            format!("- {stamp_label}: {}", utc_now_iso()),
            format!("- Workspace: `{}`", self.workspace.display()),
            format!("- Run ID: `{}`", self.run_id),
            format!("- {cycle_label}: `{}`", self.cycle),
        ]
    }
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn recall_line(benchmark: &BenchmarkReport) -> String {
    format!(
        "`{}/{} = {}`",
        benchmark.queries_with_hits, benchmark.queries_total, benchmark.recall_rate
    )
}

pub fn render_todo(
    ctx: &RenderContext<'_>,
    metrics: &Metrics,
    benchmark: &BenchmarkReport,
    todos: &[Todo],
) -> String {
    let mut lines = ctx.header("Memory Marathon TODO", "Generated", "Cycle");
    lines.push(format!(
        "- Health score: `{}` ({})",
        metrics.health_score, metrics.status
    ));
    lines.push(format!("- Recall rate: {}", recall_line(benchmark)));
    lines.extend([String::new(), "## Priority Tasks".into(), String::new()]);

    for priority in Priority::ALL {
        lines.push(format!("### {priority}"));
        let mut any = false;
        for todo in todos.iter().filter(|t| t.priority == priority) {
            any = true;
            lines.push(format!("- [ ] {}", todo.title));
            lines.push(format!("  - Reason: {}", todo.reason));
            lines.push(format!("  - Action: {}", todo.action));
            lines.push(format!("  - Generated: {}", todo.generated_at));
        }
        if !any {
            lines.push("- [ ] No open tasks in this priority.".into());
        }
        lines.push(String::new());
    }
    finish(lines)
}

/// `recent` is the summary log as read back from disk; only its tail is shown.
pub fn render_status(
    ctx: &RenderContext<'_>,
    metrics: &Metrics,
    benchmark: &BenchmarkReport,
    recent: &[SummaryRow],
) -> String {
    let mut lines = ctx.header("Memory Marathon Status", "Updated", "Cycle");
    lines.extend([
        String::new(),
        "## Current Metrics".into(),
        String::new(),
        format!(
            "- Health score: `{}` ({})",
            metrics.health_score, metrics.status
        ),
        format!("- Sources OK: `{}`", metrics.sources_ok),
        format!("- Session memory OK: `{}`", metrics.session_memory_enabled),
        format!("- Vector path OK: `{}`", metrics.vec_ok),
        format!("- Recall: {}", recall_line(benchmark)),
        format!("- Stale state files: `{}`", metrics.stale_state_count),
        format!("- Legacy P9 DBs: `{}`", metrics.legacy_p9_count),
        format!("- Old memory notes: `{}`", metrics.old_memory_count),
        String::new(),
        "## Query Benchmark".into(),
        String::new(),
    ]);

    for row in &benchmark.rows {
        let mark = if row.hits > 0 { "ok" } else { "miss" };
        let mut line = format!(
            "- `{mark}` `{}` -> hits={} top={}",
            row.query,
            row.hits,
            row.top_path.as_deref().unwrap_or("-")
        );
        if row.query_used != row.query {
            line.push_str(&format!(" (relaxed: `{}`)", row.query_used));
        }
        if let Some(ref e) = row.error {
            line.push_str(&format!(" error={e}"));
        }
        lines.push(line);
    }

    lines.extend([String::new(), "## Cycle History (Recent)".into(), String::new()]);
    let tail = recent.len().saturating_sub(HISTORY_ROWS);
    for row in &recent[tail..] {
        lines.push(format!(
            "- {} cycle={} score={} status={} recall={}",
            row.timestamp, row.cycle, row.health_score, row.status, row.recall_rate
        ));
    }
    finish(lines)
}

pub fn render_plan(ctx: &RenderContext<'_>, metrics: &Metrics, benchmark: &BenchmarkReport) -> String {
    let phases: [(&str, &str, &str, String); 8] = [
        (
            "Hour 1",
            "Baseline lock",
            "Audit canonical memory health and verify one index is dominant.",
            format!(
                "Score >= 85 or clear P0 list published (current: {}).",
                metrics.health_score
            ),
        ),
        (
            "Hour 2",
            "Retrieval hardening",
            "Run benchmark queries, tighten the query set and recover misses.",
            format!(
                "Recall >= {RECALL_TARGET} (current: {}).",
                metrics.recall_rate
            ),
        ),
        (
            "Hour 3",
            "Split-brain elimination",
            "Quarantine parallel indexes and stale state artifacts.",
            format!(
                "Legacy P9 count == 0 (current: {}), stale snapshots == 0 (current: {}).",
                metrics.legacy_p9_count, metrics.stale_state_count
            ),
        ),
        (
            "Hour 4",
            "Memory economics pass",
            "Rank notes by reuse signal and archive low-value noise.",
            "Noise archive candidate list generated and reviewed.".into(),
        ),
        (
            "Hour 5",
            "Poisoning defense pass",
            "Mark trusted sources and flag unsigned or low-trust context paths.",
            "Source trust rubric emitted with top risk list.".into(),
        ),
        (
            "Hour 6",
            "Namespace boundaries",
            "Verify project isolation and avoid cross-workspace bleed.",
            "Per-workspace audit snapshots generated.".into(),
        ),
        (
            "Hour 7",
            "Stress + drift checks",
            "Run repeated cycles and ensure metrics stay stable.",
            "No critical status over 3 consecutive cycles.".into(),
        ),
        (
            "Hour 8",
            "Handoff package",
            "Emit final status, TODOs and cycle log pointers.",
            "Final summary links complete and reproducible.".into(),
        ),
    ];

    let mut lines = ctx.header("Memory Marathon 8-Hour Plan", "Generated", "Current cycle");
    lines.extend([
        String::new(),
        "## Runtime Signals".into(),
        String::new(),
        format!(
            "- Health score: `{}` ({})",
            metrics.health_score, metrics.status
        ),
        format!("- Recall rate: {}", recall_line(benchmark)),
        format!("- Vector path OK: `{}`", metrics.vec_ok),
        format!("- Legacy P9 count: `{}`", metrics.legacy_p9_count),
        format!("- Stale state count: `{}`", metrics.stale_state_count),
        String::new(),
        "## Phase Ladder".into(),
        String::new(),
        "| Phase | Theme | Work | Exit criteria |".into(),
        "|-------|-------|------|---------------|".into(),
    ]);
    for (hour, theme, work, exit) in &phases {
        lines.push(format!("| {hour} | {theme} | {work} | {exit} |"));
    }

    lines.extend([
        String::new(),
        "## Operator Checkpoints".into(),
        String::new(),
        "- Every cycle emits: JSON log, status markdown, TODO markdown.".into(),
        "- Investigate if health score drops by 10+ points between cycles.".into(),
        "- Investigate if recall rate drops below 0.5 for two cycles.".into(),
    ]);
    finish(lines)
}
