//! Timed hardening runs.
//!
//! A marathon repeats one cycle (audit, hygiene, recall benchmark, scoring) at a
//! fixed wall-clock interval until its duration elapses. Every cycle leaves:
//!
//! - `logs/memory_marathon/<run_id>/cycle_<NNN>_<stamp>.json` with the full record
//! - one appended row in `logs/memory_marathon/<run_id>/summary.jsonl`
//! - freshly rewritten `MEMORY_MARATHON_{TODO,STATUS,PLAN}.md` at the workspace root
//!
//! The summary log is the history of a run. The status artifact re-reads it every
//! cycle instead of keeping rows in memory, so a truncated log is reflected on the
//! next rewrite.

pub mod metrics;
pub mod render;
pub mod todos;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

pub use metrics::{compute_metrics, HealthStatus, Metrics};
pub use todos::{generate_todos, Priority, Todo};

use crate::audit::Audit;
use crate::benchmark::{run_benchmark, BenchmarkReport};
use crate::hygiene::{ArchiveStateReport, GcReport, Mode, QuarantineReport};
use crate::plane::ControlPlane;
use crate::time::utc_stamp;
use render::{RenderContext, PLAN_FILE, STATUS_FILE, TODO_FILE};

pub const SUMMARY_FILE: &str = "summary.jsonl";

/// Per-run configuration, fully resolved from flags and settings.
#[derive(Debug, Clone)]
pub struct MarathonSettings {
    pub run_id: String,
    pub duration_hours: f64,
    pub interval_minutes: f64,
    pub retention_days: u32,
    pub stale_days: u32,
    pub benchmark_limit: usize,
    pub apply_hygiene: bool,
    pub run_once: bool,
    pub queries: Vec<String>,
    pub legacy_roots: Vec<PathBuf>,
}

pub fn default_run_id() -> String {
    format!("mem-marathon-{}", utc_stamp(Utc::now()))
}

/// One line of `summary.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRow {
    pub timestamp: String,
    pub cycle: usize,
    pub health_score: f64,
    pub status: HealthStatus,
    pub recall_rate: f64,
    pub legacy_p9_count: usize,
    pub stale_state_count: usize,
}

/// A hygiene step that reported an error without stopping the cycle.
#[derive(Debug, Clone, Serialize)]
pub struct StepError {
    pub step: String,
    pub message: String,
}

/// Full record written to `cycle_<NNN>_<stamp>.json`.
#[derive(Debug, Serialize)]
pub struct CycleRecord {
    pub run_id: String,
    pub cycle_index: usize,
    pub timestamp: String,
    pub apply_hygiene: bool,
    pub retention_days: u32,
    pub stale_days: u32,
    pub audit: Audit,
    pub gc: GcReport,
    pub archive_state: ArchiveStateReport,
    pub quarantine_p9: QuarantineReport,
    pub benchmark: BenchmarkReport,
    pub metrics: Metrics,
    pub todos: Vec<Todo>,
    pub errors: Vec<StepError>,
}

/// The one-line stdout record for a completed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutcome {
    pub run_id: String,
    pub cycle: usize,
    pub timestamp: String,
    pub health_score: f64,
    pub status: HealthStatus,
    pub recall_rate: f64,
    pub log_path: PathBuf,
}

pub struct MarathonRunner {
    plane: ControlPlane,
    settings: MarathonSettings,
    logs_dir: PathBuf,
}

impl MarathonRunner {
    pub fn new(plane: ControlPlane, settings: MarathonSettings) -> Self {
        let logs_dir = plane
            .paths()
            .workspace
            .join("logs")
            .join("memory_marathon")
            .join(&settings.run_id);
        Self {
            plane,
            settings,
            logs_dir,
        }
    }

    pub fn settings(&self) -> &MarathonSettings {
        &self.settings
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn summary_path(&self) -> PathBuf {
        self.logs_dir.join(SUMMARY_FILE)
    }

    /// Create the run directory. Failing here is the one unrecoverable error.
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.logs_dir)
            .with_context(|| format!("failed to create run dir {}", self.logs_dir.display()))
    }

    /// Run one cycle to completion.
    ///
    /// Hygiene failures are recorded in the cycle's `errors` and do not stop it.
    /// An error is returned only if the cycle JSON or the summary row could not be
    /// written. Markdown write failures are logged and otherwise ignored.
    pub fn run_cycle(&self, cycle: usize) -> Result<CycleOutcome> {
        let s = &self.settings;
        let started = Utc::now();
        let timestamp = started.to_rfc3339();
        let mode = Mode::from_apply(s.apply_hygiene);
        info!(run_id = %s.run_id, cycle, ?mode, "cycle starting");

        let mut audit = self
            .plane
            .audit(s.retention_days, s.stale_days, &s.legacy_roots);
        let gc = self.plane.gc_memory(s.retention_days, mode);
        let archive_state = self.plane.archive_state(s.stale_days, mode);
        let quarantine_p9 = self.plane.quarantine_p9(&s.legacy_roots, mode);
        let benchmark = run_benchmark(self.plane.index(), &s.queries, s.benchmark_limit);
        audit.note_benchmark(&benchmark);

        let metrics = compute_metrics(&audit, &benchmark);
        let todos = generate_todos(&benchmark, &metrics, s.retention_days, s.stale_days);

        let errors: Vec<StepError> = [
            ("gc", gc.error.as_ref()),
            ("archive_state", archive_state.error.as_ref()),
            ("quarantine_p9", quarantine_p9.error.as_ref()),
        ]
        .into_iter()
        .filter_map(|(step, e)| {
            e.map(|m| StepError {
                step: step.to_string(),
                message: m.clone(),
            })
        })
        .collect();
        for e in &errors {
            warn!(cycle, step = %e.step, error = %e.message, "hygiene step reported an error");
        }

        let record = CycleRecord {
            run_id: s.run_id.clone(),
            cycle_index: cycle,
            timestamp: timestamp.clone(),
            apply_hygiene: s.apply_hygiene,
            retention_days: s.retention_days,
            stale_days: s.stale_days,
            audit,
            gc,
            archive_state,
            quarantine_p9,
            benchmark,
            metrics,
            todos,
            errors,
        };

        self.prepare()?;
        let log_path = self
            .logs_dir
            .join(format!("cycle_{cycle:03}_{}.json", utc_stamp(started)));
        let json = serde_json::to_vec_pretty(&record).context("failed to serialize cycle record")?;
        std::fs::write(&log_path, json)
            .with_context(|| format!("failed to write {}", log_path.display()))?;

        let row = SummaryRow {
            timestamp: timestamp.clone(),
            cycle,
            health_score: record.metrics.health_score,
            status: record.metrics.status,
            recall_rate: record.metrics.recall_rate,
            legacy_p9_count: record.metrics.legacy_p9_count,
            stale_state_count: record.metrics.stale_state_count,
        };
        append_summary(&self.summary_path(), &row)?;

        self.write_artifacts(&record);

        info!(
            cycle,
            health_score = record.metrics.health_score,
            status = %record.metrics.status,
            recall_rate = record.metrics.recall_rate,
            "cycle complete"
        );

        Ok(CycleOutcome {
            run_id: s.run_id.clone(),
            cycle,
            timestamp,
            health_score: record.metrics.health_score,
            status: record.metrics.status,
            recall_rate: record.metrics.recall_rate,
            log_path,
        })
    }

    fn write_artifacts(&self, record: &CycleRecord) {
        let workspace = &self.plane.paths().workspace;
        let ctx = RenderContext {
            workspace: workspace.as_path(),
            run_id: &self.settings.run_id,
            cycle: record.cycle_index,
        };
        let recent = load_summaries(&self.summary_path());

        let artifacts = [
            (
                TODO_FILE,
                render::render_todo(&ctx, &record.metrics, &record.benchmark, &record.todos),
            ),
            (
                STATUS_FILE,
                render::render_status(&ctx, &record.metrics, &record.benchmark, &recent),
            ),
            (
                PLAN_FILE,
                render::render_plan(&ctx, &record.metrics, &record.benchmark),
            ),
        ];
        for (name, body) in artifacts {
            let path = workspace.join(name);
            if let Err(e) = std::fs::write(&path, body) {
                error!(path = %path.display(), error = %e, "failed to write marathon artifact");
            }
        }
    }
}

fn append_summary(path: &Path, row: &SummaryRow) -> Result<()> {
    let line = serde_json::to_string(row).context("failed to serialize summary row")?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("failed to append to {}", path.display()))
}

/// Read every well-formed row of a summary log. Missing file reads as empty.
pub fn load_summaries(path: &Path) -> Vec<SummaryRow> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| match serde_json::from_str(l) {
            Ok(row) => Some(row),
            Err(e) => {
                debug!(error = %e, "skipping malformed summary row");
                None
            }
        })
        .collect()
}

// ── Scheduling ───────────────────────────────────────────────────────────────

/// Time left until `cycle_start + interval`, or zero if the cycle overran.
pub fn next_sleep(cycle_start: Instant, interval: Duration, now: Instant) -> Duration {
    cycle_start
        .checked_add(interval)
        .map_or(Duration::MAX, |next| next.saturating_duration_since(now))
}

pub fn deadline_reached(now: Instant, deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| now >= d)
}

fn duration_from(value: f64, unit_secs: f64) -> Duration {
    Duration::try_from_secs_f64(value * unit_secs).unwrap_or(Duration::MAX)
}

/// Cooperative cancellation, observed only between cycles.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Shutdown {
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        if self.is_triggered() {
            return;
        }
        self.notify.notified().await;
    }

    /// Trigger on the first Ctrl-C or, on Unix, SIGTERM.
    pub fn listen_for_signals(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            let signal = stop_signal().await;
            info!(signal, "stop requested, finishing the current cycle");
            this.trigger();
        });
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn stop_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM");
            interrupt().await;
            return "interrupt";
        }
    };
    tokio::select! {
        _ = interrupt() => "interrupt",
        _ = term.recv() => "terminate",
    }
}

#[cfg(not(unix))]
async fn stop_signal() -> &'static str {
    interrupt().await;
    "interrupt"
}

/// Drive cycles until the duration elapses, `run_once` is set, or `shutdown`
/// fires. Returns the number of cycles started.
///
/// Each cycle runs on the blocking pool and is awaited before the next one is
/// scheduled, so cycles never overlap. The deadline is checked after a cycle, so
/// the last one always finishes.
pub async fn run_marathon(
    runner: Arc<MarathonRunner>,
    shutdown: Shutdown,
    mut on_cycle: impl FnMut(&CycleOutcome),
) -> Result<usize> {
    runner.prepare()?;

    let settings = runner.settings().clone();
    let interval = duration_from(settings.interval_minutes, 60.0);
    let started = Instant::now();
    let deadline = started.checked_add(duration_from(settings.duration_hours, 3600.0));

    info!(
        run_id = %settings.run_id,
        duration_hours = settings.duration_hours,
        interval_minutes = settings.interval_minutes,
        apply_hygiene = settings.apply_hygiene,
        queries = settings.queries.len(),
        "marathon starting"
    );

    let mut cycles = 0;
    loop {
        cycles += 1;
        let cycle = cycles;
        let cycle_start = Instant::now();

        let r = Arc::clone(&runner);
        match tokio::task::spawn_blocking(move || r.run_cycle(cycle)).await {
            Ok(Ok(outcome)) => on_cycle(&outcome),
            Ok(Err(e)) => error!(cycle, error = %e, "cycle failed to record"),
            Err(e) => error!(cycle, error = %e, "cycle task aborted"),
        }

        if settings.run_once || deadline_reached(Instant::now(), deadline) {
            break;
        }
        if shutdown.is_triggered() {
            break;
        }

        let pause = next_sleep(cycle_start, interval, Instant::now());
        debug!(cycle, pause_secs = pause.as_secs_f64(), "sleeping until next cycle");
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = shutdown.wait() => break,
        }
    }

    info!(run_id = %settings.run_id, cycles, "marathon finished");
    Ok(cycles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_targets_cycle_start_plus_interval() {
        let start = Instant::now();
        let interval = Duration::from_secs(900);
        let now = start + Duration::from_secs(120);
        assert_eq!(next_sleep(start, interval, now), Duration::from_secs(780));
    }

    #[test]
    fn overrun_cycle_sleeps_zero() {
        let start = Instant::now();
        let now = start + Duration::from_secs(1200);
        assert_eq!(
            next_sleep(start, Duration::from_secs(900), now),
            Duration::ZERO
        );
    }

    #[test]
    fn deadline_checks() {
        let start = Instant::now();
        assert!(deadline_reached(start, Some(start)));
        assert!(!deadline_reached(start, Some(start + Duration::from_secs(1))));
        assert!(!deadline_reached(start, None));
    }

    #[test]
    fn huge_durations_saturate() {
        assert_eq!(duration_from(f64::MAX, 3600.0), Duration::MAX);
        assert_eq!(duration_from(0.5, 60.0), Duration::from_secs(30));
    }

    #[test]
    fn malformed_summary_rows_are_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(SUMMARY_FILE);
        std::fs::write(
            &path,
            concat!(
                r#"{"timestamp":"t1","cycle":1,"health_score":71.5,"status":"good","recall_rate":0.5,"legacy_p9_count":0,"stale_state_count":1}"#,
                "\n",
                r#"{"timestamp":"t2","cycle":2,"health_sc"#,
                "\n\n",
                r#"{"timestamp":"t3","cycle":3,"health_score":90.0,"status":"excellent","recall_rate":1.0,"legacy_p9_count":0,"stale_state_count":0}"#,
                "\n",
            ),
        )
        .unwrap();

        let rows = load_summaries(&path);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cycle, 1);
        assert_eq!(rows[0].status, HealthStatus::Good);
        assert_eq!(rows[1].cycle, 3);
        assert!(load_summaries(&tmp.path().join("missing.jsonl")).is_empty());
    }

    #[test]
    fn run_id_has_prefix() {
        let id = default_run_id();
        assert!(id.starts_with("mem-marathon-"));
        assert!(id.ends_with('Z'));
    }

    #[tokio::test]
    async fn shutdown_wait_returns_after_trigger() {
        let shutdown = Shutdown::default();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        shutdown.wait().await;
    }
}
