use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audit::Audit;
use crate::benchmark::BenchmarkReport;
use crate::time::round_to;

// Health score weights. Tests pin these values.
const BASE: f64 = 35.0;
const BOTH_SOURCES_BONUS: f64 = 20.0;
const SESSION_MEMORY_BONUS: f64 = 10.0;
const VECTOR_BONUS: f64 = 10.0;
const RECALL_WEIGHT: f64 = 30.0;
const STALE_STATE_PENALTY: f64 = 12.0;
const LEGACY_PENALTY: f64 = 15.0;
const OLD_NOTE_PENALTY: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Excellent,
    Good,
    Degraded,
    Critical,
}

impl HealthStatus {
    /// Band for a clamped score.
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Self::Excellent
        } else if score >= 70.0 {
            Self::Good
        } else if score >= 50.0 {
            Self::Degraded
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Degraded => "degraded",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs and result of one health score computation.
#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub health_score: f64,
    pub status: HealthStatus,
    pub recall_rate: f64,
    pub sources_ok: bool,
    pub session_memory_enabled: bool,
    pub vec_ok: bool,
    pub stale_state_count: usize,
    pub legacy_p9_count: usize,
    pub old_memory_count: usize,
}

pub fn compute_metrics(audit: &Audit, benchmark: &BenchmarkReport) -> Metrics {
    let cfg = &audit.memory_config;
    let sources_ok = cfg.has_source("memory") && cfg.has_source("sessions");
    let session_memory_enabled = cfg.session_memory_enabled;
    let vec_ok = audit.db_health.vec_ok();
    let stale = audit.stale_state_count();
    let legacy = audit.legacy_count();
    let old = audit.old_memory_count();
    let recall = benchmark.recall_rate;

    let bonus = |on: bool, weight: f64| if on { weight } else { 0.0 };
    let raw = BASE
        + bonus(sources_ok, BOTH_SOURCES_BONUS)
        + bonus(session_memory_enabled, SESSION_MEMORY_BONUS)
        + bonus(vec_ok, VECTOR_BONUS)
        + RECALL_WEIGHT * recall
        - STALE_STATE_PENALTY * stale as f64
        - LEGACY_PENALTY * legacy as f64
        - OLD_NOTE_PENALTY * old as f64;

    // clamped only here; the raw sum may go negative
    let health_score = round_to(raw.clamp(0.0, 100.0), 2);

    Metrics {
        health_score,
        status: HealthStatus::from_score(health_score),
        recall_rate: recall,
        sources_ok,
        session_memory_enabled,
        vec_ok,
        stale_state_count: stale,
        legacy_p9_count: legacy,
        old_memory_count: old,
    }
}
