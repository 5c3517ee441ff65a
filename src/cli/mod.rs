pub mod marathon;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::audit::Audit;
use crate::config::{default_openclaw_home, expand_tilde, WardenConfig};
use crate::hygiene::{ArchiveStateReport, GcReport, Mode};
use crate::index::SearchSource;
use crate::plane::ControlPlane;

/// Location flags shared by both binaries.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// OpenClaw home directory [default: ~/.openclaw]
    #[arg(long, global = true, value_parser = expanded_path)]
    pub openclaw_home: Option<PathBuf>,

    /// Workspace override; otherwise read from openclaw.json
    #[arg(long, global = true, value_parser = expanded_path)]
    pub workspace: Option<PathBuf>,

    /// Extra directory to scan for legacy memory databases (repeatable)
    #[arg(long = "legacy-root", global = true, value_parser = expanded_path)]
    pub legacy_roots: Vec<PathBuf>,
}

/// Path flags accept `~` and `~/...`, including the `--flag=~/x` form the
/// shell leaves alone.
pub fn expanded_path(raw: &str) -> Result<PathBuf, String> {
    Ok(expand_tilde(raw))
}

impl CommonArgs {
    pub fn openclaw_home(&self) -> PathBuf {
        self.openclaw_home
            .clone()
            .unwrap_or_else(default_openclaw_home)
    }
}

/// Initialize tracing at the configured level.
/// Logs go to stderr so stdout carries only JSON.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Clone, Subcommand)]
pub enum HygieneCommand {
    /// Print a JSON health snapshot of config, index and workspace
    Audit {
        #[arg(long)]
        retention_days: Option<u32>,
        #[arg(long)]
        stale_days: Option<u32>,
    },
    /// Full-text search over the canonical index
    Search {
        /// FTS5 query
        #[arg(long)]
        query: String,
        #[arg(long, value_enum, default_value_t = SearchSource::All)]
        source: SearchSource,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Archive memory notes older than the retention window
    Gc {
        #[arg(long)]
        retention_days: Option<u32>,
        /// Perform the moves instead of reporting them
        #[arg(long)]
        apply: bool,
    },
    /// Archive stale state snapshots
    ArchiveState {
        #[arg(long)]
        stale_days: Option<u32>,
        #[arg(long)]
        apply: bool,
    },
    /// Run gc and archive-state, then audit
    Enforce {
        #[arg(long)]
        retention_days: Option<u32>,
        #[arg(long)]
        stale_days: Option<u32>,
        #[arg(long)]
        apply: bool,
    },
    /// Move legacy memory databases into memory/p9_quarantine/
    #[command(name = "quarantine-p9")]
    QuarantineP9 {
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct EnforceReport {
    pub gc: GcReport,
    pub archive_state: ArchiveStateReport,
    pub audit: Audit,
}

/// Run one hygiene command and return its JSON output.
///
/// Only `search` can fail; every other command reports problems inside its
/// output.
pub fn execute(
    plane: &ControlPlane,
    config: &WardenConfig,
    legacy_roots: &[PathBuf],
    command: HygieneCommand,
) -> Result<serde_json::Value> {
    let retention = |days: Option<u32>| days.unwrap_or(config.hygiene.retention_days);
    let stale = |days: Option<u32>| days.unwrap_or(config.hygiene.stale_days);

    let value = match command {
        HygieneCommand::Audit {
            retention_days,
            stale_days,
        } => serde_json::to_value(plane.audit(
            retention(retention_days),
            stale(stale_days),
            legacy_roots,
        ))?,
        HygieneCommand::Search {
            query,
            source,
            limit,
        } => serde_json::to_value(plane.index().fts_search(&query, source, limit)?)?,
        HygieneCommand::Gc {
            retention_days,
            apply,
        } => serde_json::to_value(
            plane.gc_memory(retention(retention_days), Mode::from_apply(apply)),
        )?,
        HygieneCommand::ArchiveState { stale_days, apply } => serde_json::to_value(
            plane.archive_state(stale(stale_days), Mode::from_apply(apply)),
        )?,
        HygieneCommand::Enforce {
            retention_days,
            stale_days,
            apply,
        } => {
            let (retention_days, stale_days) = (retention(retention_days), stale(stale_days));
            let mode = Mode::from_apply(apply);
            let gc = plane.gc_memory(retention_days, mode);
            let archive_state = plane.archive_state(stale_days, mode);
            let audit = plane.audit(retention_days, stale_days, legacy_roots);
            serde_json::to_value(EnforceReport {
                gc,
                archive_state,
                audit,
            })?
        }
        HygieneCommand::QuarantineP9 { apply } => {
            serde_json::to_value(plane.quarantine_p9(legacy_roots, Mode::from_apply(apply)))?
        }
    };
    Ok(value)
}
