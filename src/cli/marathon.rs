use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use super::{expanded_path, CommonArgs};
use crate::benchmark::read_queries;
use crate::config::WardenConfig;
use crate::marathon::{default_run_id, MarathonSettings};

#[derive(Debug, Parser)]
#[command(
    name = "memwarden-marathon",
    version,
    about = "Timed memory hardening cycles with scored health and TODO output"
)]
pub struct MarathonArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Total run time in hours [default: 8]
    #[arg(long, value_parser = non_negative)]
    pub duration_hours: Option<f64>,

    /// Wall-clock spacing between cycle starts [default: 15]
    #[arg(long, value_parser = non_negative)]
    pub interval_minutes: Option<f64>,

    /// Age in days after which memory notes are archived [default: 30]
    #[arg(long)]
    pub retention_days: Option<u32>,

    /// Age in days after which state snapshots are stale [default: 2]
    #[arg(long)]
    pub stale_days: Option<u32>,

    /// Result limit per benchmark query [default: 5]
    #[arg(long)]
    pub benchmark_limit: Option<usize>,

    /// Benchmark query (repeatable)
    #[arg(long = "query")]
    pub queries: Vec<String>,

    /// File with one benchmark query per line; `#` starts a comment line
    #[arg(long, value_parser = expanded_path)]
    pub queries_file: Option<PathBuf>,

    /// Perform hygiene moves instead of dry runs
    #[arg(long)]
    pub apply_hygiene: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    pub run_once: bool,

    /// Run identifier [default: mem-marathon-<UTC stamp>]
    #[arg(long)]
    pub run_id: Option<String>,
}

fn non_negative(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("expected a non-negative number, got {raw}"))
    }
}

impl MarathonArgs {
    /// Merge flags over settings. Flags win.
    pub fn into_settings(self, config: &WardenConfig) -> Result<MarathonSettings> {
        let queries = read_queries(&self.queries, self.queries_file.as_deref())?;
        Ok(MarathonSettings {
            run_id: self.run_id.unwrap_or_else(default_run_id),
            duration_hours: self
                .duration_hours
                .unwrap_or(config.marathon.duration_hours),
            interval_minutes: self
                .interval_minutes
                .unwrap_or(config.marathon.interval_minutes),
            retention_days: self
                .retention_days
                .unwrap_or(config.hygiene.retention_days),
            stale_days: self.stale_days.unwrap_or(config.hygiene.stale_days),
            benchmark_limit: self
                .benchmark_limit
                .unwrap_or(config.marathon.benchmark_limit),
            apply_hygiene: self.apply_hygiene,
            run_once: self.run_once,
            queries,
            legacy_roots: config.legacy_roots(&self.common.legacy_roots),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_settings() {
        let args = MarathonArgs::try_parse_from([
            "memwarden-marathon",
            "--duration-hours",
            "0",
            "--run-once",
            "--query",
            "alpha",
            "--query",
            "alpha",
            "--stale-days",
            "4",
            "--run-id",
            "night-1",
        ])
        .unwrap();
        let mut config = WardenConfig::default();
        config.marathon.interval_minutes = 5.0;
        config.hygiene.default_legacy_roots.clear();

        let settings = args.into_settings(&config).unwrap();
        assert_eq!(settings.duration_hours, 0.0);
        assert_eq!(settings.interval_minutes, 5.0);
        assert_eq!(settings.stale_days, 4);
        assert_eq!(settings.retention_days, 30);
        assert_eq!(settings.queries, vec!["alpha"]);
        assert_eq!(settings.run_id, "night-1");
        assert!(settings.run_once);
        assert!(!settings.apply_hygiene);
        assert!(settings.legacy_roots.is_empty());
    }

    #[test]
    fn negative_interval_is_rejected() {
        assert!(MarathonArgs::try_parse_from([
            "memwarden-marathon",
            "--interval-minutes=-1"
        ])
        .is_err());
        assert!(MarathonArgs::try_parse_from(["memwarden-marathon", "--duration-hours", "nan"])
            .is_err());
    }

    #[test]
    fn no_queries_uses_default_probes() {
        let args = MarathonArgs::try_parse_from(["memwarden-marathon"]).unwrap();
        let settings = args.into_settings(&WardenConfig::default()).unwrap();
        assert_eq!(settings.queries.len(), 6);
        assert!(settings.run_id.starts_with("mem-marathon-"));
    }

    #[test]
    fn queries_file_expands_tilde() {
        let args =
            MarathonArgs::try_parse_from(["memwarden-marathon", "--queries-file=~/probes.txt"])
                .unwrap();
        let home = dirs::home_dir().unwrap();
        assert_eq!(args.queries_file, Some(home.join("probes.txt")));
    }
}
