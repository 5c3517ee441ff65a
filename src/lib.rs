//! Memory hygiene control plane for OpenClaw agent workspaces.
//!
//! memwarden keeps one trusted memory surface hot for an agent runtime. It reads the
//! canonical OpenClaw index (`~/.openclaw/memory/main.sqlite`) without ever writing to
//! it, curates the workspace files that feed that index, and runs timed hardening
//! "marathons" that score memory health and write their own remediation plan.
//!
//! | Surface | Purpose |
//! |---------|---------|
//! | `memwarden audit` | One JSON health snapshot of config, index, notes and legacy stores |
//! | `memwarden search` | FTS5 search over the canonical index |
//! | `memwarden gc` / `archive-state` / `quarantine-p9` / `enforce` | Move-only hygiene, dry-run by default |
//! | `memwarden-marathon` | Repeated audit + hygiene + recall benchmark cycles |
//!
//! # Modules
//!
//! - [`config`]: Workspace resolution from `openclaw.json` and tool settings from TOML
//! - [`index`]: Read-only access to the canonical index: health and FTS search
//! - [`hygiene`]: Archive stale notes and snapshots, quarantine legacy indexes
//! - [`audit`]: Composite health snapshot and recommendation rules
//! - [`benchmark`]: Recall benchmark over a query set with relaxed fallback
//! - [`marathon`]: Metrics, TODO generation, markdown artifacts and the cycle scheduler
//! - [`plane`]: The resolved control plane every operation runs against
//! - [`cli`]: Command definitions shared by both binaries

pub mod audit;
pub mod benchmark;
pub mod cli;
pub mod config;
pub mod error;
pub mod hygiene;
pub mod index;
pub mod marathon;
pub mod plane;
pub mod time;
