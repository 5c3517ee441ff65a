use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ── Tool settings (memwarden.toml) ──────────────────────────────────────────

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WardenConfig {
    pub logging: LoggingConfig,
    pub hygiene: HygieneConfig,
    pub marathon: MarathonConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HygieneConfig {
    pub retention_days: u32,
    pub stale_days: u32,
    /// Legacy roots scanned after the workspace and any `--legacy-root` flags.
    pub default_legacy_roots: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarathonConfig {
    pub duration_hours: f64,
    pub interval_minutes: f64,
    pub benchmark_limit: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for HygieneConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            stale_days: 2,
            default_legacy_roots: vec![
                "~/agni-workspace".into(),
                "~/rushabdev-workspace".into(),
            ],
        }
    }
}

impl Default for MarathonConfig {
    fn default() -> Self {
        Self {
            duration_hours: 8.0,
            interval_minutes: 15.0,
            benchmark_limit: 5,
        }
    }
}

/// Returns `~/.openclaw/`
pub fn default_openclaw_home() -> PathBuf {
    home_dir().join(".openclaw")
}

/// Settings file that sits next to `openclaw.json`.
pub fn settings_path(openclaw_home: &Path) -> PathBuf {
    openclaw_home.join("memwarden.toml")
}

impl WardenConfig {
    /// Load settings for an OpenClaw home, then apply env var overrides.
    pub fn load(openclaw_home: &Path) -> Result<Self> {
        Self::load_from(settings_path(openclaw_home))
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read settings file")?;
            toml::from_str(&contents).context("failed to parse settings TOML")?
        } else {
            info!("no settings file at {}, using defaults", path.display());
            WardenConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (MEMWARDEN_LOG_LEVEL, MEMWARDEN_RETENTION_DAYS, MEMWARDEN_STALE_DAYS).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEMWARDEN_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(days) = env_u32("MEMWARDEN_RETENTION_DAYS") {
            self.hygiene.retention_days = days;
        }
        if let Some(days) = env_u32("MEMWARDEN_STALE_DAYS") {
            self.hygiene.stale_days = days;
        }
    }

    /// Explicit roots first, then the configured defaults, all tilde-expanded.
    pub fn legacy_roots(&self, explicit: &[PathBuf]) -> Vec<PathBuf> {
        explicit
            .iter()
            .map(|p| expand_tilde(&p.to_string_lossy()))
            .chain(
                self.hygiene
                    .default_legacy_roots
                    .iter()
                    .map(|p| expand_tilde(p)),
            )
            .collect()
    }
}

fn env_u32(key: &str) -> Option<u32> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring non-numeric override");
            None
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        home_dir()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home_dir().join(rest)
    } else {
        PathBuf::from(path)
    }
}

// ── OpenClaw config (openclaw.json) ─────────────────────────────────────────

/// `openclaw.json`, kept as loose JSON. Each field this tool reads is looked up
/// on its own, so a wrongly typed field defaults alone instead of discarding
/// the whole file.
#[derive(Debug, Default)]
pub struct OpenClawConfig {
    root: Value,
}

impl OpenClawConfig {
    /// Read `openclaw.json`. Absent or malformed files read as an empty config.
    pub fn read(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&contents) {
            Ok(root) => Self { root },
            Err(e) => {
                debug!(path = %path.display(), error = %e, "openclaw.json unreadable, using defaults");
                Self::default()
            }
        }
    }

    fn defaults(&self, pointer: &str) -> Option<&Value> {
        self.root.pointer(&format!("/agents/defaults{pointer}"))
    }

    fn workspace(&self) -> Option<PathBuf> {
        self.defaults("/workspace")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(expand_tilde)
    }

    /// `memorySearch.sources`. A bare string counts as a single source and
    /// non-string entries are skipped.
    pub fn memory_sources(&self) -> Vec<String> {
        match self.defaults("/memorySearch/sources") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn session_memory_enabled(&self) -> bool {
        self.defaults("/memorySearch/experimental/sessionMemory")
            .is_some_and(truthy)
    }

    pub fn memory_flush_enabled(&self) -> bool {
        self.defaults("/compaction/memoryFlush/enabled")
            .is_some_and(truthy)
    }
}

/// Loose truthiness for hand-edited switches: `1` and `"yes"` are on,
/// `0`, `""`, `null` and empty containers are off.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// ── Resolved paths ───────────────────────────────────────────────────────────

/// Paths the control plane works against, resolved once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPaths {
    pub openclaw_home: PathBuf,
    pub workspace: PathBuf,
    pub canonical_db_path: PathBuf,
    pub memory_dir: PathBuf,
    pub config_path: PathBuf,
}

impl ResolvedPaths {
    /// Resolve the workspace: explicit override, else `agents.defaults.workspace`
    /// from `openclaw.json`, else `<home>/workspace`.
    pub fn resolve(openclaw_home: &Path, workspace_override: Option<&Path>) -> Self {
        let config_path = openclaw_home.join("openclaw.json");

        let workspace = match workspace_override {
            Some(w) => {
                if !w.exists() {
                    warn!(workspace = %w.display(), "workspace override does not exist");
                }
                w.to_path_buf()
            }
            None => OpenClawConfig::read(&config_path)
                .workspace()
                .unwrap_or_else(|| openclaw_home.join("workspace")),
        };

        Self {
            openclaw_home: openclaw_home.to_path_buf(),
            canonical_db_path: openclaw_home.join("memory").join("main.sqlite"),
            memory_dir: workspace.join("memory"),
            config_path,
            workspace,
        }
    }
}

/// Memory-related switches from `openclaw.json`, as reported by the audit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryConfigSnapshot {
    pub workspace: String,
    pub workspace_exists: bool,
    pub memory_sources: Vec<String>,
    pub session_memory_enabled: bool,
    pub compaction_memory_flush_enabled: bool,
}

impl MemoryConfigSnapshot {
    pub fn read(paths: &ResolvedPaths) -> Self {
        let cfg = OpenClawConfig::read(&paths.config_path);
        Self {
            workspace: paths.workspace.display().to_string(),
            workspace_exists: paths.workspace.exists(),
            memory_sources: cfg.memory_sources(),
            session_memory_enabled: cfg.session_memory_enabled(),
            compaction_memory_flush_enabled: cfg.memory_flush_enabled(),
        }
    }

    pub fn has_source(&self, tag: &str) -> bool {
        self.memory_sources.iter().any(|s| s == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_valid() {
        let config = WardenConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.hygiene.retention_days, 30);
        assert_eq!(config.hygiene.stale_days, 2);
        assert_eq!(config.marathon.benchmark_limit, 5);
        assert_eq!(config.marathon.interval_minutes, 15.0);
        assert_eq!(config.hygiene.default_legacy_roots.len(), 2);
    }

    #[test]
    fn parse_toml_settings() {
        let toml_str = r#"
[logging]
level = "debug"

[hygiene]
retention_days = 14
default_legacy_roots = []

[marathon]
interval_minutes = 5.0
"#;
        let config: WardenConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.hygiene.retention_days, 14);
        assert!(config.hygiene.default_legacy_roots.is_empty());
        assert_eq!(config.marathon.interval_minutes, 5.0);
        // defaults still apply for unset fields
        assert_eq!(config.hygiene.stale_days, 2);
        assert_eq!(config.marathon.duration_hours, 8.0);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = WardenConfig::default();
        std::env::set_var("MEMWARDEN_LOG_LEVEL", "trace");
        std::env::set_var("MEMWARDEN_RETENTION_DAYS", "7");
        std::env::set_var("MEMWARDEN_STALE_DAYS", "not-a-number");

        config.apply_env_overrides();

        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.hygiene.retention_days, 7);
        assert_eq!(config.hygiene.stale_days, 2);

        std::env::remove_var("MEMWARDEN_LOG_LEVEL");
        std::env::remove_var("MEMWARDEN_RETENTION_DAYS");
        std::env::remove_var("MEMWARDEN_STALE_DAYS");
    }

    #[test]
    fn legacy_roots_put_explicit_first() {
        let mut config = WardenConfig::default();
        config.hygiene.default_legacy_roots = vec!["/srv/legacy".into()];
        let roots = config.legacy_roots(&[PathBuf::from("/tmp/extra")]);
        assert_eq!(
            roots,
            vec![PathBuf::from("/tmp/extra"), PathBuf::from("/srv/legacy")]
        );
    }

    #[test]
    fn resolve_reads_workspace_from_openclaw_json() {
        let home = TempDir::new().unwrap();
        let ws = home.path().join("elsewhere");
        std::fs::write(
            home.path().join("openclaw.json"),
            format!(
                r#"{{"agents": {{"defaults": {{"workspace": "{}"}}}}}}"#,
                ws.display()
            ),
        )
        .unwrap();

        let paths = ResolvedPaths::resolve(home.path(), None);
        assert_eq!(paths.workspace, ws);
        assert_eq!(paths.memory_dir, ws.join("memory"));
        assert_eq!(
            paths.canonical_db_path,
            home.path().join("memory").join("main.sqlite")
        );
        assert_eq!(paths.config_path, home.path().join("openclaw.json"));
    }

    #[test]
    fn resolve_falls_back_on_missing_or_malformed_config() {
        let home = TempDir::new().unwrap();
        let paths = ResolvedPaths::resolve(home.path(), None);
        assert_eq!(paths.workspace, home.path().join("workspace"));

        std::fs::write(home.path().join("openclaw.json"), "{ not json").unwrap();
        let paths = ResolvedPaths::resolve(home.path(), None);
        assert_eq!(paths.workspace, home.path().join("workspace"));

        std::fs::write(
            home.path().join("openclaw.json"),
            r#"{"agents": {"defaults": {"workspace": "   "}}}"#,
        )
        .unwrap();
        let paths = ResolvedPaths::resolve(home.path(), None);
        assert_eq!(paths.workspace, home.path().join("workspace"));
    }

    #[test]
    fn override_wins_even_when_missing() {
        let home = TempDir::new().unwrap();
        let ws = home.path().join("does-not-exist");
        let paths = ResolvedPaths::resolve(home.path(), Some(&ws));
        assert_eq!(paths.workspace, ws);
    }

    #[test]
    fn memory_snapshot_reads_switches() {
        let home = TempDir::new().unwrap();
        std::fs::write(
            home.path().join("openclaw.json"),
            r#"{
                "agents": {"defaults": {
                    "memorySearch": {"sources": ["memory", "sessions"], "experimental": {"sessionMemory": true}},
                    "compaction": {"memoryFlush": {"enabled": true}},
                    "model": "ignored"
                }},
                "gateway": {"port": 1234}
            }"#,
        )
        .unwrap();
        let paths = ResolvedPaths::resolve(home.path(), None);
        let snap = MemoryConfigSnapshot::read(&paths);
        assert_eq!(snap.memory_sources, vec!["memory", "sessions"]);
        assert!(snap.session_memory_enabled);
        assert!(snap.compaction_memory_flush_enabled);
        assert!(snap.has_source("sessions"));
        assert!(!snap.workspace_exists);
    }

    #[test]
    fn mistyped_switch_keeps_workspace() {
        let home = TempDir::new().unwrap();
        let ws = home.path().join("real_ws");
        std::fs::write(
            home.path().join("openclaw.json"),
            serde_json::json!({
                "agents": {"defaults": {
                    "workspace": ws,
                    "memorySearch": {
                        "sources": "memory",
                        "experimental": {"sessionMemory": 1}
                    },
                    "compaction": {"memoryFlush": {"enabled": "true"}}
                }}
            })
            .to_string(),
        )
        .unwrap();

        let paths = ResolvedPaths::resolve(home.path(), None);
        assert_eq!(paths.workspace, ws);

        let snap = MemoryConfigSnapshot::read(&paths);
        assert_eq!(snap.memory_sources, vec!["memory"]);
        assert!(snap.session_memory_enabled);
        assert!(snap.compaction_memory_flush_enabled);
    }

    #[test]
    fn mistyped_workspace_falls_back_alone() {
        let home = TempDir::new().unwrap();
        std::fs::write(
            home.path().join("openclaw.json"),
            r#"{"agents": {"defaults": {
                "workspace": 42,
                "memorySearch": {"sources": ["memory", 7, "sessions"], "experimental": {"sessionMemory": 0}}
            }}}"#,
        )
        .unwrap();

        let paths = ResolvedPaths::resolve(home.path(), None);
        assert_eq!(paths.workspace, home.path().join("workspace"));

        let snap = MemoryConfigSnapshot::read(&paths);
        assert_eq!(snap.memory_sources, vec!["memory", "sessions"]);
        assert!(!snap.session_memory_enabled);
        assert!(!snap.compaction_memory_flush_enabled);
    }
}
