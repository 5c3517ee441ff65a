#![allow(dead_code)]

use memwarden::config::ResolvedPaths;
use memwarden::plane::ControlPlane;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Scratch OpenClaw home with a workspace at `<home>/workspace`.
pub struct Fixture {
    pub home: TempDir,
    pub workspace: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let home = TempDir::new().unwrap();
        let workspace = home.path().join("workspace");
        std::fs::create_dir_all(workspace.join("memory")).unwrap();
        Self { home, workspace }
    }

    pub fn home(&self) -> &Path {
        self.home.path()
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.workspace.join("memory")
    }

    pub fn db_path(&self) -> PathBuf {
        self.home().join("memory").join("main.sqlite")
    }

    pub fn plane(&self) -> ControlPlane {
        ControlPlane::new(ResolvedPaths::resolve(self.home(), Some(&self.workspace)))
    }

    /// Write `openclaw.json` pointing at this workspace.
    pub fn write_openclaw_json(&self, sources: &[&str], session_memory: bool) {
        let body = serde_json::json!({
            "agents": {"defaults": {
                "workspace": self.workspace,
                "memorySearch": {
                    "sources": sources,
                    "experimental": {"sessionMemory": session_memory}
                }
            }}
        });
        std::fs::write(self.home().join("openclaw.json"), body.to_string()).unwrap();
    }

    /// Write a file relative to the workspace, creating parents.
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.workspace.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Write a memory note and push its mtime `days` into the past.
    pub fn old_note(&self, name: &str, days: u64) -> PathBuf {
        let path = self.write(&format!("memory/{name}"), "# old note\n");
        backdate(&path, days);
        path
    }
}

/// Set a file's mtime to `days` ago.
pub fn backdate(path: &Path, days: u64) {
    let when = SystemTime::now() - Duration::from_secs(days * 86_400);
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(when).unwrap();
}

/// One row of the canonical index fixture: (path, source, text).
pub type ChunkRow<'a> = (&'a str, &'a str, &'a str);

/// Build a canonical index at `db_path` shaped like the runtime's.
///
/// `chunks_fts` shares rowids with `chunks`. With `with_vec`, a `chunks_vec` vec0
/// relation is created; without it, the vector probe fails.
pub fn write_index(db_path: &Path, rows: &[ChunkRow<'_>], with_vec: bool) {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    memwarden::index::load_sqlite_vec();
    let conn = Connection::open(db_path).unwrap();
    conn.execute_batch(
        "CREATE TABLE files (path TEXT PRIMARY KEY, source TEXT, hash TEXT, mtime INTEGER, size INTEGER);
         CREATE TABLE chunks (
             id INTEGER PRIMARY KEY,
             path TEXT NOT NULL,
             source TEXT,
             start_line INTEGER,
             end_line INTEGER,
             hash TEXT,
             text TEXT NOT NULL
         );
         CREATE VIRTUAL TABLE chunks_fts USING fts5(text);",
    )
    .unwrap();
    if with_vec {
        conn.execute_batch("CREATE VIRTUAL TABLE chunks_vec USING vec0(embedding float[4]);")
            .unwrap();
    }

    for (i, (path, source, text)) in rows.iter().enumerate() {
        let id = i as i64 + 1;
        conn.execute(
            "INSERT OR IGNORE INTO files (path, source, mtime, size) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![path, source, 1_700_000_000_i64 + id, text.len() as i64],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO chunks (id, path, source, start_line, end_line, text)
             VALUES (?1, ?2, ?3, 1, ?4, ?5)",
            rusqlite::params![id, path, source, text.lines().count() as i64, text],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO chunks_fts (rowid, text) VALUES (?1, ?2)",
            rusqlite::params![id, text],
        )
        .unwrap();
    }
}

/// Modification time of every entry under `root`, directories included.
pub fn snapshot_mtimes(root: &Path) -> BTreeMap<PathBuf, SystemTime> {
    let mut out = BTreeMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let meta = std::fs::metadata(&dir).unwrap();
        out.insert(dir.clone(), meta.modified().unwrap());
        if !meta.is_dir() {
            continue;
        }
        for entry in std::fs::read_dir(&dir).unwrap() {
            stack.push(entry.unwrap().path());
        }
    }
    out
}
