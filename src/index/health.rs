use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::CanonicalIndex;
use crate::error::IndexError;

/// How many of the most recently modified `files` rows the health report lists.
const RECENT_FILES_LIMIT: usize = 12;

/// Health report for the canonical index.
#[derive(Debug, Clone, Serialize)]
pub struct DbHealth {
    pub db_path: String,
    pub exists: bool,
    pub size_bytes: u64,
    pub size_human: String,
    pub files_by_source: BTreeMap<String, u64>,
    pub chunks_by_source: BTreeMap<String, u64>,
    pub recent_indexed_files: Vec<IndexedFile>,
    /// `ok`, `unavailable: <reason>`, or `unknown` when the index could not be read.
    pub vec_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexedFile {
    pub path: String,
    pub source: String,
    /// Stored as the runtime wrote it (epoch millis in current OpenClaw builds).
    pub mtime: serde_json::Value,
    pub size_bytes: i64,
}

impl Default for DbHealth {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            exists: false,
            size_bytes: 0,
            size_human: "0B".into(),
            files_by_source: BTreeMap::new(),
            chunks_by_source: BTreeMap::new(),
            recent_indexed_files: Vec::new(),
            vec_status: "unknown".into(),
            error: None,
        }
    }
}

impl DbHealth {
    pub fn vec_ok(&self) -> bool {
        self.vec_status == "ok"
    }

    pub fn vec_unavailable(&self) -> bool {
        self.vec_status.starts_with("unavailable:")
    }
}

impl CanonicalIndex {
    /// Collect counts, recency and vector status. Never fails: an absent index
    /// reports `exists: false`, and read errors land in `error`.
    pub fn db_health(&self) -> DbHealth {
        let mut out = DbHealth {
            db_path: self.path().display().to_string(),
            ..Default::default()
        };

        let Some(size) = file_size(self.path()) else {
            return out;
        };
        out.exists = true;
        out.size_bytes = size;
        out.size_human = bytes_to_human(size);

        if let Err(e) = self.fill_health(&mut out) {
            tracing::warn!(path = %self.path().display(), error = %e, "index health check degraded");
            out.error = Some(e.to_string());
        }
        out
    }

    fn fill_health(&self, out: &mut DbHealth) -> Result<(), IndexError> {
        let conn = self.connect()?;
        out.files_by_source = count_by_source(&conn, "files")?;
        out.chunks_by_source = count_by_source(&conn, "chunks")?;
        out.recent_indexed_files = recent_files(&conn, RECENT_FILES_LIMIT)?;
        out.vec_status = vec_status(&conn);
        Ok(())
    }
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_file())
        .map(|m| m.len())
}

/// Row counts grouped by source tag. `table` is one of our own constants.
fn count_by_source(conn: &Connection, table: &str) -> Result<BTreeMap<String, u64>, IndexError> {
    let sql = format!("SELECT source, COUNT(*) FROM {table} GROUP BY source");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                row.get::<_, i64>(1)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .map(|(source, count)| (source, count as u64))
        .collect())
}

fn recent_files(conn: &Connection, limit: usize) -> Result<Vec<IndexedFile>, IndexError> {
    let mut stmt =
        conn.prepare("SELECT path, source, mtime, size FROM files ORDER BY mtime DESC LIMIT ?1")?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(IndexedFile {
                path: row.get(0)?,
                source: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                mtime: sql_to_json(row.get(2)?),
                size_bytes: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Probe the vector relation. Any failure is a degradation, never an error.
fn vec_status(conn: &Connection) -> String {
    match conn.query_row("SELECT COUNT(*) FROM chunks_vec", [], |row| {
        row.get::<_, i64>(0)
    }) {
        Ok(_) => "ok".into(),
        Err(e) => format!("unavailable: {e}"),
    }
}

fn sql_to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => i.into(),
        Value::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => s.into(),
        Value::Blob(b) => format!("<{} bytes>", b.len()).into(),
    }
}

/// Human-readable size: `512B`, `1.50KB`, `3.00MB`.
pub fn bytes_to_human(size: u64) -> String {
    const SUFFIXES: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut v = size as f64;
    let mut i = 0;
    while v >= 1024.0 && i < SUFFIXES.len() - 1 {
        v /= 1024.0;
        i += 1;
    }
    if i == 0 {
        format!("{size}B")
    } else {
        format!("{v:.2}{}", SUFFIXES[i])
    }
}
