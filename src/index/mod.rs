//! Read-only client for the canonical OpenClaw index.
//!
//! The index is owned by the agent runtime. It holds a `files` table, a `chunks`
//! table mirrored into the `chunks_fts` FTS5 relation, and optionally a `chunks_vec`
//! vec0 relation. This module never opens it for writing.

pub mod health;
pub mod search;

use rusqlite::{Connection, OpenFlags};
use sqlite_vec::sqlite3_vec_init;
use std::path::{Path, PathBuf};
use std::sync::Once;

use crate::error::IndexError;

pub use health::{bytes_to_human, DbHealth, IndexedFile};
pub use search::{relaxed_query, SearchHit, SearchResponse, SearchSource};

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
///
/// Without it a `chunks_vec` relation created by the runtime reads as
/// `no such module: vec0`.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open an existing SQLite file read-only. Never creates the file.
pub fn open_read_only(path: impl AsRef<Path>) -> Result<Connection, IndexError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(IndexError::Missing(path.to_path_buf()));
    }

    load_sqlite_vec();

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    tracing::debug!(path = %path.display(), "opened index read-only");
    Ok(conn)
}

/// Handle on the canonical index at a fixed path.
///
/// Each operation opens its own short-lived connection so external writers are
/// never blocked for longer than one query.
#[derive(Debug, Clone)]
pub struct CanonicalIndex {
    path: PathBuf,
}

impl CanonicalIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn connect(&self) -> Result<Connection, IndexError> {
        open_read_only(&self.path)
    }
}
