use std::path::PathBuf;

/// Failures of the canonical index client that callers branch on.
///
/// The audit path treats all of these as degradations; interactive search
/// surfaces them to the operator and exits non-zero.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("canonical DB not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("query must be non-empty")]
    EmptyQuery,

    #[error("index query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
