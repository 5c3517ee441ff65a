use crate::config::ResolvedPaths;
use crate::index::CanonicalIndex;

/// Resolved workspace and index handle shared by every command.
///
/// Holds no mutable state; hygiene, audit and benchmark operations are
/// implemented on it in their own modules.
#[derive(Debug, Clone)]
pub struct ControlPlane {
    paths: ResolvedPaths,
    index: CanonicalIndex,
}

impl ControlPlane {
    pub fn new(paths: ResolvedPaths) -> Self {
        let index = CanonicalIndex::new(&paths.canonical_db_path);
        Self { paths, index }
    }

    pub fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }

    pub fn index(&self) -> &CanonicalIndex {
        &self.index
    }
}
