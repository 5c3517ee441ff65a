//! Recall benchmark over a fixed query set.
//!
//! Each query is tried verbatim first. Only when that returns nothing is it retried
//! in its relaxed OR form (see [`relaxed_query`]). A query counts as recalled when
//! either attempt returns at least one hit.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

use crate::error::IndexError;
use crate::index::{relaxed_query, CanonicalIndex, SearchHit, SearchSource};
use crate::time::round_to;

/// Recall below this is flagged in recommendations and TODOs.
pub const RECALL_TARGET: f64 = 0.75;

/// Probes used when neither `--query` nor a queries file supplies any.
pub const DEFAULT_QUERIES: [&str; 6] = [
    "Moltbook harvest memory tiering poisoning defense",
    "DGC payload spec trust gradient",
    "SAB hardening smoke test imports pytest",
    "PRATYABHIJNA R_V measurement scope correction",
    "agent identity schema modular registration",
    "bridge DGC scores reputation graph",
];

/// The search seam the benchmark runs against.
pub trait FtsSearch {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, IndexError>;

    /// Search the relaxed form of `query`, returning the query actually run.
    fn relaxed_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<(String, Vec<SearchHit>), IndexError> {
        let relaxed = relaxed_query(query);
        let hits = self.search(&relaxed, limit)?;
        Ok((relaxed, hits))
    }
}

impl FtsSearch for CanonicalIndex {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, IndexError> {
        Ok(self.fts_search(query, SearchSource::All, limit)?.results)
    }

    fn relaxed_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<(String, Vec<SearchHit>), IndexError> {
        let resp = self.relaxed_fts_search(query, SearchSource::All, limit)?;
        Ok((resp.query, resp.results))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkRow {
    pub query: String,
    /// The query that produced `hits`: either `query` or its relaxed form.
    pub query_used: String,
    pub hits: usize,
    pub top_path: Option<String>,
    pub top_source: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BenchmarkReport {
    pub queries_total: usize,
    pub queries_with_hits: usize,
    /// Rounded to 3 decimals; 0.0 for an empty query set.
    pub recall_rate: f64,
    pub rows: Vec<BenchmarkRow>,
}

impl BenchmarkReport {
    pub fn misses(&self) -> impl Iterator<Item = &BenchmarkRow> {
        self.rows.iter().filter(|r| r.hits == 0)
    }
}

pub fn run_benchmark(searcher: &dyn FtsSearch, queries: &[String], limit: usize) -> BenchmarkReport {
    let rows: Vec<BenchmarkRow> = queries
        .iter()
        .map(|q| match probe(searcher, q, limit) {
            Ok((query_used, hits)) => BenchmarkRow {
                query: q.clone(),
                query_used,
                hits: hits.len(),
                top_path: hits.first().map(|h| h.path.clone()),
                top_source: hits.first().map(|h| h.source.clone()),
                error: None,
            },
            Err(e) => {
                tracing::warn!(query = %q, error = %e, "benchmark query failed");
                BenchmarkRow {
                    query: q.clone(),
                    query_used: q.clone(),
                    hits: 0,
                    top_path: None,
                    top_source: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    let total = rows.len();
    let with_hits = rows.iter().filter(|r| r.hits > 0).count();
    let recall_rate = if total == 0 {
        0.0
    } else {
        round_to(with_hits as f64 / total as f64, 3)
    };

    BenchmarkReport {
        queries_total: total,
        queries_with_hits: with_hits,
        recall_rate,
        rows,
    }
}

/// Verbatim attempt, then relaxed attempt if that was empty and actually differs.
fn probe(
    searcher: &dyn FtsSearch,
    query: &str,
    limit: usize,
) -> Result<(String, Vec<SearchHit>), IndexError> {
    let hits = searcher.search(query, limit)?;
    if !hits.is_empty() {
        return Ok((query.to_string(), hits));
    }
    if relaxed_query(query) == query {
        return Ok((query.to_string(), hits));
    }
    searcher.relaxed_search(query, limit)
}

/// Build the benchmark query set.
///
/// Explicit queries come first, then non-empty, non-`#` lines of the queries file.
/// Duplicates are dropped keeping the first occurrence. An empty result falls back
/// to [`DEFAULT_QUERIES`]. A queries file that does not exist is ignored.
pub fn read_queries(explicit: &[String], queries_file: Option<&Path>) -> Result<Vec<String>> {
    let mut raw: Vec<String> = explicit
        .iter()
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect();

    if let Some(path) = queries_file {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read queries file {}", path.display()))?;
            raw.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(str::to_string),
            );
        } else {
            tracing::warn!(path = %path.display(), "queries file not found, ignoring");
        }
    }

    if raw.is_empty() {
        raw = DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect();
    }

    let mut seen = HashSet::new();
    raw.retain(|q| seen.insert(q.clone()));
    Ok(raw)
}
