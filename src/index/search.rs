use rusqlite::types::ToSql;
use serde::Serialize;

use super::CanonicalIndex;
use crate::error::IndexError;

/// Tokens shorter than this are dropped from a relaxed query.
const RELAXED_MIN_TOKEN_LEN: usize = 3;
/// A relaxed query keeps at most this many distinct tokens.
const RELAXED_MAX_TOKENS: usize = 8;

/// Which source tag a search is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    #[default]
    All,
    Memory,
    Sessions,
}

impl SearchSource {
    /// Tag to filter on, or `None` for all sources.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Memory => Some("memory"),
            Self::Sessions => Some("sessions"),
        }
    }
}

/// One FTS hit joined back to its chunk row.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub path: String,
    pub source: String,
    pub start_line: i64,
    pub end_line: i64,
    /// BM25 rank; lower is better.
    pub rank: f64,
    /// Matched text with terms wrapped in `[` `]`.
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub source: SearchSource,
    pub limit: usize,
    pub results: Vec<SearchHit>,
}

impl CanonicalIndex {
    /// FTS5 search over `chunks_fts`, best rank first.
    ///
    /// The query is passed through in native FTS5 syntax. A missing index or a
    /// blank query is an error.
    pub fn fts_search(
        &self,
        query: &str,
        source: SearchSource,
        limit: usize,
    ) -> Result<SearchResponse, IndexError> {
        if !self.exists() {
            return Err(IndexError::Missing(self.path().to_path_buf()));
        }
        if query.trim().is_empty() {
            return Err(IndexError::EmptyQuery);
        }

        let conn = self.connect()?;

        let mut sql = String::from(
            "SELECT chunks.path, chunks.source, chunks.start_line, chunks.end_line, \
             snippet(chunks_fts, 0, '[', ']', ' ... ', 20), bm25(chunks_fts) AS rank \
             FROM chunks_fts \
             JOIN chunks ON chunks_fts.rowid = chunks.rowid \
             WHERE chunks_fts MATCH ?1",
        );
        let limit_param = limit as i64;
        let mut params: Vec<&dyn ToSql> = vec![&query];
        let tag = source.tag();
        if let Some(ref tag) = tag {
            sql.push_str(" AND chunks.source = ?2 ORDER BY rank ASC LIMIT ?3");
            params.push(tag);
        } else {
            sql.push_str(" ORDER BY rank ASC LIMIT ?2");
        }
        params.push(&limit_param);

        let mut stmt = conn.prepare(&sql)?;
        let results = stmt
            .query_map(params.as_slice(), |row| {
                Ok(SearchHit {
                    path: row.get(0)?,
                    source: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    start_line: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                    end_line: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                    snippet: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    rank: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(query, hits = results.len(), "fts search");

        Ok(SearchResponse {
            query: query.to_string(),
            source,
            limit,
            results,
        })
    }

    /// Re-run a search with the OR-joined token form of `query`.
    ///
    /// Callers use this only after [`CanonicalIndex::fts_search`] came back empty.
    /// The response's `query` field carries the relaxed form.
    pub fn relaxed_fts_search(
        &self,
        query: &str,
        source: SearchSource,
        limit: usize,
    ) -> Result<SearchResponse, IndexError> {
        self.fts_search(&relaxed_query(query), source, limit)
    }
}

/// Loosen a query for a second FTS attempt.
///
/// Extracts runs of `[A-Za-z0-9_]`, lowercases them, drops tokens shorter than three
/// characters, dedups in order, keeps the first eight and joins them with ` OR `.
/// Returns the query unchanged when no token survives.
pub fn relaxed_query(raw: &str) -> String {
    let mut keep: Vec<String> = Vec::new();
    let tokens = raw
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| t.len() >= RELAXED_MIN_TOKEN_LEN)
        .map(|t| t.to_ascii_lowercase());

    for tok in tokens {
        if !keep.contains(&tok) {
            keep.push(tok);
        }
    }

    if keep.is_empty() {
        return raw.to_string();
    }
    keep.truncate(RELAXED_MAX_TOKENS);
    keep.join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relaxed_query_joins_tokens() {
        assert_eq!(
            relaxed_query("Moltbook harvest memory tiering poisoning defense"),
            "moltbook OR harvest OR memory OR tiering OR poisoning OR defense"
        );
    }

    #[test]
    fn relaxed_query_drops_short_and_duplicate_tokens() {
        assert_eq!(
            relaxed_query("PRATYABHIJNA R_V measurement: scope, Scope, of it"),
            "pratyabhijna OR r_v OR measurement OR scope"
        );
    }

    #[test]
    fn relaxed_query_caps_at_eight_tokens() {
        let q = "one two three four five six seven eight nine ten eleven twelve";
        let relaxed = relaxed_query(q);
        assert_eq!(relaxed.split(" OR ").count(), 8);
        assert!(relaxed.starts_with("one OR two OR three"));
        assert!(!relaxed.contains("twelve"));
    }

    #[test]
    fn relaxed_query_keeps_original_when_nothing_survives() {
        assert_eq!(relaxed_query("a b c"), "a b c");
        assert_eq!(relaxed_query("?? !!"), "?? !!");
    }

    #[test]
    fn relaxed_query_splits_on_non_ascii() {
        assert_eq!(relaxed_query("café_bar naïve"), "caf OR _bar");
    }

    #[test]
    fn source_tags() {
        assert_eq!(SearchSource::All.tag(), None);
        assert_eq!(SearchSource::Memory.tag(), Some("memory"));
        assert_eq!(SearchSource::Sessions.tag(), Some("sessions"));
    }
}
