//! BM25-ranked FTS5 keyword search with a LIKE-substring fallback.

use std::sync::Arc;

use memory_storage::{Storage, Value};
use uuid::Uuid;

use super::SearchFilter;
use crate::error::{Error, Result};
use crate::hashing;

#[derive(Debug, Clone, Copy)]
pub struct KeywordHit {
    pub id: Uuid,
    /// Raw score: `-bm25()` on the FTS5 path (higher is better), or a
    /// keyword match ratio in `[0,1]` on the LIKE fallback path.
    pub raw_score: f64,
}

/// Normalize, tokenize, and filter `query`, then search `memory_items_fts`;
/// on any FTS query error (e.g. a term that trips FTS5's query-syntax
/// parser), fall back to a LIKE-substring scan over title+content.
pub async fn keyword_search(
    storage: &Arc<dyn Storage>,
    query: &str,
    filter: &SearchFilter,
    limit: usize,
) -> Result<Vec<KeywordHit>> {
    let keywords = hashing::extract_keywords(query, crate::constants::keyword_search::MIN_KEYWORD_LENGTH);
    if keywords.is_empty() {
        return Ok(Vec::new());
    }

    match fts_search(storage, &keywords, filter, limit).await {
        Ok(hits) => Ok(hits),
        Err(_) => like_fallback(storage, &keywords, filter, limit).await,
    }
}

fn status_placeholders(excluded: &[crate::types::ItemStatus]) -> String {
    if excluded.is_empty() {
        return String::new();
    }
    let list = excluded
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("AND mi.status NOT IN ({list})")
}

fn kind_clause(kinds: &Option<Vec<crate::types::ItemKind>>) -> String {
    match kinds {
        None => String::new(),
        Some(kinds) if kinds.is_empty() => String::new(),
        Some(kinds) => {
            let list = kinds
                .iter()
                .map(|k| format!("'{}'", k.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("AND mi.kind IN ({list})")
        }
    }
}

fn tag_clause(tags: &Option<Vec<String>>, param_offset: usize) -> (String, Vec<Value>) {
    match tags {
        None => (String::new(), Vec::new()),
        Some(tags) if tags.is_empty() => (String::new(), Vec::new()),
        Some(tags) => {
            let mut clauses = Vec::new();
            let mut params = Vec::new();
            for (i, tag) in tags.iter().enumerate() {
                clauses.push(format!("mi.tags LIKE ?{}", param_offset + i + 1));
                params.push(Value::Text(format!("%{}%", hashing::normalize_tag(tag))));
            }
            (format!("AND ({})", clauses.join(" OR ")), params)
        }
    }
}

async fn fts_search(
    storage: &Arc<dyn Storage>,
    keywords: &[String],
    filter: &SearchFilter,
    limit: usize,
) -> Result<Vec<KeywordHit>> {
    let match_query = keywords.join(" ");
    let status_clause = status_placeholders(&filter.excluded_statuses);
    let kind_sql = kind_clause(&filter.kinds);
    let (tag_sql, tag_params) = tag_clause(&filter.tags, 3);

    let sql = format!(
        "SELECT mi.id, bm25(memory_items_fts) AS rank \
         FROM memory_items_fts \
         JOIN memory_items mi ON mi.id = memory_items_fts.id \
         WHERE memory_items_fts MATCH ?1 \
           AND mi.tenant = ?2 AND mi.project = {proj_placeholder} \
           {status_clause} {kind_sql} {tag_sql} \
         ORDER BY rank \
         LIMIT {limit}",
        proj_placeholder = "?3",
    );

    let mut params = vec![
        Value::Text(match_query),
        Value::Text(filter.tenant.clone()),
        Value::Text(filter.project.clone()),
    ];
    params.extend(tag_params);

    let rows = storage.query(&sql, params).await?;
    let mut hits = Vec::with_capacity(rows.len());
    for row in &rows {
        let id_str: String = row
            .get(0)
            .map_err(|e| Error::Storage(format!("reading fts id: {e}")))?;
        let rank: f64 = row
            .get(1)
            .map_err(|e| Error::Storage(format!("reading bm25 rank: {e}")))?;
        let id = Uuid::parse_str(&id_str).map_err(|e| Error::Storage(e.to_string()))?;
        hits.push(KeywordHit {
            id,
            raw_score: -rank,
        });
    }
    Ok(hits)
}

async fn like_fallback(
    storage: &Arc<dyn Storage>,
    keywords: &[String],
    filter: &SearchFilter,
    limit: usize,
) -> Result<Vec<KeywordHit>> {
    let status_clause = status_placeholders(&filter.excluded_statuses);
    let kind_sql = kind_clause(&filter.kinds);
    let (tag_sql, tag_params) = tag_clause(&filter.tags, 2);

    let sql = format!(
        "SELECT mi.id, mi.title, mi.content FROM memory_items mi \
         WHERE mi.tenant = ?1 AND mi.project = ?2 \
           {status_clause} {kind_sql} {tag_sql}"
    );
    let mut params = vec![Value::Text(filter.tenant.clone()), Value::Text(filter.project.clone())];
    params.extend(tag_params);

    let rows = storage.query(&sql, params).await?;
    let mut hits = Vec::new();
    for row in &rows {
        let id_str: String = row
            .get(0)
            .map_err(|e| Error::Storage(format!("reading id: {e}")))?;
        let title: String = row
            .get(1)
            .map_err(|e| Error::Storage(format!("reading title: {e}")))?;
        let content: String = row
            .get(2)
            .map_err(|e| Error::Storage(format!("reading content: {e}")))?;

        let haystack = hashing::normalize_text(&format!("{title} {content}"));
        let matched = keywords.iter().filter(|kw| haystack.contains(kw.as_str())).count();
        if matched == 0 {
            continue;
        }
        let ratio = matched as f64 / keywords.len() as f64;
        let id = Uuid::parse_str(&id_str).map_err(|e| Error::Storage(e.to_string()))?;
        hits.push(KeywordHit { id, raw_score: ratio });
    }

    hits.sort_by(|a, b| b.raw_score.partial_cmp(&a.raw_score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_placeholders_empty_when_no_exclusions() {
        assert_eq!(status_placeholders(&[]), "");
    }

    #[test]
    fn status_placeholders_lists_quoted_statuses() {
        let clause = status_placeholders(&[crate::types::ItemStatus::Deleted]);
        assert!(clause.contains("'deleted'"));
    }
}
