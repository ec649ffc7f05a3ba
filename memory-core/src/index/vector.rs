//! Brute-force cosine scan over stored embeddings.
//!
//! No ANN index: the spec scopes this to a single-process store with a
//! bounded item count per project, where a linear scan is simpler and fast
//! enough, and keeps ranking deterministic when a vector backend degrades.

use std::sync::Arc;

use memory_storage::{Storage, Value};
use uuid::Uuid;

use super::SearchFilter;
use crate::embeddings::similarity::cosine_similarity;
use crate::error::{Error, Result};
use crate::hashing;

#[derive(Debug, Clone, Copy)]
pub struct VectorHit {
    pub id: Uuid,
    /// Cosine similarity rescaled from `[-1,1]` to `[0,1]`.
    pub score: f64,
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
    format!("AND status NOT IN ({list})")
}

fn kind_clause(kinds: &Option<Vec<crate::types::ItemKind>>) -> String {
    match kinds {
        Some(kinds) if !kinds.is_empty() => {
            let list = kinds
                .iter()
                .map(|k| format!("'{}'", k.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("AND kind IN ({list})")
        }
        _ => String::new(),
    }
}

/// Scan all items in `(tenant, project)` that pass the status/kind filter
/// and carry a stored embedding, scoring each against `query_vector`. Tag
/// filtering is applied after scoring, per spec.md §4.2.
pub async fn vector_search(
    storage: &Arc<dyn Storage>,
    query_vector: &[f32],
    filter: &SearchFilter,
    limit: usize,
) -> Result<Vec<VectorHit>> {
    let status_clause = status_placeholders(&filter.excluded_statuses);
    let kind_sql = kind_clause(&filter.kinds);

    let sql = format!(
        "SELECT id, tags, embedding FROM memory_items \
         WHERE tenant = ?1 AND project = ?2 AND embedding IS NOT NULL \
           {status_clause} {kind_sql}"
    );
    let rows = storage
        .query(
            &sql,
            vec![Value::Text(filter.tenant.clone()), Value::Text(filter.project.clone())],
        )
        .await?;

    let required_tags: Option<Vec<String>> = filter
        .tags
        .as_ref()
        .map(|tags| tags.iter().map(|t| hashing::normalize_tag(t)).collect());

    let mut hits = Vec::new();
    for row in &rows {
        let id_str: String = row
            .get(0)
            .map_err(|e| Error::Storage(format!("reading id: {e}")))?;
        let tags_json: String = row
            .get(1)
            .map_err(|e| Error::Storage(format!("reading tags: {e}")))?;
        let embedding_blob: Vec<u8> = row
            .get(2)
            .map_err(|e| Error::Storage(format!("reading embedding: {e}")))?;

        if let Some(ref required) = required_tags {
            let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
            if !required.iter().any(|rt| tags.iter().any(|t| t == rt)) {
                continue;
            }
        }

        let embedding: Vec<f32> = embedding_blob
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        if embedding.len() != query_vector.len() {
            continue;
        }

        let cos = cosine_similarity(query_vector, &embedding);
        let score = f64::from((cos + 1.0) / 2.0);
        let id = Uuid::parse_str(&id_str).map_err(|e| Error::Storage(e.to_string()))?;
        hits.push(VectorHit { id, score });
    }

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    Ok(hits)
}
