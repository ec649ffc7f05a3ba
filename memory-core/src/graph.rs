//! Knowledge graph: typed directed edges between items, multi-hop
//! traversal, and relation suggestion.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use memory_storage::{Storage, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::index::{keyword::keyword_search, SearchFilter};
use crate::row::item_from_row;
use crate::types::{ItemKind, ItemStatus, MemoryLink, Relation};

/// One step of a graph traversal, carrying the full path taken to reach it.
#[derive(Debug, Clone)]
pub struct TraversalStep {
    pub id: Uuid,
    pub hop: usize,
    pub path: Vec<Uuid>,
    pub relation: Relation,
    pub weight: f32,
}

/// Upsert an edge `(from, to, relation)`. Re-running with a new `weight` or
/// `metadata` overwrites the prior values; `(from, to, relation)` is unique.
pub async fn add_relation(
    storage: &Arc<dyn Storage>,
    link: &MemoryLink,
) -> Result<()> {
    storage
        .exec(
            "INSERT INTO memory_links (from_id, to_id, relation, weight, metadata, auto_created, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(from_id, to_id, relation) DO UPDATE SET \
               weight = excluded.weight, metadata = excluded.metadata",
            vec![
                Value::Text(link.from_id.to_string()),
                Value::Text(link.to_id.to_string()),
                Value::Text(link.relation.as_str().to_string()),
                Value::Real(f64::from(link.weight)),
                Value::Text(link.metadata.to_string()),
                Value::Integer(i64::from(link.auto_created)),
                Value::Integer(link.created_at),
            ],
        )
        .await?;
    Ok(())
}

async fn outgoing_edges(
    storage: &Arc<dyn Storage>,
    from: Uuid,
    relation_set: Option<&[Relation]>,
) -> Result<Vec<(Uuid, Relation, f32)>> {
    let rows = storage
        .query(
            "SELECT to_id, relation, weight FROM memory_links WHERE from_id = ?1",
            vec![Value::Text(from.to_string())],
        )
        .await?;

    let mut edges = Vec::new();
    for row in &rows {
        let to_str: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
        let relation_str: String = row.get(1).map_err(|e| Error::Storage(e.to_string()))?;
        let weight: f64 = row.get(2).map_err(|e| Error::Storage(e.to_string()))?;

        let to_id = Uuid::parse_str(&to_str).map_err(|e| Error::Storage(e.to_string()))?;
        let relation = Relation::parse(&relation_str)
            .ok_or_else(|| Error::Storage(format!("unknown relation: {relation_str}")))?;

        if let Some(set) = relation_set {
            if !set.contains(&relation) {
                continue;
            }
        }
        edges.push((to_id, relation, weight as f32));
    }
    Ok(edges)
}

/// Breadth-first walk from `start`, never revisiting a node, bounded by
/// `max_hops`. Restricting `relation_set` to a subset of relations limits
/// which edges are followed.
pub async fn traverse_graph(
    storage: &Arc<dyn Storage>,
    start: Uuid,
    max_hops: usize,
    relation_set: Option<&[Relation]>,
) -> Result<Vec<TraversalStep>> {
    let mut visited = HashSet::new();
    visited.insert(start);

    let mut queue = VecDeque::new();
    queue.push_back((start, 0usize, vec![start]));

    let mut results = Vec::new();

    while let Some((current, hop, path)) = queue.pop_front() {
        if hop >= max_hops {
            continue;
        }
        for (to_id, relation, weight) in outgoing_edges(storage, current, relation_set).await? {
            if visited.contains(&to_id) {
                continue;
            }
            visited.insert(to_id);
            let mut next_path = path.clone();
            next_path.push(to_id);
            results.push(TraversalStep {
                id: to_id,
                hop: hop + 1,
                path: next_path.clone(),
                relation,
                weight,
            });
            queue.push_back((to_id, hop + 1, next_path));
        }
    }

    Ok(results)
}

/// `(kind_from, kind_to) -> (relation, confidence)` rule table consulted by
/// [`suggest_relations`].
fn suggest_relation_for_kinds(from_kind: ItemKind, to_kind: ItemKind) -> (Relation, f32) {
    match (from_kind, to_kind) {
        (ItemKind::Episode, ItemKind::Runbook) => (Relation::DependsOn, 0.6),
        (ItemKind::Runbook, ItemKind::Episode) => (Relation::Causes, 0.5),
        (ItemKind::Decision, ItemKind::Decision) => (Relation::Supersedes, 0.4),
        (ItemKind::State, ItemKind::State) => (Relation::Contradicts, 0.4),
        (ItemKind::Fact, ItemKind::Fact) => (Relation::RelatedTo, 0.45),
        _ => (Relation::RelatedTo, 0.4),
    }
}

#[derive(Debug, Clone)]
pub struct RelationSuggestion {
    pub to_id: Uuid,
    pub relation: Relation,
    pub confidence: f32,
}

/// Find candidates via the keyword index against the item's own title, then
/// propose a relation type per the kind-pair rule table. Confidence is
/// static per rule, not learned.
pub async fn suggest_relations(
    storage: &Arc<dyn Storage>,
    tenant: &str,
    project: &str,
    item_id: Uuid,
    item_title: &str,
    item_kind: ItemKind,
    min_confidence: f32,
    max_suggestions: usize,
) -> Result<Vec<RelationSuggestion>> {
    let filter = SearchFilter {
        tenant: tenant.to_string(),
        project: project.to_string(),
        excluded_statuses: vec![ItemStatus::Deleted, ItemStatus::Quarantined],
        kinds: None,
        tags: None,
    };

    let hits = keyword_search(storage, item_title, &filter, max_suggestions * 4).await?;

    let mut suggestions = Vec::new();
    for hit in hits {
        if hit.id == item_id {
            continue;
        }
        let row = storage
            .query_one(
                "SELECT kind FROM memory_items WHERE id = ?1",
                vec![Value::Text(hit.id.to_string())],
            )
            .await?;
        let Some(row) = row else { continue };
        let kind_str: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
        let Some(to_kind) = ItemKind::parse(&kind_str) else {
            continue;
        };

        let (relation, confidence) = suggest_relation_for_kinds(item_kind, to_kind);
        if confidence < min_confidence {
            continue;
        }
        suggestions.push(RelationSuggestion {
            to_id: hit.id,
            relation,
            confidence,
        });
        if suggestions.len() >= max_suggestions {
            break;
        }
    }

    Ok(suggestions)
}

/// All `contradicts` edges whose endpoints are both still active.
pub async fn find_conflicts(storage: &Arc<dyn Storage>, tenant: &str, project: &str) -> Result<Vec<MemoryLink>> {
    let rows = storage
        .query(
            "SELECT l.from_id, l.to_id, l.relation, l.weight, l.metadata, l.auto_created, l.created_at \
             FROM memory_links l \
             JOIN memory_items a ON a.id = l.from_id \
             JOIN memory_items b ON b.id = l.to_id \
             WHERE l.relation = 'contradicts' \
               AND a.tenant = ?1 AND a.project = ?2 AND a.status = 'active' \
               AND b.tenant = ?1 AND b.project = ?2 AND b.status = 'active'",
            vec![Value::Text(tenant.to_string()), Value::Text(project.to_string())],
        )
        .await?;

    let mut links = Vec::with_capacity(rows.len());
    for row in &rows {
        let from_str: String = row.get(0).map_err(|e| Error::Storage(e.to_string()))?;
        let to_str: String = row.get(1).map_err(|e| Error::Storage(e.to_string()))?;
        let relation_str: String = row.get(2).map_err(|e| Error::Storage(e.to_string()))?;
        let weight: f64 = row.get(3).map_err(|e| Error::Storage(e.to_string()))?;
        let metadata_json: String = row.get(4).map_err(|e| Error::Storage(e.to_string()))?;
        let auto_created: i64 = row.get(5).map_err(|e| Error::Storage(e.to_string()))?;
        let created_at: i64 = row.get(6).map_err(|e| Error::Storage(e.to_string()))?;

        links.push(MemoryLink {
            from_id: Uuid::parse_str(&from_str).map_err(|e| Error::Storage(e.to_string()))?,
            to_id: Uuid::parse_str(&to_str).map_err(|e| Error::Storage(e.to_string()))?,
            relation: Relation::parse(&relation_str)
                .ok_or_else(|| Error::Storage(format!("unknown relation: {relation_str}")))?,
            weight: weight as f32,
            metadata: serde_json::from_str(&metadata_json)?,
            auto_created: auto_created != 0,
            created_at,
        });
    }
    Ok(links)
}

/// Fetch the top `limit` items by keyword relevance, for callers (auto-link
/// suggestion on insert) that need full rows rather than identifiers.
pub async fn fetch_items(storage: &Arc<dyn Storage>, ids: &[Uuid]) -> Result<Vec<crate::types::MemoryItem>> {
    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(row) = storage
            .query_one("SELECT * FROM memory_items WHERE id = ?1", vec![Value::Text(id.to_string())])
            .await?
        {
            items.push(item_from_row(&row)?);
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggest_relation_picks_depends_on_for_episode_to_runbook() {
        let (relation, _) = suggest_relation_for_kinds(ItemKind::Episode, ItemKind::Runbook);
        assert_eq!(relation, Relation::DependsOn);
    }

    #[test]
    fn suggest_relation_default_is_related_to() {
        let (relation, _) = suggest_relation_for_kinds(ItemKind::Runbook, ItemKind::State);
        assert_eq!(relation, Relation::RelatedTo);
    }
}
