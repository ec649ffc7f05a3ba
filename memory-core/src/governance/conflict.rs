//! The `conflict` maintenance action: same-title different-content states
//! become `contradicts` edges; decisions with opposing keywords are
//! heuristically flagged.

use std::collections::HashMap;
use std::sync::Arc;

use memory_storage::{Storage, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::graph::add_relation;
use crate::row::item_from_row;
use crate::types::{ConflictType, ItemKind, MemoryLink, ModelConflict, Relation};

/// Pairs of words whose simultaneous presence across two decisions' content
/// suggests they disagree (e.g. one enables what the other disables).
const OPPOSING_PAIRS: &[(&str, &str)] = &[
    ("enable", "disable"),
    ("enabled", "disabled"),
    ("yes", "no"),
    ("allow", "deny"),
    ("allowed", "denied"),
    ("true", "false"),
];

#[derive(Debug, Clone, Default)]
pub struct ConflictReport {
    pub contradicting_states: usize,
    pub flagged_decisions: usize,
}

/// Scan active `state` items for same-title, different-content pairs and
/// create `contradicts` edges between them; scan active `decision` pairs
/// for opposing-keyword content and record a `ModelConflict` row.
pub async fn run_conflict_detection(
    storage: &Arc<dyn Storage>,
    tenant: &str,
    project: &str,
    now: i64,
) -> Result<ConflictReport> {
    let mut report = ConflictReport::default();

    let state_rows = storage
        .query(
            "SELECT * FROM memory_items WHERE tenant = ?1 AND project = ?2 AND status = 'active' AND kind = 'state'",
            vec![Value::Text(tenant.to_string()), Value::Text(project.to_string())],
        )
        .await?;

    let mut by_title: HashMap<String, Vec<(Uuid, String)>> = HashMap::new();
    for row in &state_rows {
        let item = item_from_row(row)?;
        by_title
            .entry(item.title.to_lowercase())
            .or_default()
            .push((item.id, item.content_hash));
    }

    for group in by_title.values() {
        if group.len() < 2 {
            continue;
        }
        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                let (id_a, hash_a) = &group[i];
                let (id_b, hash_b) = &group[j];
                if hash_a == hash_b {
                    continue;
                }
                add_relation(
                    storage,
                    &MemoryLink {
                        from_id: *id_a,
                        to_id: *id_b,
                        relation: Relation::Contradicts,
                        weight: 0.5,
                        metadata: serde_json::json!({"reason": "same_title_different_content"}),
                        auto_created: true,
                        created_at: now,
                    },
                )
                .await?;
                report.contradicting_states += 1;
            }
        }
    }

    let decision_rows = storage
        .query(
            "SELECT * FROM memory_items WHERE tenant = ?1 AND project = ?2 AND status = 'active' AND kind = 'decision'",
            vec![Value::Text(tenant.to_string()), Value::Text(project.to_string())],
        )
        .await?;

    let decisions: Vec<_> = decision_rows
        .iter()
        .map(item_from_row)
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .filter(|item| is_decision_kind(item.kind))
        .collect();

    for i in 0..decisions.len() {
        for j in (i + 1)..decisions.len() {
            if has_opposing_keywords(&decisions[i].content, &decisions[j].content) {
                let conflict = ModelConflict::canonical(
                    decisions[i].id,
                    decisions[j].id,
                    ConflictType::Contradiction,
                    tenant.to_string(),
                    project.to_string(),
                    now,
                );
                persist_conflict(storage, &conflict).await?;
                report.flagged_decisions += 1;
            }
        }
    }

    Ok(report)
}

fn has_opposing_keywords(a: &str, b: &str) -> bool {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    OPPOSING_PAIRS.iter().any(|(x, y)| {
        (a_lower.contains(x) && b_lower.contains(y)) || (a_lower.contains(y) && b_lower.contains(x))
    })
}

async fn persist_conflict(storage: &Arc<dyn Storage>, conflict: &ModelConflict) -> Result<()> {
    storage
        .exec(
            "INSERT INTO model_conflicts (item_a, item_b, conflict_type, resolution_status, tenant, project, created_at) \
             VALUES (?1, ?2, ?3, 'open', ?4, ?5, ?6) \
             ON CONFLICT(item_a, item_b, conflict_type) DO NOTHING",
            vec![
                Value::Text(conflict.item_a.to_string()),
                Value::Text(conflict.item_b.to_string()),
                Value::Text(match conflict.conflict_type {
                    ConflictType::Interpretation => "interpretation",
                    ConflictType::Contradiction => "contradiction",
                    ConflictType::Version => "version",
                }.to_string()),
                Value::Text(conflict.tenant.clone()),
                Value::Text(conflict.project.clone()),
                Value::Integer(conflict.created_at),
            ],
        )
        .await
        .map_err(Error::from)?;
    Ok(())
}

#[must_use]
pub fn is_decision_kind(kind: ItemKind) -> bool {
    kind == ItemKind::Decision
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_enable_disable_opposition() {
        assert!(has_opposing_keywords("enable auto-deploy", "disable auto-deploy"));
    }

    #[test]
    fn unrelated_content_is_not_opposing() {
        assert!(!has_opposing_keywords("use postgres", "use redis"));
    }
}
