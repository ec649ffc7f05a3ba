//! `memory_maintain`: the fixed fourteen-action maintenance pipeline
//! (spec.md §4.8), run under the project's maintenance lock.

use std::collections::HashSet;
use std::sync::Arc;

use memory_storage::{schema, Storage, Value};
use uuid::Uuid;

use crate::cache::ItemCache;
use crate::constants::{fuzzy_match, policy, MAINTENANCE_ACTION_ORDER};
use crate::embeddings::similarity::cosine_similarity;
use crate::error::{Error, Result};
use crate::governance::guardrails::check_loop_breaker;
use crate::governance::conflict::run_conflict_detection;
use crate::governance::lifecycle::PolicyThresholds;
use crate::governance::prune::run_prune;
use crate::hashing::{extract_keywords, jaccard_similarity};
use crate::row::item_from_row;
use crate::types::{ItemKind, MemoryItem};

#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub actions_run: Vec<String>,
    pub dedup_removed: usize,
    pub conflicts_found: usize,
    pub pruned: usize,
    pub compacted: usize,
    pub loopbreaker_quarantined: usize,
    pub links_cleaned: usize,
    pub guardrails_created: usize,
    pub archived_candidates: usize,
    pub consolidated_clusters: usize,
    pub audit_rows_trimmed: usize,
    pub cross_type_links: usize,
    pub fts_rebuilt: bool,
    pub wal_checkpointed: bool,
    pub vacuumed: bool,
}

pub struct MaintenanceContext<'a> {
    pub storage: &'a Arc<dyn Storage>,
    pub cache: &'a ItemCache,
    pub tenant: &'a str,
    pub project: &'a str,
    pub thresholds: &'a PolicyThresholds,
    pub now: i64,
}

/// Run the requested subset of `actions` in the fixed order
/// `MAINTENANCE_ACTION_ORDER` regardless of the order the caller listed
/// them in. In `dry_run`, mutating actions skip their writes but still
/// populate the report's counts where that is cheap to compute.
pub async fn run_maintenance(ctx: &MaintenanceContext<'_>, actions: &[String], dry_run: bool) -> Result<MaintenanceReport> {
    let requested: HashSet<&str> = actions.iter().map(String::as_str).collect();
    let mut report = MaintenanceReport::default();

    for action in MAINTENANCE_ACTION_ORDER {
        if !requested.contains(action) {
            continue;
        }
        report.actions_run.push((*action).to_string());

        match *action {
            "dedup" => report.dedup_removed = run_dedup(ctx, dry_run).await?,
            "conflict" => {
                let result = run_conflict_detection(ctx.storage, ctx.tenant, ctx.project, ctx.now).await?;
                report.conflicts_found = result.contradicting_states + result.flagged_decisions;
            }
            "prune" => {
                let result = run_prune(ctx.storage, ctx.tenant, ctx.project, ctx.thresholds, ctx.now, dry_run).await?;
                report.pruned = result.transitioned;
            }
            "compact" => report.compacted = run_compact(ctx, dry_run).await?,
            "loopbreak" => {
                let result = check_loop_breaker(
                    ctx.storage,
                    ctx.tenant,
                    ctx.project,
                    policy::QUARANTINE_ON_WRONG_THRESHOLD,
                    ctx.now,
                )
                .await?;
                report.loopbreaker_quarantined = result.quarantined_items;
            }
            "clean_links" => report.links_cleaned = run_clean_links(ctx, dry_run).await?,
            "auto_guardrails" => report.guardrails_created = run_auto_guardrails(ctx, dry_run).await?,
            "archive" => report.archived_candidates = count_archive_candidates(ctx).await?,
            "consolidate" => report.consolidated_clusters = run_consolidate(ctx, dry_run).await?,
            "audit_trim" => report.audit_rows_trimmed = run_audit_trim(ctx, dry_run).await?,
            "cross_type_overlap" => report.cross_type_links = run_cross_type_overlap(ctx, dry_run).await?,
            "rebuild_fts" => {
                if !dry_run {
                    ctx.storage.exec(schema::REBUILD_MEMORY_ITEMS_FTS, vec![]).await.map_err(Error::from)?;
                }
                report.fts_rebuilt = true;
            }
            "wal_checkpoint" => {
                if !dry_run {
                    ctx.storage.exec("PRAGMA wal_checkpoint(TRUNCATE)", vec![]).await.map_err(Error::from)?;
                }
                report.wal_checkpointed = true;
            }
            "vacuum" => {
                if !dry_run {
                    ctx.storage.exec("VACUUM", vec![]).await.map_err(Error::from)?;
                }
                report.vacuumed = true;
            }
            _ => {}
        }
    }

    if !dry_run {
        ctx.cache.clear();
    }

    Ok(report)
}

async fn active_items(ctx: &MaintenanceContext<'_>) -> Result<Vec<MemoryItem>> {
    let rows = ctx
        .storage
        .query(
            "SELECT * FROM memory_items WHERE tenant = ?1 AND project = ?2 AND status = 'active'",
            vec![Value::Text(ctx.tenant.to_string()), Value::Text(ctx.project.to_string())],
        )
        .await?;
    rows.iter().map(item_from_row).collect()
}

async fn soft_delete(ctx: &MaintenanceContext<'_>, id: Uuid, reason: &str) -> Result<()> {
    ctx.storage
        .exec(
            "UPDATE memory_items SET status = 'deleted', status_reason = ?1, updated_at = ?2 WHERE id = ?3",
            vec![Value::Text(reason.to_string()), Value::Integer(ctx.now), Value::Text(id.to_string())],
        )
        .await
        .map_err(Error::from)?;
    Ok(())
}

/// Group active items by `(kind, content_hash)`; keep the best ranked by
/// `verified desc, usefulness_score desc, version desc, updated_at desc`
/// and soft-delete the rest.
async fn run_dedup(ctx: &MaintenanceContext<'_>, dry_run: bool) -> Result<usize> {
    let items = active_items(ctx).await?;
    let mut groups: std::collections::HashMap<(ItemKind, String), Vec<MemoryItem>> = std::collections::HashMap::new();
    for item in items {
        groups.entry((item.kind, item.content_hash.clone())).or_default().push(item);
    }

    let mut removed = 0;
    for group in groups.into_values() {
        if group.len() < 2 {
            continue;
        }
        let mut ranked = group;
        ranked.sort_by(|a, b| {
            b.verified
                .cmp(&a.verified)
                .then(b.usefulness_score.partial_cmp(&a.usefulness_score).unwrap_or(std::cmp::Ordering::Equal))
                .then(b.version.cmp(&a.version))
                .then(b.updated_at.cmp(&a.updated_at))
        });
        for loser in &ranked[1..] {
            removed += 1;
            if !dry_run {
                soft_delete(ctx, loser.id, "dedup: superseded by a higher-ranked duplicate").await?;
            }
        }
    }
    Ok(removed)
}

/// Soft-delete episodes beyond `KEEP_LAST_N_EPISODES`, excluding protected
/// items and items that appear as either endpoint of a `memory_links` edge.
async fn run_compact(ctx: &MaintenanceContext<'_>, dry_run: bool) -> Result<usize> {
    let mut episodes: Vec<MemoryItem> = active_items(ctx)
        .await?
        .into_iter()
        .filter(|i| i.kind == ItemKind::Episode)
        .collect();
    if episodes.len() <= policy::KEEP_LAST_N_EPISODES {
        return Ok(0);
    }

    episodes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    let linked_ids = linked_item_ids(ctx).await?;

    let mut removed = 0;
    for episode in episodes.into_iter().skip(policy::KEEP_LAST_N_EPISODES) {
        if episode.is_protected() || linked_ids.contains(&episode.id) {
            continue;
        }
        removed += 1;
        if !dry_run {
            soft_delete(ctx, episode.id, "compact: beyond keep_last_n_episodes").await?;
        }
    }
    Ok(removed)
}

async fn linked_item_ids(ctx: &MaintenanceContext<'_>) -> Result<HashSet<Uuid>> {
    let rows = ctx.storage.query("SELECT from_id, to_id FROM memory_links", vec![]).await?;
    let mut ids = HashSet::new();
    for row in &rows {
        let from: String = row.get(0).map_err(|e| Error::Storage(format!("reading from_id: {e}")))?;
        let to: String = row.get(1).map_err(|e| Error::Storage(format!("reading to_id: {e}")))?;
        if let Ok(id) = Uuid::parse_str(&from) {
            ids.insert(id);
        }
        if let Ok(id) = Uuid::parse_str(&to) {
            ids.insert(id);
        }
    }
    Ok(ids)
}

/// Delete any edge whose endpoint is no longer an active item.
async fn run_clean_links(ctx: &MaintenanceContext<'_>, dry_run: bool) -> Result<usize> {
    let rows = ctx
        .storage
        .query(
            "SELECT from_id, to_id, relation FROM memory_links l \
             WHERE NOT EXISTS (SELECT 1 FROM memory_items m WHERE m.id = l.from_id AND m.status = 'active') \
                OR NOT EXISTS (SELECT 1 FROM memory_items m WHERE m.id = l.to_id AND m.status = 'active')",
            vec![],
        )
        .await?;

    let count = rows.len();
    if dry_run {
        return Ok(count);
    }

    for row in &rows {
        let from: String = row.get(0).map_err(|e| Error::Storage(format!("reading from_id: {e}")))?;
        let to: String = row.get(1).map_err(|e| Error::Storage(format!("reading to_id: {e}")))?;
        let relation: String = row.get(2).map_err(|e| Error::Storage(format!("reading relation: {e}")))?;
        ctx.storage
            .exec(
                "DELETE FROM memory_links WHERE from_id = ?1 AND to_id = ?2 AND relation = ?3",
                vec![Value::Text(from), Value::Text(to), Value::Text(relation)],
            )
            .await
            .map_err(Error::from)?;
    }
    Ok(count)
}

/// Pre-emptively guardrail unprotected items already at `max_error_count`
/// that are not yet covered by a live guardrail, ahead of whatever
/// `feedback`/`prune` would otherwise do to them.
async fn run_auto_guardrails(ctx: &MaintenanceContext<'_>, dry_run: bool) -> Result<usize> {
    let candidates: Vec<MemoryItem> = active_items(ctx)
        .await?
        .into_iter()
        .filter(|i| i.error_count >= ctx.thresholds.max_error_count && !i.is_protected())
        .collect();
    if candidates.is_empty() || dry_run {
        return Ok(candidates.len());
    }

    let mut created = 0;
    for item in candidates {
        let signature = format!("auto_guardrail:{}", item.id);
        let guardrail = crate::types::Guardrail {
            id: Uuid::new_v4(),
            tenant: ctx.tenant.to_string(),
            project: ctx.project.to_string(),
            rule_type: crate::types::GuardrailRuleType::Warn,
            pattern_signature: signature,
            description: format!("auto_guardrails: error_count {} at max_error_count", item.error_count),
            suppress_ids: vec![item.id],
            active: true,
            created_at: ctx.now,
            expires_at: Some(ctx.now + crate::constants::guardrails::GUARDRAIL_EXPIRY_DAYS * 86_400),
        };
        crate::governance::guardrails::create_guardrail(ctx.storage, &guardrail).await?;
        created += 1;
    }
    Ok(created)
}

/// This system keeps no cold-storage tier, so `archive` is report-only:
/// it counts `deprecated` items old enough to be archive candidates
/// without mutating them.
async fn count_archive_candidates(ctx: &MaintenanceContext<'_>) -> Result<usize> {
    let rows = ctx
        .storage
        .query(
            "SELECT COUNT(*) FROM memory_items WHERE tenant = ?1 AND project = ?2 AND status = 'deprecated' \
             AND updated_at < ?3",
            vec![
                Value::Text(ctx.tenant.to_string()),
                Value::Text(ctx.project.to_string()),
                Value::Integer(ctx.now - policy::MAX_AGE_DAYS * 2 * 86_400),
            ],
        )
        .await?;
    let count: i64 = rows
        .first()
        .map(|row| row.get(0))
        .transpose()
        .map_err(|e| Error::Storage(format!("reading count: {e}")))?
        .unwrap_or(0);
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Cluster the 100 most recently updated active episodes by cosine
/// similarity ≥ 0.85 (union-find over pairwise similarity); clusters of
/// size ≥ 3 collapse into a single `fact` summary item and the source
/// episodes become `deprecated`.
async fn run_consolidate(ctx: &MaintenanceContext<'_>, dry_run: bool) -> Result<usize> {
    let mut episodes: Vec<MemoryItem> = active_items(ctx)
        .await?
        .into_iter()
        .filter(|i| i.kind == ItemKind::Episode && i.embedding.is_some())
        .collect();
    episodes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    episodes.truncate(100);

    if episodes.len() < 3 {
        return Ok(0);
    }

    let n = episodes.len();
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let sim = cosine_similarity(
                episodes[i].embedding.as_deref().unwrap_or(&[]),
                episodes[j].embedding.as_deref().unwrap_or(&[]),
            );
            if sim >= 0.85 {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }

    let mut clusters: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        clusters.entry(root).or_default().push(i);
    }

    let mut consolidated = 0;
    for members in clusters.into_values() {
        if members.len() < 3 {
            continue;
        }
        consolidated += 1;
        if dry_run {
            continue;
        }

        let titles: Vec<&str> = members.iter().map(|&i| episodes[i].title.as_str()).collect();
        let summary_title = format!("Consolidated: {}", titles[0]);
        let summary_content = format!(
            "Summary of {} similar episodes:\n{}",
            members.len(),
            titles.iter().map(|t| format!("- {t}")).collect::<Vec<_>>().join("\n")
        );
        let dim = episodes[members[0]].embedding.as_ref().map_or(0, Vec::len);
        let mut avg = vec![0.0f32; dim];
        for &i in &members {
            if let Some(embedding) = &episodes[i].embedding {
                for (slot, value) in avg.iter_mut().zip(embedding.iter()) {
                    *slot += value;
                }
            }
        }
        for value in &mut avg {
            *value /= members.len() as f32;
        }

        let fact_id = Uuid::new_v4();
        ctx.storage
            .exec(
                "INSERT INTO memory_items (id, tenant, project, kind, title, content, tags, verified, confidence, \
                 usefulness_score, error_count, version, status, content_hash, embedding, provenance, source, \
                 created_at, updated_at) VALUES (?1, ?2, ?3, 'fact', ?4, ?5, '[]', 0, 0.5, ?6, 0, 1, 'active', ?7, \
                 ?8, '{}', 'system', ?9, ?9)",
                vec![
                    Value::Text(fact_id.to_string()),
                    Value::Text(ctx.tenant.to_string()),
                    Value::Text(ctx.project.to_string()),
                    Value::Text(summary_title),
                    Value::Text(summary_content.clone()),
                    Value::Real(f64::from(policy::BASE_USEFULNESS_FACT_OR_RUNBOOK)),
                    Value::Text(crate::hashing::content_hash(&summary_content)),
                    Value::Blob(crate::row::embedding_to_blob(&avg)),
                    Value::Integer(ctx.now),
                ],
            )
            .await
            .map_err(Error::from)?;

        for &i in &members {
            soft_deprecate(ctx, episodes[i].id).await?;
        }
    }

    Ok(consolidated)
}

async fn soft_deprecate(ctx: &MaintenanceContext<'_>, id: Uuid) -> Result<()> {
    ctx.storage
        .exec(
            "UPDATE memory_items SET status = 'deprecated', status_reason = ?1, updated_at = ?2 WHERE id = ?3",
            vec![
                Value::Text("consolidate: folded into a summary fact".to_string()),
                Value::Integer(ctx.now),
                Value::Text(id.to_string()),
            ],
        )
        .await
        .map_err(Error::from)?;
    Ok(())
}

/// Keep at most 5000 audit rows per `(tenant, project)`, dropping the
/// oldest by `seq`.
async fn run_audit_trim(ctx: &MaintenanceContext<'_>, dry_run: bool) -> Result<usize> {
    const KEEP: i64 = 5000;
    let rows = ctx
        .storage
        .query(
            "SELECT COUNT(*) FROM audit_records WHERE tenant = ?1 AND project = ?2",
            vec![Value::Text(ctx.tenant.to_string()), Value::Text(ctx.project.to_string())],
        )
        .await?;
    let total: i64 = rows
        .first()
        .map(|row| row.get(0))
        .transpose()
        .map_err(|e| Error::Storage(format!("reading count: {e}")))?
        .unwrap_or(0);
    let excess = (total - KEEP).max(0);
    if excess == 0 || dry_run {
        return Ok(usize::try_from(excess).unwrap_or(0));
    }

    ctx.storage
        .exec(
            "DELETE FROM audit_records WHERE tenant = ?1 AND project = ?2 AND seq IN \
             (SELECT seq FROM audit_records WHERE tenant = ?1 AND project = ?2 ORDER BY seq ASC LIMIT ?3)",
            vec![
                Value::Text(ctx.tenant.to_string()),
                Value::Text(ctx.project.to_string()),
                Value::Integer(excess),
            ],
        )
        .await
        .map_err(Error::from)?;
    Ok(usize::try_from(excess).unwrap_or(0))
}

/// Link items of differing kind whose titles overlap heavily (Jaccard ≥
/// the fuzzy-match dominance threshold) with a `related_to` edge, surfacing
/// duplication that the kind-scoped upsert gates cannot see across kinds.
async fn run_cross_type_overlap(ctx: &MaintenanceContext<'_>, dry_run: bool) -> Result<usize> {
    let items = active_items(ctx).await?;
    let mut created = 0;

    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            if items[i].kind == items[j].kind {
                continue;
            }
            let kw_a = extract_keywords(&items[i].title, fuzzy_match::MIN_KEYWORD_LENGTH);
            let kw_b = extract_keywords(&items[j].title, fuzzy_match::MIN_KEYWORD_LENGTH);
            if jaccard_similarity(&kw_a, &kw_b) < fuzzy_match::BEST_MATCH_THRESHOLD {
                continue;
            }
            created += 1;
            if dry_run {
                continue;
            }
            crate::graph::add_relation(
                ctx.storage,
                &crate::types::MemoryLink {
                    from_id: items[i].id,
                    to_id: items[j].id,
                    relation: crate::types::Relation::RelatedTo,
                    weight: 0.4,
                    metadata: serde_json::json!({"reason": "cross_type_overlap"}),
                    auto_created: true,
                    created_at: ctx.now,
                },
            )
            .await?;
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maintenance_action_order_matches_constants() {
        assert_eq!(MAINTENANCE_ACTION_ORDER.len(), 14);
        assert_eq!(MAINTENANCE_ACTION_ORDER[0], "dedup");
        assert_eq!(MAINTENANCE_ACTION_ORDER.last(), Some(&"vacuum"));
    }
}
