//! The four-gate upsert pipeline (spec.md §4.3): idempotency, exact title,
//! fuzzy title, then insert. Runs each item under the project's upsert
//! lock, wrapped in the storage retry policy.

use std::sync::Arc;

use memory_storage::{Storage, Value};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::cache::ItemCache;
use crate::constants::{fuzzy_match, policy};
use crate::embeddings::{front_loaded_input, EmbeddingBackend};
use crate::error::{Error, Result};
use crate::graph::{add_relation, suggest_relations};
use crate::hashing::{content_hash, extract_keywords, jaccard_similarity, merge_tags_preserving_protected};
use crate::index::{keyword::keyword_search, SearchFilter};
use crate::row::{embedding_to_blob, item_from_row};
use crate::types::{ItemKind, ItemStatus, MemoryItem, MemoryLink, Provenance, Relation, Source};

/// One item proposed by a caller to `memory_upsert`.
#[derive(Debug, Clone)]
pub struct ProposedItem {
    pub kind: ItemKind,
    pub project: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub verified: bool,
    pub confidence: f32,
    pub provenance: Provenance,
    pub success: Option<bool>,
    pub source: Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Created,
    Updated,
    ContentUpdated,
    FuzzyUpdated,
}

impl UpsertAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UpsertAction::Created => "created",
            UpsertAction::Updated => "updated",
            UpsertAction::ContentUpdated => "content_updated",
            UpsertAction::FuzzyUpdated => "fuzzy_updated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpsertResult {
    pub id: Uuid,
    pub title: String,
    pub action: UpsertAction,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub results: Vec<UpsertResult>,
    pub warnings: Vec<String>,
}

/// A format-validation failure severe enough to block the whole batch.
#[derive(Debug, Clone)]
pub struct FormatViolation {
    pub title: String,
    pub reason: String,
}

/// `runbook` needs `Command:` and a `Step`/`STEP` marker; `episode` needs
/// `Command:` and `## OUTCOME`. Neither is satisfied by a lazy
/// status-only body.
fn validate_format(item: &ProposedItem) -> Option<FormatViolation> {
    if is_format_compliant(item.kind, &item.content) {
        None
    } else {
        Some(FormatViolation {
            title: item.title.clone(),
            reason: format_violation_reason(item.kind),
        })
    }
}

/// Whether `content` satisfies the format markers required for `kind`.
/// Shared by the upsert format gate and `memory_stats`'s compliance count.
#[must_use]
pub fn is_format_compliant(kind: ItemKind, content: &str) -> bool {
    let has_command = content.contains("Command:");
    match kind {
        ItemKind::Runbook => has_command && (content.contains("Step") || content.contains("STEP")),
        ItemKind::Episode => has_command && content.contains("## OUTCOME"),
        _ => true,
    }
}

fn format_violation_reason(kind: ItemKind) -> String {
    match kind {
        ItemKind::Runbook => {
            "runbook content must contain a `Command:` marker and a `Step`/`STEP` marker".into()
        }
        ItemKind::Episode => "episode content must contain a `Command:` marker and `## OUTCOME`".into(),
        _ => String::new(),
    }
}

fn extract_marker<'a>(content: &'a str, marker: &str) -> Option<&'a str> {
    let start = content.find(marker)? + marker.len();
    let rest = &content[start..];
    Some(rest.lines().next().unwrap_or("").trim())
}

fn extract_outcome(content: &str) -> Option<&str> {
    let start = content.find("## OUTCOME")? + "## OUTCOME".len();
    let rest = &content[start..];
    let body = rest.lines().find(|l| !l.trim().is_empty())?;
    Some(body.trim())
}

/// The base `usefulness_score` for a freshly-inserted item, adjusted by
/// `success` when present.
fn base_usefulness(kind: ItemKind, success: Option<bool>) -> f32 {
    let base = match kind {
        ItemKind::Fact | ItemKind::Runbook => policy::BASE_USEFULNESS_FACT_OR_RUNBOOK,
        _ => policy::BASE_USEFULNESS_OTHER,
    };
    match success {
        Some(true) => base + policy::SUCCESS_BONUS,
        Some(false) => base + policy::FAILURE_PENALTY,
        None => base,
    }
}

/// Validate every item's format up front; a single critical violation
/// hard-blocks the whole batch before any row is touched.
pub fn validate_batch(items: &[ProposedItem]) -> std::result::Result<(), Vec<FormatViolation>> {
    let violations: Vec<_> = items.iter().filter_map(validate_format).collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

pub struct UpsertContext<'a> {
    pub storage: &'a Arc<dyn Storage>,
    pub cache: &'a ItemCache,
    pub embeddings: &'a EmbeddingBackend,
    pub tenant: &'a str,
}

/// Run the four-gate pipeline for every item in `items`, holding
/// `"upsert:" + project` for the duration of each item's pass. Callers are
/// expected to wrap this in the storage retry policy themselves (retries
/// apply per storage call, not per whole batch).
pub async fn run_upsert_batch(ctx: &UpsertContext<'_>, items: Vec<ProposedItem>) -> Result<BatchReport> {
    let mut report = BatchReport::default();

    for item in items {
        let project = item.project.clone();
        let _guard = ctx
            .storage
            .with_lock(&format!("upsert:{project}"))
            .await
            .map_err(Error::from)?;

        let result = upsert_one(ctx, &item).await?;
        report.results.push(result);
    }

    Ok(report)
}

async fn upsert_one(ctx: &UpsertContext<'_>, item: &ProposedItem) -> Result<UpsertResult> {
    let hash = content_hash(&item.content);
    let now = crate::time::now_unix();

    if let Some(existing) = find_by_content_hash(ctx.storage, ctx.tenant, &item.project, item.kind, &hash).await? {
        return idempotency_update(ctx, existing, item, now).await;
    }

    if let Some(existing) = find_by_exact_title(ctx.storage, ctx.tenant, &item.project, item.kind, &item.title).await? {
        return exact_title_update(ctx, existing, item, &hash, now).await;
    }

    if let Some(existing) = find_fuzzy_match(ctx.storage, ctx.tenant, &item.project, item.kind, &item.title, &hash).await? {
        return fuzzy_title_update(ctx, existing, item, &hash, now).await;
    }

    insert_new(ctx, item, &hash, now).await
}

async fn find_by_content_hash(
    storage: &Arc<dyn Storage>,
    tenant: &str,
    project: &str,
    kind: ItemKind,
    hash: &str,
) -> Result<Option<MemoryItem>> {
    let rows = storage
        .query(
            "SELECT * FROM memory_items WHERE tenant = ?1 AND project = ?2 AND kind = ?3 \
             AND content_hash = ?4 AND status = 'active'",
            vec![
                Value::Text(tenant.to_string()),
                Value::Text(project.to_string()),
                Value::Text(kind.as_str().to_string()),
                Value::Text(hash.to_string()),
            ],
        )
        .await?;
    rows.first().map(item_from_row).transpose()
}

async fn find_by_exact_title(
    storage: &Arc<dyn Storage>,
    tenant: &str,
    project: &str,
    kind: ItemKind,
    title: &str,
) -> Result<Option<MemoryItem>> {
    let rows = storage
        .query(
            "SELECT * FROM memory_items WHERE tenant = ?1 AND project = ?2 AND kind = ?3 \
             AND lower(title) = lower(?4) AND status = 'active'",
            vec![
                Value::Text(tenant.to_string()),
                Value::Text(project.to_string()),
                Value::Text(kind.as_str().to_string()),
                Value::Text(title.to_string()),
            ],
        )
        .await?;
    rows.first().map(item_from_row).transpose()
}

/// Titles carrying an opposing outcome marker (`[FAILED]` vs `[SUCCESS]`)
/// never fuzzy-merge, even at high keyword overlap.
fn outcome_marker(title: &str) -> Option<&'static str> {
    let lower = title.to_lowercase();
    if lower.contains("[failed]") {
        Some("failed")
    } else if lower.contains("[success]") {
        Some("success")
    } else {
        None
    }
}

async fn find_fuzzy_match(
    storage: &Arc<dyn Storage>,
    tenant: &str,
    project: &str,
    kind: ItemKind,
    title: &str,
    hash: &str,
) -> Result<Option<MemoryItem>> {
    let title_keywords = extract_keywords(title, fuzzy_match::MIN_KEYWORD_LENGTH);
    if title_keywords.is_empty() {
        return Ok(None);
    }

    let filter = SearchFilter {
        tenant: tenant.to_string(),
        project: project.to_string(),
        excluded_statuses: vec![ItemStatus::Deleted, ItemStatus::Quarantined, ItemStatus::Deprecated],
        kinds: Some(vec![kind]),
        tags: None,
    };

    let mut candidates: Vec<MemoryItem> = match keyword_search(storage, title, &filter, 50).await {
        Ok(hits) if !hits.is_empty() => {
            let mut items = Vec::new();
            for hit in hits {
                if let Some(row) = storage
                    .query("SELECT * FROM memory_items WHERE id = ?1", vec![Value::Text(hit.id.to_string())])
                    .await?
                    .into_iter()
                    .next()
                {
                    items.push(item_from_row(&row)?);
                }
            }
            items
        }
        _ => {
            let rows = storage
                .query(
                    "SELECT * FROM memory_items WHERE tenant = ?1 AND project = ?2 AND kind = ?3 \
                     AND status = 'active' ORDER BY updated_at DESC LIMIT 50",
                    vec![
                        Value::Text(tenant.to_string()),
                        Value::Text(project.to_string()),
                        Value::Text(kind.as_str().to_string()),
                    ],
                )
                .await?;
            rows.iter().map(item_from_row).collect::<Result<Vec<_>>>()?
        }
    };

    let incoming_marker = outcome_marker(title);
    candidates.retain(|c| outcome_marker(&c.title) == incoming_marker);

    let mut scored: Vec<(f64, &MemoryItem)> = candidates
        .iter()
        .map(|c| {
            let candidate_keywords = extract_keywords(&c.title, fuzzy_match::MIN_KEYWORD_LENGTH);
            (jaccard_similarity(&title_keywords, &candidate_keywords), c)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let Some(&(best_score, best_item)) = scored.first() else {
        return Ok(None);
    };
    let second_best = scored.get(1).map_or(0.0, |(s, _)| *s);

    if best_score >= fuzzy_match::BEST_MATCH_THRESHOLD
        && second_best < fuzzy_match::SECOND_BEST_CEILING
        && best_item.content_hash != hash
    {
        Ok(Some(best_item.clone()))
    } else {
        Ok(None)
    }
}

async fn embed_for(ctx: &UpsertContext<'_>, item: &ProposedItem) -> Option<Vec<f32>> {
    let outcome = extract_outcome(&item.content);
    let command = extract_marker(&item.content, "Command:");
    let input = front_loaded_input(&item.title, &item.tags, outcome, command, &item.content, 800);
    ctx.embeddings.embed(&input).await
}

async fn write_history(storage: &Arc<dyn Storage>, item: &MemoryItem, reason: &str) -> Result<()> {
    storage
        .exec(
            "INSERT INTO history (item_id, version, tenant, project, title, content, tags, content_hash, \
             usefulness_score, updated_at, reason) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            vec![
                Value::Text(item.id.to_string()),
                Value::Integer(i64::from(item.version)),
                Value::Text(item.tenant.clone()),
                Value::Text(item.project.clone()),
                Value::Text(item.title.clone()),
                Value::Text(item.content.clone()),
                Value::Text(serde_json::to_string(&item.tags).unwrap_or_else(|_| "[]".into())),
                Value::Text(item.content_hash.clone()),
                Value::Real(f64::from(item.usefulness_score)),
                Value::Integer(item.updated_at),
                Value::Text(reason.to_string()),
            ],
        )
        .await
        .map_err(Error::from)?;
    Ok(())
}

async fn refresh_auto_links(ctx: &UpsertContext<'_>, item_id: Uuid, title: &str, kind: ItemKind, project: &str, now: i64) -> Result<()> {
    let suggestions = suggest_relations(ctx.storage, ctx.tenant, project, item_id, title, kind, 0.4, 3).await?;
    for suggestion in suggestions {
        add_relation(
            ctx.storage,
            &MemoryLink {
                from_id: item_id,
                to_id: suggestion.to_id,
                relation: suggestion.relation,
                weight: suggestion.confidence,
                metadata: Json::Null,
                auto_created: true,
                created_at: now,
            },
        )
        .await?;
    }
    Ok(())
}

/// Gate 1: update the matching item's surface fields and bump its version.
/// `usefulness_score` is left untouched — this gate only fires on an exact
/// content-hash match, so there's no new outcome signal to fold in.
async fn idempotency_update(ctx: &UpsertContext<'_>, mut existing: MemoryItem, item: &ProposedItem, now: i64) -> Result<UpsertResult> {
    existing.title = item.title.clone();
    existing.tags = merge_tags_preserving_protected(&existing.tags, &item.tags);
    existing.verified = item.verified;
    existing.confidence = item.confidence;
    existing.provenance = item.provenance.clone();
    existing.version += 1;
    existing.updated_at = now;

    ctx.storage
        .exec(
            "UPDATE memory_items SET title = ?1, tags = ?2, verified = ?3, confidence = ?4, provenance = ?5, \
             version = ?6, updated_at = ?7 WHERE id = ?8",
            vec![
                Value::Text(existing.title.clone()),
                Value::Text(serde_json::to_string(&existing.tags).unwrap_or_else(|_| "[]".into())),
                Value::Integer(i64::from(existing.verified)),
                Value::Real(f64::from(existing.confidence)),
                Value::Text(existing.provenance.to_string()),
                Value::Integer(i64::from(existing.version)),
                Value::Integer(now),
                Value::Text(existing.id.to_string()),
            ],
        )
        .await
        .map_err(Error::from)?;

    ctx.cache.invalidate(&existing.id);

    Ok(UpsertResult {
        id: existing.id,
        title: existing.title,
        action: UpsertAction::Updated,
    })
}

/// Gate 2: same title, different content — replace content wholesale.
async fn exact_title_update(ctx: &UpsertContext<'_>, existing: MemoryItem, item: &ProposedItem, hash: &str, now: i64) -> Result<UpsertResult> {
    write_history(ctx.storage, &existing, "exact_title_update").await?;

    let merged_tags = merge_tags_preserving_protected(&existing.tags, &item.tags);
    let embedding = embed_for(ctx, item).await;
    let version = existing.version + 1;

    ctx.storage
        .exec(
            "UPDATE memory_items SET content = ?1, tags = ?2, content_hash = ?3, embedding = ?4, \
             version = ?5, updated_at = ?6, verified = ?7, confidence = ?8, provenance = ?9 WHERE id = ?10",
            vec![
                Value::Text(item.content.clone()),
                Value::Text(serde_json::to_string(&merged_tags).unwrap_or_else(|_| "[]".into())),
                Value::Text(hash.to_string()),
                embedding.as_deref().map_or(Value::Null, |e| Value::Blob(embedding_to_blob(e))),
                Value::Integer(i64::from(version)),
                Value::Integer(now),
                Value::Integer(i64::from(item.verified)),
                Value::Real(f64::from(item.confidence)),
                Value::Text(item.provenance.to_string()),
                Value::Text(existing.id.to_string()),
            ],
        )
        .await
        .map_err(Error::from)?;

    refresh_auto_links(ctx, existing.id, &item.title, item.kind, &item.project, now).await?;
    ctx.cache.invalidate(&existing.id);

    Ok(UpsertResult {
        id: existing.id,
        title: item.title.clone(),
        action: UpsertAction::ContentUpdated,
    })
}

/// Gate 3: different title, same underlying intent per Jaccard dominance —
/// merge into the matched item, preserving the greater of its existing
/// `usefulness_score` and the base-for-kind-plus-success delta a fresh
/// insert would have received. A fuzzy merge must never regress an
/// already-useful item's score back toward the baseline.
async fn fuzzy_title_update(ctx: &UpsertContext<'_>, existing: MemoryItem, item: &ProposedItem, hash: &str, now: i64) -> Result<UpsertResult> {
    write_history(ctx.storage, &existing, "fuzzy_title_update").await?;

    let merged_tags = merge_tags_preserving_protected(&existing.tags, &item.tags);
    let embedding = embed_for(ctx, item).await;
    let version = existing.version + 1;

    let candidate_usefulness = base_usefulness(item.kind, item.success);
    let usefulness_score = existing
        .usefulness_score
        .max(candidate_usefulness)
        .clamp(policy::USEFULNESS_MIN, policy::USEFULNESS_MAX);

    ctx.storage
        .exec(
            "UPDATE memory_items SET title = ?1, content = ?2, tags = ?3, content_hash = ?4, embedding = ?5, \
             version = ?6, updated_at = ?7, usefulness_score = ?8 WHERE id = ?9",
            vec![
                Value::Text(item.title.clone()),
                Value::Text(item.content.clone()),
                Value::Text(serde_json::to_string(&merged_tags).unwrap_or_else(|_| "[]".into())),
                Value::Text(hash.to_string()),
                embedding.as_deref().map_or(Value::Null, |e| Value::Blob(embedding_to_blob(e))),
                Value::Integer(i64::from(version)),
                Value::Integer(now),
                Value::Real(f64::from(usefulness_score)),
                Value::Text(existing.id.to_string()),
            ],
        )
        .await
        .map_err(Error::from)?;

    refresh_auto_links(ctx, existing.id, &item.title, item.kind, &item.project, now).await?;
    ctx.cache.invalidate(&existing.id);

    Ok(UpsertResult {
        id: existing.id,
        title: item.title.clone(),
        action: UpsertAction::FuzzyUpdated,
    })
}

/// Gate 4: no match survived gates 1-3 — insert a fresh row at `version = 1`.
async fn insert_new(ctx: &UpsertContext<'_>, item: &ProposedItem, hash: &str, now: i64) -> Result<UpsertResult> {
    let id = Uuid::new_v4();
    let embedding = embed_for(ctx, item).await;
    let usefulness_score = base_usefulness(item.kind, item.success);

    ctx.storage
        .exec(
            "INSERT INTO memory_items (id, tenant, project, kind, title, content, tags, verified, confidence, \
             usefulness_score, error_count, version, status, content_hash, embedding, provenance, source, \
             created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, 1, 'active', ?11, ?12, ?13, ?14, ?15, ?15)",
            vec![
                Value::Text(id.to_string()),
                Value::Text(ctx.tenant.to_string()),
                Value::Text(item.project.clone()),
                Value::Text(item.kind.as_str().to_string()),
                Value::Text(item.title.clone()),
                Value::Text(item.content.clone()),
                Value::Text(serde_json::to_string(&item.tags).unwrap_or_else(|_| "[]".into())),
                Value::Integer(i64::from(item.verified)),
                Value::Real(f64::from(item.confidence)),
                Value::Real(f64::from(usefulness_score)),
                Value::Text(hash.to_string()),
                embedding.as_deref().map_or(Value::Null, |e| Value::Blob(embedding_to_blob(e))),
                Value::Text(item.provenance.to_string()),
                Value::Text(source_str(item.source).to_string()),
                Value::Integer(now),
            ],
        )
        .await
        .map_err(Error::from)?;

    refresh_auto_links(ctx, id, &item.title, item.kind, &item.project, now).await?;

    Ok(UpsertResult {
        id,
        title: item.title.clone(),
        action: UpsertAction::Created,
    })
}

fn source_str(source: Source) -> &'static str {
    match source {
        Source::Agent => "agent",
        Source::Human => "human",
        Source::System => "system",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runbook_without_command_marker_is_rejected() {
        let item = ProposedItem {
            kind: ItemKind::Runbook,
            project: "p".into(),
            title: "Restart service".into(),
            content: "Step 1: do the thing".into(),
            tags: vec![],
            verified: false,
            confidence: 0.5,
            provenance: Json::Null,
            success: None,
            source: Source::Agent,
        };
        assert!(validate_format(&item).is_some());
    }

    #[test]
    fn runbook_with_both_markers_passes() {
        let item = ProposedItem {
            kind: ItemKind::Runbook,
            project: "p".into(),
            title: "Restart service".into(),
            content: "Command: systemctl restart svc\nStep 1: run it".into(),
            tags: vec![],
            verified: false,
            confidence: 0.5,
            provenance: Json::Null,
            success: None,
            source: Source::Agent,
        };
        assert!(validate_format(&item).is_none());
    }

    #[test]
    fn episode_without_outcome_is_rejected() {
        let item = ProposedItem {
            kind: ItemKind::Episode,
            project: "p".into(),
            title: "Deploy attempt".into(),
            content: "Command: cargo build".into(),
            tags: vec![],
            verified: false,
            confidence: 0.5,
            provenance: Json::Null,
            success: None,
            source: Source::Agent,
        };
        assert!(validate_format(&item).is_some());
    }

    #[test]
    fn base_usefulness_adds_success_bonus() {
        assert!((base_usefulness(ItemKind::Fact, Some(true)) - 1.5).abs() < 1e-6);
        assert!((base_usefulness(ItemKind::Episode, Some(false)) - (-0.3)).abs() < 1e-6);
    }

    #[test]
    fn opposing_outcome_markers_are_distinct() {
        assert_ne!(outcome_marker("[FAILED] deploy"), outcome_marker("[SUCCESS] deploy"));
    }

    #[test]
    fn extract_marker_reads_first_line_after_prefix() {
        let content = "Command: systemctl restart nginx\nmore text";
        assert_eq!(extract_marker(content, "Command:"), Some("systemctl restart nginx"));
    }
}
