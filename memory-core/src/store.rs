//! `MemoryStore`: the handle `memory-mcp` holds. Bundles the storage
//! backend, cache, embedding backend, and config into one object and
//! exposes the tool-level operations as plain async methods.

use std::sync::Arc;

use memory_storage::Storage;
use uuid::Uuid;

use crate::cache::ItemCache;
use crate::config::StoreConfig;
use crate::embeddings::{EmbeddingBackend, EmbeddingMode};
use crate::error::{Error, Result};
use crate::governance::lifecycle::PolicyThresholds;
use crate::governance::{apply_feedback, FeedbackEffect, FeedbackLabel};
use crate::graph::{self, TraversalStep};
use crate::index::{keyword::keyword_search, vector::vector_search, SearchFilter};
use crate::maintain::{run_maintenance, MaintenanceContext, MaintenanceReport};
use crate::ranker::{rank, RankedHit, SearchMode};
use crate::row::item_from_row;
use crate::types::{ItemKind, ItemStatus, MemoryItem, Relation};
use crate::upsert::{run_upsert_batch, BatchReport, ProposedItem, UpsertContext};

/// Cheap governance counts for a project, used in the forensic metadata
/// block on every tool response.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct GovernanceSnapshot {
    pub quarantined: u64,
    pub deleted: u64,
    pub guardrails_active: u64,
}

/// An item hidden from a search's main result set, with the reason it was
/// hidden.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExcludedItem {
    pub id: Uuid,
    pub reason: &'static str,
}

/// The full result of [`MemoryStore::search`]: the ranked hits plus the
/// excluded-items sidecar, any graph-conflict warnings, and (when vector
/// search degraded) the reason why.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub hits: Vec<RankedHit>,
    pub excluded: Vec<ExcludedItem>,
    pub guardrail_warnings: Vec<String>,
    pub fallback_reason: Option<String>,
}

/// The `memory_stats` payload: counts, health, governance, format
/// compliance, mistakes, and (for the embedded backend) database size.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StatsReport {
    pub total_items: u64,
    pub by_kind: std::collections::HashMap<String, u64>,
    pub by_status: std::collections::HashMap<String, u64>,
    pub version_distribution: std::collections::HashMap<String, u64>,
    pub governance: GovernanceSnapshot,
    pub mistakes_total: u64,
    pub format_noncompliant: u64,
    pub open_conflicts: u64,
    pub database_path: Option<String>,
    pub database_size_bytes: Option<u64>,
}

/// Top-level handle owning every long-lived piece of the memory engine:
/// the storage backend, the LRU item cache, and the embedding backend.
/// `memory-mcp` constructs exactly one of these per process.
pub struct MemoryStore {
    storage: Arc<dyn Storage>,
    cache: ItemCache,
    embeddings: EmbeddingBackend,
    config: StoreConfig,
    tenant: String,
}

impl MemoryStore {
    pub async fn open(config: StoreConfig, tenant: impl Into<String>) -> Result<Self> {
        let server = config
            .database
            .server_url
            .as_deref()
            .zip(config.database.auth_token.as_deref());
        let storage = memory_storage::open(server, &config.database.embedded_path)
            .await
            .map_err(Error::from)?;

        let embeddings = match config.embedding.mode {
            EmbeddingMode::Disabled => EmbeddingBackend::disabled(),
            _ => EmbeddingBackend::local_only(config.embedding.dimension)
                .await
                .map_err(Error::Embedding)?,
        };

        let cache = ItemCache::new(config.cache.capacity, std::time::Duration::from_secs(config.cache.ttl_seconds));

        Ok(Self {
            storage,
            cache,
            embeddings,
            config,
            tenant: tenant.into(),
        })
    }

    #[must_use]
    pub fn embedding_mode(&self) -> EmbeddingMode {
        self.embeddings.mode()
    }

    #[must_use]
    pub fn embedding_model_names(&self) -> Vec<String> {
        self.embeddings.model_names()
    }

    /// Count of open `model_conflicts` rows for `project`, used in
    /// forensic metadata's `cross_model.conflicts`.
    pub async fn conflict_count(&self, project: &str) -> Result<u64> {
        let (scope_sql, mut params) = self.scope_clause(Some(project));
        params.push(memory_storage::Value::Text("open".to_string()));
        let rows = self
            .storage
            .query(
                &format!("SELECT COUNT(*) FROM model_conflicts WHERE {scope_sql} AND resolution_status = ?{}", params.len()),
                params,
            )
            .await
            .map_err(Error::from)?;
        Self::read_count(&rows)
    }

    #[must_use]
    pub fn backend_kind(&self) -> memory_storage::BackendKind {
        self.storage.kind()
    }

    fn thresholds(&self) -> PolicyThresholds {
        PolicyThresholds::from(&self.config.policy)
    }

    pub async fn upsert(&self, items: Vec<ProposedItem>) -> Result<BatchReport> {
        crate::upsert::validate_batch(&items).map_err(|violations| {
            let titles: Vec<_> = violations.iter().map(|v| v.title.clone()).collect();
            Error::ValidationFailed(format!("format validation failed for: {}", titles.join(", ")))
        })?;

        let ctx = UpsertContext {
            storage: &self.storage,
            cache: &self.cache,
            embeddings: &self.embeddings,
            tenant: &self.tenant,
        };
        run_upsert_batch(&ctx, items).await
    }

    /// `memory_get`: fetch a single item by id, bump its interest signal,
    /// and populate the cache.
    pub async fn get(&self, id: Uuid) -> Result<MemoryItem> {
        if let Some(item) = self.cache.get(&id) {
            return Ok(item);
        }

        let row = self
            .storage
            .query_one("SELECT * FROM memory_items WHERE id = ?1", vec![memory_storage::Value::Text(id.to_string())])
            .await?
            .ok_or(Error::NotFound(id))?;
        let mut item = item_from_row(&row)?;

        crate::governance::feedback::apply_interest_signal(&mut item);
        self.storage
            .exec(
                "UPDATE memory_items SET usefulness_score = ?1, last_used_at = ?2 WHERE id = ?3",
                vec![
                    memory_storage::Value::Real(f64::from(item.usefulness_score)),
                    memory_storage::Value::Integer(crate::time::now_unix()),
                    memory_storage::Value::Text(id.to_string()),
                ],
            )
            .await
            .map_err(Error::from)?;

        self.cache.put(item.clone());
        Ok(item)
    }

    /// `memory_search`: hybrid keyword/vector search with recency, scored
    /// and diversified by [`crate::ranker::rank`]. `override_quarantine`
    /// controls whether quarantined items are admitted into the main
    /// result set directly; when it is `false` they are hidden and
    /// reported in the `excluded[]` sidecar instead, alongside any ids
    /// hidden by an active guardrail.
    pub async fn search(&self, query: &str, project: &str, mode: SearchMode, limit: usize, override_quarantine: bool) -> Result<SearchOutcome> {
        let excluded_statuses = if override_quarantine {
            vec![ItemStatus::Deleted]
        } else {
            vec![ItemStatus::Deleted, ItemStatus::Quarantined]
        };
        let filter = SearchFilter {
            tenant: self.tenant.clone(),
            project: project.to_string(),
            excluded_statuses,
            kinds: None,
            tags: None,
        };

        let (keyword_weight, vector_weight, _recency_weight) = mode.weights();
        let keyword_hits = if keyword_weight > 0.0 {
            keyword_search(&self.storage, query, &filter, limit * 4).await?
        } else {
            Vec::new()
        };

        let mut effective_mode = mode;
        let mut fallback_reason = None;
        let vector_hits = if vector_weight > 0.0 {
            let outcome = self.embeddings.embed_with_outcome(query).await;
            fallback_reason = outcome.fallback_reason;
            match outcome.vector {
                Some(query_vector) => vector_search(&self.storage, &query_vector, &filter, limit * 4).await?,
                None => {
                    effective_mode = SearchMode::KeywordOnly;
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let mut candidate_ids: std::collections::HashSet<Uuid> =
            keyword_hits.iter().map(|h| h.id).collect();
        candidate_ids.extend(vector_hits.iter().map(|h| h.id));

        let mut excluded = Vec::new();

        if !override_quarantine {
            let permissive_filter = SearchFilter {
                tenant: self.tenant.clone(),
                project: project.to_string(),
                excluded_statuses: vec![ItemStatus::Deleted],
                kinds: None,
                tags: None,
            };
            let mut with_quarantine: std::collections::HashSet<Uuid> =
                keyword_search(&self.storage, query, &permissive_filter, limit * 4)
                    .await?
                    .into_iter()
                    .map(|h| h.id)
                    .collect();
            if vector_weight > 0.0 {
                if let Some(query_vector) = self.embeddings.embed(query).await {
                    with_quarantine.extend(vector_search(&self.storage, &query_vector, &permissive_filter, limit * 4).await?.into_iter().map(|h| h.id));
                }
            }
            for id in with_quarantine.difference(&candidate_ids) {
                excluded.push(ExcludedItem { id: *id, reason: "quarantined" });
            }
        }

        let suppressed = crate::governance::get_suppressed_ids(&self.storage, &self.tenant, project, crate::time::now_unix()).await?;
        let suppressed: std::collections::HashSet<Uuid> = suppressed.into_iter().collect();
        for id in &candidate_ids {
            if suppressed.contains(id) {
                excluded.push(ExcludedItem { id: *id, reason: "suppressed" });
            }
        }
        candidate_ids.retain(|id| !suppressed.contains(id));

        let mut items = Vec::with_capacity(candidate_ids.len());
        for id in candidate_ids {
            if let Some(row) = self
                .storage
                .query_one("SELECT * FROM memory_items WHERE id = ?1", vec![memory_storage::Value::Text(id.to_string())])
                .await?
            {
                items.push(item_from_row(&row)?);
            }
        }

        let conflicts = self.graph_conflicts(project).await?;
        let guardrail_warnings: Vec<String> = conflicts
            .iter()
            .map(|link| format!("graph conflict: {} contradicts {}", link.from_id, link.to_id))
            .collect();

        let query_keywords = crate::hashing::extract_keywords(query, crate::constants::keyword_search::MIN_KEYWORD_LENGTH);
        let hits = rank(items, &keyword_hits, &vector_hits, &query_keywords, effective_mode, crate::time::now_unix(), limit, true);
        Ok(SearchOutcome { hits, excluded, guardrail_warnings, fallback_reason })
    }

    /// `memory_feedback`: apply a feedback label and persist the resulting
    /// item state.
    pub async fn feedback(&self, id: Uuid, label: FeedbackLabel) -> Result<FeedbackEffect> {
        let mut item = self.get_uncached(id).await?;
        let effect = apply_feedback(&mut item, label, self.config.policy.quarantine_on_wrong_threshold);

        self.storage
            .exec(
                "UPDATE memory_items SET usefulness_score = ?1, error_count = ?2, verified = ?3, status = ?4, \
                 status_reason = ?5 WHERE id = ?6",
                vec![
                    memory_storage::Value::Real(f64::from(item.usefulness_score)),
                    memory_storage::Value::Integer(i64::from(item.error_count)),
                    memory_storage::Value::Integer(i64::from(item.verified)),
                    memory_storage::Value::Text(item.status.as_str().to_string()),
                    item.status_reason.clone().map_or(memory_storage::Value::Null, memory_storage::Value::Text),
                    memory_storage::Value::Text(id.to_string()),
                ],
            )
            .await
            .map_err(Error::from)?;
        self.cache.invalidate(&id);

        if let Some(signature) = &effect.mistake_signature {
            crate::governance::guardrails::record_mistake(&self.storage, &self.tenant, &item.project, signature, crate::time::now_unix())
                .await?;
        }

        Ok(effect)
    }

    /// `memory_forget`: explicit hard delete, bypassing the kind-safe
    /// downgrade rules — an operator asking to forget something is always
    /// honored.
    pub async fn forget(&self, id: Uuid, reason: &str) -> Result<()> {
        self.storage
            .exec(
                "UPDATE memory_items SET status = 'deleted', status_reason = ?1, updated_at = ?2 WHERE id = ?3",
                vec![
                    memory_storage::Value::Text(reason.to_string()),
                    memory_storage::Value::Integer(crate::time::now_unix()),
                    memory_storage::Value::Text(id.to_string()),
                ],
            )
            .await
            .map_err(Error::from)?;
        self.cache.invalidate(&id);
        Ok(())
    }

    pub async fn traverse(&self, start: Uuid, max_hops: usize, relations: Option<Vec<Relation>>) -> Result<Vec<TraversalStep>> {
        graph::traverse_graph(&self.storage, start, max_hops, relations.as_deref()).await
    }

    /// Items currently hidden from a project's search results: quarantined
    /// items, and anything caught by an active guardrail's suppress list.
    /// Used by `memory_summarize`'s `excluded_items` field — the same
    /// reasons `search`'s `excluded[]` sidecar uses, but scoped to the
    /// whole project rather than one query.
    pub async fn excluded_items(&self, project: &str) -> Result<Vec<ExcludedItem>> {
        let rows = self
            .storage
            .query(
                "SELECT id FROM memory_items WHERE tenant = ?1 AND project = ?2 AND status = 'quarantined'",
                vec![
                    memory_storage::Value::Text(self.tenant.clone()),
                    memory_storage::Value::Text(project.to_string()),
                ],
            )
            .await
            .map_err(Error::from)?;

        let mut excluded = Vec::with_capacity(rows.len());
        for row in &rows {
            let id_str: String = row.get(0).map_err(|e| Error::Storage(format!("reading id: {e}")))?;
            excluded.push(ExcludedItem {
                id: Uuid::parse_str(&id_str).map_err(|e| Error::Storage(e.to_string()))?,
                reason: "quarantined",
            });
        }

        let suppressed = crate::governance::get_suppressed_ids(&self.storage, &self.tenant, project, crate::time::now_unix()).await?;
        excluded.extend(suppressed.into_iter().map(|id| ExcludedItem { id, reason: "suppressed" }));
        Ok(excluded)
    }

    /// All `contradicts` edges between active items in `project` —
    /// `memory_summarize`'s `graph_conflicts` field, and the guardrail
    /// warnings `search` adds.
    pub async fn graph_conflicts(&self, project: &str) -> Result<Vec<crate::types::MemoryLink>> {
        graph::find_conflicts(&self.storage, &self.tenant, project).await
    }

    /// Items within one hop of any of `ids`, excluding `ids` themselves —
    /// `memory_summarize`'s `related_context` field.
    pub async fn related_context(&self, ids: &[Uuid]) -> Result<Vec<MemoryItem>> {
        let mut related_ids = std::collections::HashSet::new();
        for &id in ids {
            let steps = graph::traverse_graph(&self.storage, id, 1, None).await?;
            related_ids.extend(steps.into_iter().map(|s| s.id));
        }
        for id in ids {
            related_ids.remove(id);
        }
        graph::fetch_items(&self.storage, &related_ids.into_iter().collect::<Vec<_>>()).await
    }

    pub async fn list(
        &self,
        project: &str,
        kind: Option<ItemKind>,
        status: Option<ItemStatus>,
        sort_field: &str,
        descending: bool,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MemoryItem>> {
        const ALLOWED_SORT_FIELDS: &[&str] = &["created_at", "updated_at", "usefulness_score", "title"];
        let sort_field = if ALLOWED_SORT_FIELDS.contains(&sort_field) { sort_field } else { "updated_at" };
        let direction = if descending { "DESC" } else { "ASC" };

        let mut sql = "SELECT * FROM memory_items WHERE tenant = ?1 AND project = ?2".to_string();
        let mut params = vec![
            memory_storage::Value::Text(self.tenant.clone()),
            memory_storage::Value::Text(project.to_string()),
        ];
        if let Some(kind) = kind {
            sql.push_str(&format!(" AND kind = ?{}", params.len() + 1));
            params.push(memory_storage::Value::Text(kind.as_str().to_string()));
        }
        if let Some(status) = status {
            sql.push_str(&format!(" AND status = ?{}", params.len() + 1));
            params.push(memory_storage::Value::Text(status.as_str().to_string()));
        }
        sql.push_str(&format!(" ORDER BY {sort_field} {direction} LIMIT ?{} OFFSET ?{}", params.len() + 1, params.len() + 2));
        params.push(memory_storage::Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        params.push(memory_storage::Value::Integer(i64::try_from(offset).unwrap_or(0)));

        let rows = self.storage.query(&sql, params).await?;
        rows.iter().map(item_from_row).collect()
    }

    pub async fn maintain(&self, project: &str, actions: &[String], dry_run: bool) -> Result<MaintenanceReport> {
        let _guard = self.storage.with_lock(&format!("maintain:{project}")).await.map_err(Error::from)?;
        let thresholds = self.thresholds();
        let ctx = MaintenanceContext {
            storage: &self.storage,
            cache: &self.cache,
            tenant: &self.tenant,
            project,
            thresholds: &thresholds,
            now: crate::time::now_unix(),
        };
        run_maintenance(&ctx, actions, dry_run).await
    }

    /// Cheap counts for the forensic metadata block: how many items are
    /// quarantined or deleted, and how many guardrails are currently live.
    /// `project = None` aggregates across every project for this tenant.
    pub async fn governance_snapshot(&self, project: Option<&str>) -> Result<GovernanceSnapshot> {
        let quarantined = self.count_by_status(project, ItemStatus::Quarantined).await?;
        let deleted = self.count_by_status(project, ItemStatus::Deleted).await?;

        let (scope_sql, mut params) = self.scope_clause(project);
        params.push(memory_storage::Value::Integer(crate::time::now_unix()));
        let rows = self
            .storage
            .query(
                &format!("SELECT COUNT(*) FROM guardrails WHERE {scope_sql} AND active = 1 AND (expires_at IS NULL OR expires_at > ?{})", params.len()),
                params,
            )
            .await
            .map_err(Error::from)?;
        let guardrails_active = Self::read_count(&rows)?;

        Ok(GovernanceSnapshot { quarantined, deleted, guardrails_active })
    }

    async fn count_by_status(&self, project: Option<&str>, status: ItemStatus) -> Result<u64> {
        let (scope_sql, mut params) = self.scope_clause(project);
        params.push(memory_storage::Value::Text(status.as_str().to_string()));
        let rows = self
            .storage
            .query(
                &format!("SELECT COUNT(*) FROM memory_items WHERE {scope_sql} AND status = ?{}", params.len()),
                params,
            )
            .await
            .map_err(Error::from)?;
        Self::read_count(&rows)
    }

    fn read_count(rows: &[memory_storage::Row]) -> Result<u64> {
        let total: i64 = rows
            .first()
            .map(|row| row.get(0))
            .transpose()
            .map_err(|e| Error::Storage(format!("reading count: {e}")))?
            .unwrap_or(0);
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// `memory_stats`: counts, governance health, format compliance,
    /// mistakes, and database size. `project` is optional — when absent,
    /// counts are aggregated across every project for this tenant.
    pub async fn stats(&self, project: Option<&str>) -> Result<StatsReport> {
        let (scope_sql, mut scope_params) = self.scope_clause(project);

        let by_kind = self
            .grouped_counts(&format!("SELECT kind, COUNT(*) FROM memory_items WHERE {scope_sql} GROUP BY kind"), scope_params.clone())
            .await?;
        let by_status = self
            .grouped_counts(&format!("SELECT status, COUNT(*) FROM memory_items WHERE {scope_sql} GROUP BY status"), scope_params.clone())
            .await?;
        let total_items = by_status.values().sum();

        let version_rows = self
            .storage
            .query(&format!("SELECT version, COUNT(*) FROM memory_items WHERE {scope_sql} GROUP BY version"), scope_params.clone())
            .await
            .map_err(Error::from)?;
        let mut version_distribution = std::collections::HashMap::new();
        for row in &version_rows {
            let version: i64 = row.get(0).map_err(|e| Error::Storage(format!("reading version: {e}")))?;
            let count: i64 = row.get(1).map_err(|e| Error::Storage(format!("reading count: {e}")))?;
            version_distribution.insert(version.to_string(), u64::try_from(count).unwrap_or(0));
        }

        let mistakes_rows = self
            .storage
            .query(&format!("SELECT COUNT(*) FROM mistakes WHERE {scope_sql}"), scope_params.clone())
            .await
            .map_err(Error::from)?;
        let mistakes_total = Self::read_count(&mistakes_rows)?;

        let mut conflict_params = scope_params.clone();
        conflict_params.push(memory_storage::Value::Text("open".to_string()));
        let conflict_rows = self
            .storage
            .query(
                &format!("SELECT COUNT(*) FROM model_conflicts WHERE {scope_sql} AND resolution_status = ?{}", conflict_params.len()),
                conflict_params,
            )
            .await
            .map_err(Error::from)?;
        let open_conflicts = Self::read_count(&conflict_rows)?;

        let format_rows = self
            .storage
            .query(
                &format!("SELECT kind, content FROM memory_items WHERE {scope_sql} AND kind IN ('runbook', 'episode') AND status = 'active'"),
                std::mem::take(&mut scope_params),
            )
            .await
            .map_err(Error::from)?;
        let mut format_noncompliant = 0u64;
        for row in &format_rows {
            let kind_str: String = row.get(0).map_err(|e| Error::Storage(format!("reading kind: {e}")))?;
            let content: String = row.get(1).map_err(|e| Error::Storage(format!("reading content: {e}")))?;
            if let Some(kind) = ItemKind::parse(&kind_str) {
                if !crate::upsert::is_format_compliant(kind, &content) {
                    format_noncompliant += 1;
                }
            }
        }

        let governance = self.governance_snapshot(project).await.unwrap_or_default();

        let (database_path, database_size_bytes) = if self.backend_kind() == memory_storage::BackendKind::Embedded {
            let path = self.config.database.embedded_path.clone();
            let size = std::fs::metadata(&path).ok().map(|m| m.len());
            (Some(path), size)
        } else {
            (None, None)
        };

        Ok(StatsReport {
            total_items,
            by_kind,
            by_status,
            version_distribution,
            governance,
            mistakes_total,
            format_noncompliant,
            open_conflicts,
            database_path,
            database_size_bytes,
        })
    }

    fn scope_clause(&self, project: Option<&str>) -> (String, Vec<memory_storage::Value>) {
        match project {
            Some(project) => (
                "tenant = ?1 AND project = ?2".to_string(),
                vec![
                    memory_storage::Value::Text(self.tenant.clone()),
                    memory_storage::Value::Text(project.to_string()),
                ],
            ),
            None => ("tenant = ?1".to_string(), vec![memory_storage::Value::Text(self.tenant.clone())]),
        }
    }

    async fn grouped_counts(&self, sql: &str, params: Vec<memory_storage::Value>) -> Result<std::collections::HashMap<String, u64>> {
        let rows = self.storage.query(sql, params).await.map_err(Error::from)?;
        let mut out = std::collections::HashMap::new();
        for row in &rows {
            let key: String = row.get(0).map_err(|e| Error::Storage(format!("reading group key: {e}")))?;
            let count: i64 = row.get(1).map_err(|e| Error::Storage(format!("reading group count: {e}")))?;
            out.insert(key, u64::try_from(count).unwrap_or(0));
        }
        Ok(out)
    }

    /// Append one row to the audit log (spec.md §7: written on every
    /// request completion, success or failure). `seq` is assigned as
    /// `MAX(seq) + 1` within `(tenant, project)`.
    pub async fn record_audit(
        &self,
        project: &str,
        trace_id: &str,
        tool: &str,
        request_json: &serde_json::Value,
        response_summary_json: &serde_json::Value,
        is_error: bool,
    ) -> Result<()> {
        self.storage
            .exec(
                "INSERT INTO audit_records \
                 (seq, trace_id, tenant, project, timestamp, tool, request_json, response_summary_json, is_error) \
                 VALUES ((SELECT COALESCE(MAX(seq), -1) + 1 FROM audit_records WHERE tenant = ?1 AND project = ?2), \
                 ?3, ?1, ?2, ?4, ?5, ?6, ?7, ?8)",
                vec![
                    memory_storage::Value::Text(self.tenant.clone()),
                    memory_storage::Value::Text(project.to_string()),
                    memory_storage::Value::Text(trace_id.to_string()),
                    memory_storage::Value::Integer(crate::time::now_unix()),
                    memory_storage::Value::Text(tool.to_string()),
                    memory_storage::Value::Text(request_json.to_string()),
                    memory_storage::Value::Text(response_summary_json.to_string()),
                    memory_storage::Value::Integer(i64::from(is_error)),
                ],
            )
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn get_uncached(&self, id: Uuid) -> Result<MemoryItem> {
        let row = self
            .storage
            .query_one("SELECT * FROM memory_items WHERE id = ?1", vec![memory_storage::Value::Text(id.to_string())])
            .await?
            .ok_or(Error::NotFound(id))?;
        item_from_row(&row)
    }
}
