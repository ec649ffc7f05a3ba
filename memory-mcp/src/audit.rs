//! Forensic metadata (spec.md §6) and the audit trail (spec.md §7): every
//! tool response carries a `meta` block, and every tool call is logged to
//! `audit_records` regardless of success.

use memory_core::{BackendKind, MemoryStore};
use serde_json::{json, Value};
use uuid::Uuid;

#[must_use]
pub fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

fn backend_str(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Embedded => "embedded",
        BackendKind::Server => "server",
    }
}

/// Build the `meta.forensic` block. Governance and cross-model-conflict
/// counts come from cheap per-project queries; failures there degrade to
/// zeroed counts rather than failing the whole tool call, since forensic
/// metadata is diagnostic, not load-bearing. `fallback_reason` is the
/// degraded-embedding reason from this specific request, if any (only
/// `memory_search` ever produces one).
pub async fn build_forensic(store: &MemoryStore, project: &str, fallback_reason: Option<&str>) -> Value {
    let snapshot = store.governance_snapshot(Some(project)).await.unwrap_or_default();
    let conflicts = store.conflict_count(project).await.unwrap_or(0);
    base_forensic(store, &snapshot, conflicts, fallback_reason)
}

/// The same block, for the rare tool call (e.g. `memory_stats` with no
/// `project_id`) where no project could be resolved even from the
/// response payload — governance and conflict counts fall back to
/// tenant-wide aggregates.
pub async fn build_forensic_unscoped(store: &MemoryStore) -> Value {
    let snapshot = store.governance_snapshot(None).await.unwrap_or_default();
    base_forensic(store, &snapshot, 0, None)
}

fn base_forensic(store: &MemoryStore, snapshot: &memory_core::store::GovernanceSnapshot, cross_model_conflicts: u64, fallback_reason: Option<&str>) -> Value {
    json!({
        "db_backend": backend_str(store.backend_kind()),
        "embedding_mode": store.embedding_mode(),
        "embedding_backend_used": store.embedding_model_names().last(),
        "embedding_fallback_reason": fallback_reason,
        "governance": {
            "quarantined": snapshot.quarantined,
            "deleted": snapshot.deleted,
            "guardrails_active": snapshot.guardrails_active,
        },
        "cross_model": {
            "models": store.embedding_model_names(),
            "conflicts": cross_model_conflicts,
        },
    })
}

pub async fn build_meta(store: &MemoryStore, trace_id: &str, project: &str, fallback_reason: Option<&str>) -> Value {
    json!({
        "trace_id": trace_id,
        "forensic": build_forensic(store, project, fallback_reason).await,
    })
}

/// A condensed view of a tool response, cheap enough to store in
/// `audit_records.response_summary_json` without duplicating the full
/// payload.
#[must_use]
pub fn summarize_response(result: &Value, is_error: bool) -> Value {
    if is_error {
        return json!({ "is_error": true, "message": result.get("message").cloned() });
    }
    match result {
        Value::Object(map) => {
            let mut summary = serde_json::Map::new();
            for key in ["action", "status", "count", "results"] {
                if let Some(v) = map.get(key) {
                    summary.insert(key.to_string(), v.clone());
                }
            }
            Value::Object(summary)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_unique() {
        assert_ne!(new_trace_id(), new_trace_id());
    }

    #[test]
    fn error_summary_carries_message() {
        let summary = summarize_response(&json!({"message": "not found"}), true);
        assert_eq!(summary["is_error"], true);
        assert_eq!(summary["message"], "not found");
    }

    #[test]
    fn ok_summary_keeps_whitelisted_fields_only() {
        let summary = summarize_response(&json!({"action": "created", "id": "x", "noise": 1}), false);
        assert_eq!(summary["action"], "created");
        assert!(summary.get("id").is_none());
        assert!(summary.get("noise").is_none());
    }
}
