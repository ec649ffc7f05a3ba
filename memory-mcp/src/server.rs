//! The dispatcher: owns the [`MemoryStore`], routes JSON-RPC methods to the
//! MCP handshake (`protocol.rs`) or to one of the ten `memory_*` tools, and
//! wraps every `tools/call` in the audit trail (spec.md §7).

use std::io::{BufRead, Write};
use std::sync::Arc;

use memory_core::governance::feedback::FeedbackLabel;
use memory_core::ranker::SearchMode;
use memory_core::upsert::{BatchReport, ProposedItem};
use memory_core::{ItemKind, ItemStatus, MemoryStore, Source};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{error, info_span, Instrument};
use uuid::Uuid;

use crate::jsonrpc::{self, JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR};
use crate::protocol::{handle_initialize, handle_list_tools, handle_ping};
use crate::{audit, tools};

/// Runs the newline-delimited JSON-RPC loop: reads one request per line from
/// `reader`, spawns its handling, and funnels every response through a
/// single writer task so concurrent requests never interleave a line on
/// `writer` (spec.md §6).
pub async fn run<R>(reader: R, writer: impl Write + Send + 'static, store: Arc<MemoryStore>) -> crate::error::Result<()>
where
    R: BufRead,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer_task = tokio::task::spawn_blocking(move || {
        let mut writer = writer;
        while let Some(line) = rx.blocking_recv() {
            if let Err(e) = jsonrpc::write_line(&mut writer, &line) {
                error!(error = %e, "failed writing response line");
            }
        }
    });

    let mut reader = reader;
    let mut in_flight = Vec::new();
    loop {
        let Some(line) = jsonrpc::read_next_line(&mut reader)? else {
            break;
        };

        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                let resp = JsonRpcResponse::err(None, PARSE_ERROR, format!("parse error: {e}"), None);
                let _ = tx.send(serde_json::to_string(&resp)?);
                continue;
            }
        };

        let store = Arc::clone(&store);
        let tx = tx.clone();
        in_flight.push(tokio::spawn(async move {
            if let Some(resp) = handle_request(request, &store).await {
                if let Ok(line) = serde_json::to_string(&resp) {
                    let _ = tx.send(line);
                }
            }
        }));
    }

    drop(tx);
    for task in in_flight {
        let _ = task.await;
    }
    let _ = writer_task.await;
    Ok(())
}

/// Route one request to its handler. Returns `None` for notifications,
/// which never get a response per JSON-RPC 2.0.
async fn handle_request(request: JsonRpcRequest, store: &MemoryStore) -> Option<JsonRpcResponse> {
    match request.method.as_str() {
        "initialize" => handle_initialize(&request),
        "notifications/initialized" => None,
        "ping" => handle_ping(&request),
        "tools/list" => handle_list_tools(&request, tools::all_tools()),
        "tools/call" => Some(handle_tool_call(&request, store).await),
        _ if request.is_notification() => None,
        _ => Some(JsonRpcResponse::err(request.id.clone(), METHOD_NOT_FOUND, format!("unknown method: {}", request.method), None)),
    }
}

async fn handle_tool_call(request: &JsonRpcRequest, store: &MemoryStore) -> JsonRpcResponse {
    let params = request.params.clone().unwrap_or(Value::Null);
    let Some(name) = params.get("name").and_then(Value::as_str).map(str::to_string) else {
        return JsonRpcResponse::err(request.id.clone(), INVALID_PARAMS, "tools/call requires a string `name`", None);
    };
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    let trace_id = audit::new_trace_id();
    let mut project = arguments.get("project_id").and_then(Value::as_str).unwrap_or("").to_string();

    let span = info_span!("tool_call", trace_id = %trace_id, tool = %name, project = %project);
    let (result, is_error) = dispatch_tool(&name, &arguments, store).instrument(span).await;

    let response_value = match &result {
        Ok(v) => v.clone(),
        Err(message) => json!({ "message": message }),
    };
    if project.is_empty() {
        if let Some(resolved) = response_value.get("project_id").and_then(Value::as_str) {
            project = resolved.to_string();
        }
    }

    // Forensic metadata is unconditional (spec.md §6): even a tool call
    // that never named a project (or whose project only became known from
    // the looked-up item, above) still gets a full `meta.forensic` block.
    let fallback_reason = response_value.get("fallback_reason").and_then(Value::as_str);
    let meta = if project.is_empty() {
        json!({"trace_id": trace_id, "forensic": audit::build_forensic_unscoped(store).await})
    } else {
        audit::build_meta(store, &trace_id, &project, fallback_reason).await
    };

    let summary = audit::summarize_response(&response_value, is_error);
    if !project.is_empty() {
        if let Err(e) = store.record_audit(&project, &trace_id, &name, &arguments, &summary, is_error).await {
            error!(error = %e, "failed writing audit record");
        }
    }

    let content_text = match &result {
        Ok(v) => serde_json::to_string(v).unwrap_or_else(|_| "{}".to_string()),
        Err(message) => message.clone(),
    };
    let tool_result = json!({
        "content": [{ "type": "text", "text": content_text }],
        "isError": is_error,
        "meta": meta,
    });

    JsonRpcResponse::ok(request.id.clone(), tool_result)
}

/// Execute one tool by name. Returns `(payload, is_error)` — validation,
/// not-found, and storage failures all become `Err(message)` with
/// `is_error = true` rather than propagating as a transport-level error;
/// per spec.md §7 only parse/protocol failures abort the session.
async fn dispatch_tool(name: &str, args: &Value, store: &MemoryStore) -> (Result<Value, String>, bool) {
    let outcome = match name {
        "memory_upsert" => tool_upsert(args, store).await,
        "memory_search" => tool_search(args, store).await,
        "memory_get" => tool_get(args, store).await,
        "memory_forget" => tool_forget(args, store).await,
        "memory_feedback" => tool_feedback(args, store).await,
        "memory_summarize" => tool_summarize(args, store).await,
        "memory_maintain" => tool_maintain(args, store).await,
        "memory_list" => tool_list(args, store).await,
        "memory_stats" => tool_stats(args, store).await,
        "memory_reflect" => tool_reflect(args, store).await,
        other => Err(format!("unknown tool: {other}")),
    };
    match outcome {
        Ok(v) => (Ok(v), false),
        Err(e) => (Err(e), true),
    }
}

fn require_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, String> {
    args.get(field).and_then(Value::as_str).filter(|s| !s.is_empty()).ok_or_else(|| format!("missing required field `{field}`"))
}

fn require_uuid(args: &Value, field: &str) -> Result<Uuid, String> {
    let raw = require_str(args, field)?;
    Uuid::parse_str(raw).map_err(|e| format!("invalid `{field}`: {e}"))
}

fn batch_report_json(report: &BatchReport) -> Value {
    json!({
        "results": report.results.iter().map(|r| json!({
            "id": r.id.to_string(),
            "title": r.title,
            "action": r.action.as_str(),
        })).collect::<Vec<_>>(),
        "warnings": report.warnings,
    })
}

async fn tool_upsert(args: &Value, store: &MemoryStore) -> Result<Value, String> {
    let items_raw = args.get("items").and_then(Value::as_array).ok_or("missing required field `items`")?;
    if items_raw.is_empty() {
        return Err("`items` must not be empty".to_string());
    }

    let mut items = Vec::with_capacity(items_raw.len());
    for item in items_raw {
        let kind_str = require_str(item, "kind")?;
        let kind = ItemKind::parse(kind_str).ok_or_else(|| format!("unknown kind: {kind_str}"))?;
        let source = item
            .get("source")
            .and_then(Value::as_str)
            .map(|s| match s {
                "human" => Ok(Source::Human),
                "system" => Ok(Source::System),
                "agent" => Ok(Source::Agent),
                other => Err(format!("unknown source: {other}")),
            })
            .transpose()?
            .unwrap_or(Source::Agent);

        items.push(ProposedItem {
            kind,
            project: require_str(item, "project_id")?.to_string(),
            title: require_str(item, "title")?.to_string(),
            content: require_str(item, "content")?.to_string(),
            tags: item
                .get("tags")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default(),
            verified: item.get("verified").and_then(Value::as_bool).unwrap_or(false),
            confidence: item.get("confidence").and_then(Value::as_f64).map_or(0.5, |f| f as f32),
            provenance: item.get("provenance").cloned().unwrap_or_else(|| json!({})),
            success: item.get("success").and_then(Value::as_bool),
            source,
        });
    }

    let report = store.upsert(items).await.map_err(|e| e.to_string())?;
    Ok(batch_report_json(&report))
}

async fn tool_search(args: &Value, store: &MemoryStore) -> Result<Value, String> {
    let query = require_str(args, "query")?;
    let project = require_str(args, "project_id")?;
    let mode = match args.get("mode").and_then(Value::as_str) {
        Some("keyword_only") => SearchMode::KeywordOnly,
        Some("vector_only") => SearchMode::VectorOnly,
        Some("hybrid") | None => SearchMode::Hybrid,
        Some(other) => return Err(format!("unknown search mode: {other}")),
    };
    let limit = args.get("limit").and_then(Value::as_u64).map_or(10, |n| n as usize);
    let override_quarantine = args.get("override_quarantine").and_then(Value::as_bool).unwrap_or(false);

    let outcome = store.search(query, project, mode, limit, override_quarantine).await.map_err(|e| e.to_string())?;
    let count = outcome.hits.len();
    Ok(json!({
        "results": outcome.hits.into_iter().map(|h| json!({
            "id": h.item.id.to_string(),
            "title": h.item.title,
            "kind": h.item.kind.as_str(),
            "content": h.item.content,
            "tags": h.item.tags,
            "score": h.score,
        })).collect::<Vec<_>>(),
        "count": count,
        "excluded": outcome.excluded.into_iter().map(|e| json!({ "id": e.id.to_string(), "reason": e.reason })).collect::<Vec<_>>(),
        "guardrail_warnings": outcome.guardrail_warnings,
        "fallback_reason": outcome.fallback_reason,
    }))
}

fn item_json(item: &memory_core::MemoryItem) -> Value {
    json!({
        "id": item.id.to_string(),
        "project_id": item.project,
        "kind": item.kind.as_str(),
        "title": item.title,
        "content": item.content,
        "tags": item.tags,
        "verified": item.verified,
        "confidence": item.confidence,
        "usefulness_score": item.usefulness_score,
        "error_count": item.error_count,
        "version": item.version,
        "status": item.status.as_str(),
        "status_reason": item.status_reason,
        "source": match item.source {
            Source::Agent => "agent",
            Source::Human => "human",
            Source::System => "system",
        },
        "created_at": item.created_at,
        "updated_at": item.updated_at,
        "last_used_at": item.last_used_at,
    })
}

async fn tool_get(args: &Value, store: &MemoryStore) -> Result<Value, String> {
    let id = require_uuid(args, "id")?;
    let item = store.get(id).await.map_err(|e| e.to_string())?;
    Ok(item_json(&item))
}

/// Looks up the item first (even on the id-based path) so the response can
/// always carry `project_id` — `handle_tool_call` uses it to resolve
/// forensic metadata and the audit record for tools that don't take
/// `project_id` as an argument.
async fn tool_forget(args: &Value, store: &MemoryStore) -> Result<Value, String> {
    let reason = require_str(args, "reason")?;
    let (id, project) = match args.get("id").and_then(Value::as_str) {
        Some(raw) => {
            let id = Uuid::parse_str(raw).map_err(|e| format!("invalid `id`: {e}"))?;
            let project = store.get(id).await.map_err(|e| e.to_string())?.project;
            (id, project)
        }
        None => {
            let selector = require_str(args, "selector")?;
            let project = require_str(args, "project_id")?;
            let outcome = store.search(selector, project, SearchMode::KeywordOnly, 1, false).await.map_err(|e| e.to_string())?;
            let id = outcome.hits.first().map(|h| h.item.id).ok_or_else(|| format!("no item matched selector: {selector}"))?;
            (id, project.to_string())
        }
    };
    store.forget(id, reason).await.map_err(|e| e.to_string())?;
    Ok(json!({ "action": "forgotten", "id": id.to_string(), "project_id": project }))
}

async fn tool_feedback(args: &Value, store: &MemoryStore) -> Result<Value, String> {
    let id = require_uuid(args, "id")?;
    let label_str = require_str(args, "label")?;
    let label = FeedbackLabel::parse(label_str).ok_or_else(|| format!("unknown label: {label_str}"))?;
    let project = store.get(id).await.map_err(|e| e.to_string())?.project;
    let effect = store.feedback(id, label).await.map_err(|e| e.to_string())?;
    Ok(json!({
        "action": "feedback_applied",
        "id": id.to_string(),
        "project_id": project,
        "quarantined": effect.quarantined,
        "mistake_signature": effect.mistake_signature,
    }))
}

/// `memory_summarize`: a project's state/decisions/runbooks/preferences,
/// open todos/blockers, guardrails, excluded items, and graph conflicts,
/// composed from `list`, `governance_snapshot`, and the graph rather than a
/// dedicated storage query — this tool never needs anything
/// `memory_list`/`memory_stats` don't already expose.
async fn tool_summarize(args: &Value, store: &MemoryStore) -> Result<Value, String> {
    let project = require_str(args, "project_id")?;

    let state = store.list(project, Some(ItemKind::State), Some(ItemStatus::Active), "updated_at", true, 20, 0).await.map_err(|e| e.to_string())?;
    let decisions = store.list(project, Some(ItemKind::Decision), Some(ItemStatus::Active), "updated_at", true, 20, 0).await.map_err(|e| e.to_string())?;
    let runbooks = store.list(project, Some(ItemKind::Runbook), Some(ItemStatus::Active), "usefulness_score", true, 20, 0).await.map_err(|e| e.to_string())?;
    let facts = store.list(project, Some(ItemKind::Fact), Some(ItemStatus::Active), "usefulness_score", true, 20, 0).await.map_err(|e| e.to_string())?;
    let governance = store.governance_snapshot(Some(project)).await.map_err(|e| e.to_string())?;
    let excluded = store.excluded_items(project).await.map_err(|e| e.to_string())?;
    let conflicts = store.graph_conflicts(project).await.map_err(|e| e.to_string())?;

    let related_ids: Vec<Uuid> = state.iter().chain(decisions.iter()).map(|i| i.id).collect();
    let related = store.related_context(&related_ids).await.map_err(|e| e.to_string())?;

    Ok(json!({
        "project_id": project,
        "state": state.iter().map(item_json).collect::<Vec<_>>(),
        "decisions": decisions.iter().map(item_json).collect::<Vec<_>>(),
        "runbooks": runbooks.iter().map(item_json).collect::<Vec<_>>(),
        "preferences": facts.iter().filter(|i| i.tags.iter().any(|t| t.eq_ignore_ascii_case("preference"))).map(item_json).collect::<Vec<_>>(),
        "open_todos": state.iter().filter(|i| i.tags.iter().any(|t| t.eq_ignore_ascii_case("todo"))).map(item_json).collect::<Vec<_>>(),
        "blockers": state.iter().filter(|i| i.tags.iter().any(|t| t.eq_ignore_ascii_case("blocker"))).map(item_json).collect::<Vec<_>>(),
        "guardrails_active": governance.guardrails_active,
        "quarantined": governance.quarantined,
        "excluded_items": excluded.into_iter().map(|e| json!({ "id": e.id.to_string(), "reason": e.reason })).collect::<Vec<_>>(),
        "graph_conflicts": conflicts.iter().map(|link| json!({
            "item_a": link.from_id.to_string(),
            "item_b": link.to_id.to_string(),
        })).collect::<Vec<_>>(),
        "related_context": related.iter().map(item_json).collect::<Vec<_>>(),
    }))
}

async fn tool_maintain(args: &Value, store: &MemoryStore) -> Result<Value, String> {
    let project = require_str(args, "project_id")?;
    let actions: Vec<String> = args
        .get("actions")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_else(tools_maintenance_default);
    let dry_run = args.get("dry_run").and_then(Value::as_bool).unwrap_or(false);

    let report = store.maintain(project, &actions, dry_run).await.map_err(|e| e.to_string())?;
    Ok(json!({
        "actions_run": report.actions_run,
        "dedup_removed": report.dedup_removed,
        "conflicts_found": report.conflicts_found,
        "pruned": report.pruned,
        "compacted": report.compacted,
        "loopbreaker_quarantined": report.loopbreaker_quarantined,
        "links_cleaned": report.links_cleaned,
        "guardrails_created": report.guardrails_created,
        "archived_candidates": report.archived_candidates,
        "consolidated_clusters": report.consolidated_clusters,
        "audit_rows_trimmed": report.audit_rows_trimmed,
        "cross_type_links": report.cross_type_links,
        "fts_rebuilt": report.fts_rebuilt,
        "wal_checkpointed": report.wal_checkpointed,
        "vacuumed": report.vacuumed,
    }))
}

fn tools_maintenance_default() -> Vec<String> {
    memory_core::constants::MAINTENANCE_ACTION_ORDER.iter().map(|s| (*s).to_string()).collect()
}

async fn tool_list(args: &Value, store: &MemoryStore) -> Result<Value, String> {
    let project = require_str(args, "project_id")?;
    let kind = args.get("kind").and_then(Value::as_str).map(|s| ItemKind::parse(s).ok_or_else(|| format!("unknown kind: {s}"))).transpose()?;
    let status = args.get("status").and_then(Value::as_str).map(|s| ItemStatus::parse(s).ok_or_else(|| format!("unknown status: {s}"))).transpose()?;
    let sort_field = args.get("sort_field").and_then(Value::as_str).unwrap_or("updated_at");
    let descending = args.get("descending").and_then(Value::as_bool).unwrap_or(true);
    let limit = args.get("limit").and_then(Value::as_u64).map_or(50, |n| n as usize);
    let offset = args.get("offset").and_then(Value::as_u64).map_or(0, |n| n as usize);

    let items = store.list(project, kind, status, sort_field, descending, limit, offset).await.map_err(|e| e.to_string())?;
    Ok(json!({
        "items": items.iter().map(item_json).collect::<Vec<_>>(),
        "count": items.len(),
    }))
}

async fn tool_stats(args: &Value, store: &MemoryStore) -> Result<Value, String> {
    let project = args.get("project_id").and_then(Value::as_str);
    let report = store.stats(project).await.map_err(|e| e.to_string())?;
    serde_json::to_value(&report).map_err(|e| e.to_string())
}

/// `memory_reflect`: aggregate outcome/success stats over the most recent
/// `episode` items, optionally filtered by tag. There is no dedicated
/// storage query for this — it is a reduction over `memory_list`'s output,
/// same as `memory_summarize`.
async fn tool_reflect(args: &Value, store: &MemoryStore) -> Result<Value, String> {
    let project = args.get("project_id").and_then(Value::as_str).unwrap_or("");
    if project.is_empty() {
        return Err("memory_reflect requires `project_id`".to_string());
    }
    let lookback = args.get("lookback_count").and_then(Value::as_u64).map_or(50, |n| n as usize);
    let filter_tags: Vec<String> = args
        .get("filter_tags")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    let episodes = store.list(project, Some(ItemKind::Episode), Some(ItemStatus::Active), "created_at", true, lookback, 0).await.map_err(|e| e.to_string())?;
    let relevant: Vec<_> = if filter_tags.is_empty() {
        episodes.iter().collect()
    } else {
        episodes.iter().filter(|i| i.tags.iter().any(|t| filter_tags.iter().any(|f| f.eq_ignore_ascii_case(t)))).collect()
    };

    let total = relevant.len();
    let successes = relevant.iter().filter(|i| i.usefulness_score > 0.5).count();
    let mistakes_total = store.stats(Some(project)).await.map_err(|e| e.to_string())?.mistakes_total;

    Ok(json!({
        "episodes_considered": total,
        "success_rate": if total == 0 { 0.0 } else { successes as f64 / total as f64 },
        "mistakes_total": mistakes_total,
        "recent_episode_ids": relevant.iter().map(|i| i.id.to_string()).collect::<Vec<_>>(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_str_rejects_missing_and_empty() {
        assert!(require_str(&json!({}), "query").is_err());
        assert!(require_str(&json!({"query": ""}), "query").is_err());
        assert!(require_str(&json!({"query": "hi"}), "query").is_ok());
    }

    #[test]
    fn require_uuid_rejects_malformed() {
        assert!(require_uuid(&json!({"id": "not-a-uuid"}), "id").is_err());
        let id = Uuid::new_v4();
        assert_eq!(require_uuid(&json!({"id": id.to_string()}), "id").unwrap(), id);
    }
}
