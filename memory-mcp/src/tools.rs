//! Tool descriptors for the ten `memory_*` tools (spec.md §6). Schemas are
//! advertised over `tools/list`; `server::dispatch_tool_call` is the
//! source of truth for what each tool actually accepts.

use serde_json::json;

use crate::protocol::McpTool;

fn tool(name: &str, description: &str, input_schema: serde_json::Value) -> McpTool {
    McpTool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

const ITEM_KINDS: &[&str] = &["fact", "state", "decision", "runbook", "episode"];
const SOURCES: &[&str] = &["agent", "human", "system"];
const SEARCH_MODES: &[&str] = &["keyword_only", "hybrid", "vector_only"];
const SORT_FIELDS: &[&str] = &["created_at", "updated_at", "usefulness_score", "title"];
const FEEDBACK_LABELS: &[&str] = &["useful", "not_relevant", "wrong"];
const MAINTENANCE_ACTIONS: &[&str] = &[
    "dedup", "conflict", "prune", "compact", "loopbreak", "clean_links", "auto_guardrails",
    "archive", "consolidate", "audit_trim", "cross_type_overlap", "rebuild_fts", "wal_checkpoint",
    "vacuum",
];

#[must_use]
pub fn all_tools() -> Vec<McpTool> {
    vec![
        tool(
            "memory_upsert",
            "Write one or more memory items through the four-gate upsert pipeline (idempotency, exact title, fuzzy title, insert).",
            json!({
                "type": "object",
                "properties": {
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "kind": { "type": "string", "enum": ITEM_KINDS },
                                "project_id": { "type": "string" },
                                "title": { "type": "string" },
                                "content": { "type": "string" },
                                "tags": { "type": "array", "items": { "type": "string" } },
                                "verified": { "type": "boolean", "default": false },
                                "confidence": { "type": "number", "default": 0.5 },
                                "provenance": { "type": "object" },
                                "success": { "type": "boolean" },
                                "source": { "type": "string", "enum": SOURCES, "default": "agent" }
                            },
                            "required": ["kind", "project_id", "title", "content"]
                        }
                    }
                },
                "required": ["items"]
            }),
        ),
        tool(
            "memory_search",
            "Hybrid keyword/vector/recency search over active, non-suppressed memory items.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "project_id": { "type": "string" },
                    "mode": { "type": "string", "enum": SEARCH_MODES, "default": "hybrid" },
                    "limit": { "type": "integer", "default": 10 },
                    "override_quarantine": { "type": "boolean", "default": false }
                },
                "required": ["query", "project_id"]
            }),
        ),
        tool(
            "memory_get",
            "Fetch a single item by id and record a usage signal.",
            json!({
                "type": "object",
                "properties": { "id": { "type": "string", "format": "uuid" } },
                "required": ["id"]
            }),
        ),
        tool(
            "memory_forget",
            "Explicit hard delete, bypassing the kind-safe downgrade rules.",
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string", "format": "uuid" },
                    "selector": { "type": "string" },
                    "reason": { "type": "string" }
                },
                "required": ["reason"]
            }),
        ),
        tool(
            "memory_feedback",
            "Apply a feedback label to an item, adjusting its usefulness score and lifecycle state.",
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string", "format": "uuid" },
                    "label": { "type": "string", "enum": FEEDBACK_LABELS }
                },
                "required": ["id", "label"]
            }),
        ),
        tool(
            "memory_summarize",
            "Summarize a project's state, key decisions, runbooks, preferences, guardrails, open todos, blockers, excluded items, graph conflicts, and related context.",
            json!({
                "type": "object",
                "properties": { "project_id": { "type": "string" } },
                "required": ["project_id"]
            }),
        ),
        tool(
            "memory_maintain",
            "Run the fixed-order maintenance pipeline (dedup, conflict, prune, compact, loopbreak, ...).",
            json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string" },
                    "actions": { "type": "array", "items": { "type": "string", "enum": MAINTENANCE_ACTIONS } },
                    "dry_run": { "type": "boolean", "default": false }
                },
                "required": ["project_id"]
            }),
        ),
        tool(
            "memory_list",
            "Paginated browse of a project's items with a sort/filter whitelist.",
            json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string" },
                    "kind": { "type": "string", "enum": ITEM_KINDS },
                    "status": { "type": "string" },
                    "sort_field": { "type": "string", "enum": SORT_FIELDS, "default": "updated_at" },
                    "descending": { "type": "boolean", "default": true },
                    "limit": { "type": "integer", "default": 50 },
                    "offset": { "type": "integer", "default": 0 }
                },
                "required": ["project_id"]
            }),
        ),
        tool(
            "memory_stats",
            "Counts, health, guardrails, format compliance, version distribution, mistakes, database size, and audit analytics.",
            json!({
                "type": "object",
                "properties": { "project_id": { "type": "string" } }
            }),
        ),
        tool(
            "memory_reflect",
            "Aggregated metacognition statistics over recent episodes.",
            json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string" },
                    "lookback_count": { "type": "integer", "default": 50 },
                    "filter_tags": { "type": "array", "items": { "type": "string" } }
                }
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ten_tools_are_present() {
        let names: Vec<_> = all_tools().into_iter().map(|t| t.name).collect();
        for expected in [
            "memory_upsert", "memory_search", "memory_get", "memory_forget", "memory_feedback",
            "memory_summarize", "memory_maintain", "memory_list", "memory_stats", "memory_reflect",
        ] {
            assert!(names.contains(&expected.to_string()), "missing tool {expected}");
        }
        assert_eq!(names.len(), 10);
    }
}
