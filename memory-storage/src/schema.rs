//! SQL schema for the memory store, shared by the embedded and server backends.

/// Primary table: one row per `MemoryItem`.
pub const CREATE_MEMORY_ITEMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS memory_items (
    id TEXT PRIMARY KEY NOT NULL,
    tenant TEXT NOT NULL,
    project TEXT NOT NULL,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    verified INTEGER NOT NULL DEFAULT 0,
    confidence REAL NOT NULL DEFAULT 0.0,
    usefulness_score REAL NOT NULL DEFAULT 0.0,
    error_count INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 1,
    status TEXT NOT NULL DEFAULT 'active',
    status_reason TEXT,
    content_hash TEXT NOT NULL,
    embedding BLOB,
    provenance TEXT NOT NULL DEFAULT '{}',
    source TEXT NOT NULL DEFAULT 'agent',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    last_used_at INTEGER
)
"#;

pub const CREATE_MEMORY_ITEMS_TENANT_PROJECT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_memory_items_tenant_project
ON memory_items(tenant, project, status)
"#;

pub const CREATE_MEMORY_ITEMS_CONTENT_HASH_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_memory_items_content_hash
ON memory_items(tenant, project, kind, content_hash)
"#;

pub const CREATE_MEMORY_ITEMS_TITLE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_memory_items_title
ON memory_items(tenant, project, kind, title)
"#;

pub const CREATE_MEMORY_ITEMS_UPDATED_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_memory_items_updated
ON memory_items(tenant, project, updated_at DESC)
"#;

/// FTS5 virtual table over title/content/tags, porter-stemmed.
///
/// `id` is UNINDEXED so it can be projected and joined without bloating the
/// index.
pub const CREATE_MEMORY_ITEMS_FTS_TABLE: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS memory_items_fts USING fts5(
    id UNINDEXED,
    title,
    content,
    tags,
    tokenize='porter unicode61'
)
"#;

pub const CREATE_MEMORY_ITEMS_FTS_TRIGGERS: &str = r#"
CREATE TRIGGER IF NOT EXISTS memory_items_ai AFTER INSERT ON memory_items BEGIN
    INSERT INTO memory_items_fts(id, title, content, tags)
    VALUES (new.id, new.title, new.content, new.tags);
END;

CREATE TRIGGER IF NOT EXISTS memory_items_au AFTER UPDATE ON memory_items BEGIN
    UPDATE memory_items_fts
    SET title = new.title,
        content = new.content,
        tags = new.tags
    WHERE id = new.id;
END;

CREATE TRIGGER IF NOT EXISTS memory_items_ad AFTER DELETE ON memory_items BEGIN
    DELETE FROM memory_items_fts WHERE id = old.id;
END;
"#;

pub const OPTIMIZE_MEMORY_ITEMS_FTS: &str = r#"
INSERT INTO memory_items_fts(memory_items_fts) VALUES('optimize')
"#;

pub const REBUILD_MEMORY_ITEMS_FTS: &str = r#"
INSERT INTO memory_items_fts(memory_items_fts) VALUES('rebuild')
"#;

/// Typed directed edges between items.
pub const CREATE_MEMORY_LINKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS memory_links (
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    relation TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 0.5,
    metadata TEXT NOT NULL DEFAULT '{}',
    auto_created INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (from_id, to_id, relation)
)
"#;

pub const CREATE_MEMORY_LINKS_TO_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_memory_links_to
ON memory_links(to_id)
"#;

/// Append-only log of every tool invocation.
pub const CREATE_AUDIT_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS audit_records (
    seq INTEGER NOT NULL,
    trace_id TEXT NOT NULL,
    tenant TEXT NOT NULL,
    project TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    tool TEXT NOT NULL,
    request_json TEXT NOT NULL,
    response_summary_json TEXT NOT NULL,
    is_error INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (tenant, project, seq)
)
"#;

pub const CREATE_AUDIT_RECORDS_TRACE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_audit_records_trace
ON audit_records(trace_id)
"#;

pub const CREATE_AUDIT_RECORDS_TIME_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_audit_records_time
ON audit_records(tenant, project, timestamp DESC)
"#;

/// Deduplicated, hashed failure signatures for the loop-breaker.
pub const CREATE_MISTAKES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS mistakes (
    signature_hash TEXT NOT NULL,
    tenant TEXT NOT NULL,
    project TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 1,
    severity TEXT NOT NULL DEFAULT 'warn',
    last_seen INTEGER NOT NULL,
    notes TEXT NOT NULL DEFAULT '[]',
    PRIMARY KEY (tenant, project, signature_hash)
)
"#;

/// Declarative suppress/block/warn rules produced by the loop-breaker or
/// issued manually.
pub const CREATE_GUARDRAILS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS guardrails (
    id TEXT PRIMARY KEY NOT NULL,
    tenant TEXT NOT NULL,
    project TEXT NOT NULL,
    rule_type TEXT NOT NULL,
    pattern_signature TEXT NOT NULL,
    description TEXT NOT NULL,
    suppress_ids TEXT NOT NULL DEFAULT '[]',
    active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    expires_at INTEGER,
    UNIQUE(tenant, project, pattern_signature)
)
"#;

pub const CREATE_GUARDRAILS_ACTIVE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_guardrails_active
ON guardrails(tenant, project, active, expires_at)
"#;

/// Pairs of items flagged as conflicting, stored in canonical `(item_a,
/// item_b)` order.
pub const CREATE_MODEL_CONFLICTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS model_conflicts (
    item_a TEXT NOT NULL,
    item_b TEXT NOT NULL,
    conflict_type TEXT NOT NULL,
    resolution_status TEXT NOT NULL DEFAULT 'open',
    tenant TEXT NOT NULL,
    project TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (item_a, item_b, conflict_type)
)
"#;

/// Prior snapshots written on every content-changing update.
pub const CREATE_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS history (
    item_id TEXT NOT NULL,
    version INTEGER NOT NULL,
    tenant TEXT NOT NULL,
    project TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    content_hash TEXT NOT NULL,
    usefulness_score REAL NOT NULL,
    updated_at INTEGER NOT NULL,
    reason TEXT NOT NULL,
    PRIMARY KEY (item_id, version)
)
"#;

/// Companion table used by the server backend to emulate advisory locks,
/// which libSQL/SQLite has no native primitive for. A row's presence is the
/// lock; `with_lock` inserts it and deletes it on release.
pub const CREATE_ADVISORY_LOCKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS advisory_locks (
    lock_key INTEGER PRIMARY KEY NOT NULL,
    holder TEXT NOT NULL,
    acquired_at INTEGER NOT NULL
)
"#;

/// All DDL statements, in dependency order, applied once at backend startup.
pub const ALL_TABLES: &[&str] = &[
    CREATE_MEMORY_ITEMS_TABLE,
    CREATE_MEMORY_ITEMS_TENANT_PROJECT_INDEX,
    CREATE_MEMORY_ITEMS_CONTENT_HASH_INDEX,
    CREATE_MEMORY_ITEMS_TITLE_INDEX,
    CREATE_MEMORY_ITEMS_UPDATED_INDEX,
    CREATE_MEMORY_ITEMS_FTS_TABLE,
    CREATE_MEMORY_LINKS_TABLE,
    CREATE_MEMORY_LINKS_TO_INDEX,
    CREATE_AUDIT_RECORDS_TABLE,
    CREATE_AUDIT_RECORDS_TRACE_INDEX,
    CREATE_AUDIT_RECORDS_TIME_INDEX,
    CREATE_MISTAKES_TABLE,
    CREATE_GUARDRAILS_TABLE,
    CREATE_GUARDRAILS_ACTIVE_INDEX,
    CREATE_MODEL_CONFLICTS_TABLE,
    CREATE_HISTORY_TABLE,
    CREATE_ADVISORY_LOCKS_TABLE,
];

/// Trigger DDL applied after `ALL_TABLES`, since triggers reference the base
/// table.
pub const ALL_TRIGGERS: &[&str] = &[CREATE_MEMORY_ITEMS_FTS_TRIGGERS];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_statements_are_non_empty() {
        for stmt in ALL_TABLES.iter().chain(ALL_TRIGGERS) {
            assert!(!stmt.trim().is_empty());
        }
    }
}
