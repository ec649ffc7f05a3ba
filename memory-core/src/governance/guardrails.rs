//! The loop-breaker: repeated `wrong` feedback on the same signature trips
//! a guardrail that suppresses the offending item from future search
//! results (spec.md §4.7).

use std::sync::Arc;

use memory_storage::{Storage, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Guardrail, GuardrailRuleType, ItemStatus, Mistake, MistakeSeverity};

fn signature_hash(signature: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Record one occurrence of `signature`, bumping its count if it has been
/// seen before in `(tenant, project)`.
pub async fn record_mistake(
    storage: &Arc<dyn Storage>,
    tenant: &str,
    project: &str,
    signature: &str,
    now: i64,
) -> Result<Mistake> {
    let hash = signature_hash(signature);

    storage
        .exec(
            "INSERT INTO mistakes (signature_hash, tenant, project, count, severity, last_seen, notes) \
             VALUES (?1, ?2, ?3, 1, 'warn', ?4, ?5) \
             ON CONFLICT(tenant, project, signature_hash) DO UPDATE SET \
               count = count + 1, last_seen = excluded.last_seen",
            vec![
                Value::Text(hash.clone()),
                Value::Text(tenant.to_string()),
                Value::Text(project.to_string()),
                Value::Integer(now),
                Value::Text(serde_json::json!([signature]).to_string()),
            ],
        )
        .await
        .map_err(Error::from)?;

    let rows = storage
        .query(
            "SELECT signature_hash, tenant, project, count, severity, last_seen, notes FROM mistakes \
             WHERE tenant = ?1 AND project = ?2 AND signature_hash = ?3",
            vec![
                Value::Text(tenant.to_string()),
                Value::Text(project.to_string()),
                Value::Text(hash),
            ],
        )
        .await?;

    let row = rows
        .first()
        .ok_or_else(|| Error::Storage("mistake row vanished after upsert".into()))?;
    mistake_from_row(row)
}

fn mistake_from_row(row: &memory_storage::Row) -> Result<Mistake> {
    let signature_hash: String = row
        .get(0)
        .map_err(|e| Error::Storage(format!("reading signature_hash: {e}")))?;
    let tenant: String = row
        .get(1)
        .map_err(|e| Error::Storage(format!("reading tenant: {e}")))?;
    let project: String = row
        .get(2)
        .map_err(|e| Error::Storage(format!("reading project: {e}")))?;
    let count: i64 = row
        .get(3)
        .map_err(|e| Error::Storage(format!("reading count: {e}")))?;
    let severity_str: String = row
        .get(4)
        .map_err(|e| Error::Storage(format!("reading severity: {e}")))?;
    let last_seen: i64 = row
        .get(5)
        .map_err(|e| Error::Storage(format!("reading last_seen: {e}")))?;
    let notes_str: String = row
        .get(6)
        .map_err(|e| Error::Storage(format!("reading notes: {e}")))?;

    let severity = match severity_str.as_str() {
        "critical" => MistakeSeverity::Critical,
        "info" => MistakeSeverity::Info,
        _ => MistakeSeverity::Warn,
    };
    let notes: Vec<String> = serde_json::from_str(&notes_str).unwrap_or_default();

    Ok(Mistake {
        signature_hash,
        tenant,
        project,
        count: u32::try_from(count).unwrap_or(0),
        severity,
        last_seen,
        notes,
    })
}

/// Idempotently create (or refresh) a guardrail keyed by `(tenant, project,
/// pattern_signature)`.
pub async fn create_guardrail(
    storage: &Arc<dyn Storage>,
    guardrail: &Guardrail,
) -> Result<()> {
    storage
        .exec(
            "INSERT INTO guardrails (id, tenant, project, rule_type, pattern_signature, description, \
             suppress_ids, active, created_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             ON CONFLICT(tenant, project, pattern_signature) DO UPDATE SET \
               suppress_ids = excluded.suppress_ids, active = excluded.active, expires_at = excluded.expires_at",
            vec![
                Value::Text(guardrail.id.to_string()),
                Value::Text(guardrail.tenant.clone()),
                Value::Text(guardrail.project.clone()),
                Value::Text(guardrail.rule_type.as_str().to_string()),
                Value::Text(guardrail.pattern_signature.clone()),
                Value::Text(guardrail.description.clone()),
                Value::Text(serde_json::to_string(&guardrail.suppress_ids).unwrap_or_else(|_| "[]".into())),
                Value::Integer(i64::from(guardrail.active)),
                Value::Integer(guardrail.created_at),
                guardrail.expires_at.map_or(Value::Null, Value::Integer),
            ],
        )
        .await
        .map_err(Error::from)?;
    Ok(())
}

/// All item ids suppressed by a currently-live guardrail for `(tenant,
/// project)`. Search and list results filter these out.
pub async fn get_suppressed_ids(
    storage: &Arc<dyn Storage>,
    tenant: &str,
    project: &str,
    now: i64,
) -> Result<Vec<Uuid>> {
    let rows = storage
        .query(
            "SELECT suppress_ids, expires_at FROM guardrails \
             WHERE tenant = ?1 AND project = ?2 AND active = 1",
            vec![Value::Text(tenant.to_string()), Value::Text(project.to_string())],
        )
        .await?;

    let mut ids = Vec::new();
    for row in &rows {
        let suppress_ids_str: String = row
            .get(0)
            .map_err(|e| Error::Storage(format!("reading suppress_ids: {e}")))?;
        let expires_at: Option<i64> = row.get(1).ok();
        if expires_at.is_some_and(|exp| exp <= now) {
            continue;
        }
        let parsed: Vec<Uuid> = serde_json::from_str(&suppress_ids_str).unwrap_or_default();
        ids.extend(parsed);
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

#[derive(Debug, Clone, Default)]
pub struct LoopBreakerReport {
    pub tripped_signatures: usize,
    pub quarantined_items: usize,
}

/// Scan mistakes seen `threshold` or more times within the lookback window;
/// for each, quarantine the unprotected items whose audit trail names them
/// in the signature, and create (or refresh) a `warn` guardrail suppressing
/// them for `GUARDRAIL_EXPIRY_DAYS`.
pub async fn check_loop_breaker(
    storage: &Arc<dyn Storage>,
    tenant: &str,
    project: &str,
    threshold: u32,
    now: i64,
) -> Result<LoopBreakerReport> {
    let lookback_floor = now - crate::constants::guardrails::MISTAKE_LOOKBACK_DAYS * 86_400;

    let rows = storage
        .query(
            "SELECT signature_hash, tenant, project, count, severity, last_seen, notes FROM mistakes \
             WHERE tenant = ?1 AND project = ?2 AND count >= ?3 AND last_seen >= ?4",
            vec![
                Value::Text(tenant.to_string()),
                Value::Text(project.to_string()),
                Value::Integer(i64::from(threshold)),
                Value::Integer(lookback_floor),
            ],
        )
        .await?;

    let mut report = LoopBreakerReport::default();

    for row in &rows {
        let mistake = mistake_from_row(row)?;
        let mut suppress_ids = Vec::new();

        for note in &mistake.notes {
            if let Some(id) = extract_item_id(note) {
                if quarantine_if_unprotected(storage, id, now).await? {
                    suppress_ids.push(id);
                    report.quarantined_items += 1;
                }
            }
        }

        if suppress_ids.is_empty() {
            continue;
        }

        let guardrail = Guardrail {
            id: Uuid::new_v4(),
            tenant: tenant.to_string(),
            project: project.to_string(),
            rule_type: GuardrailRuleType::Warn,
            pattern_signature: mistake.signature_hash.clone(),
            description: format!("loop-breaker: {} occurrences within lookback window", mistake.count),
            suppress_ids,
            active: true,
            created_at: now,
            expires_at: Some(now + crate::constants::guardrails::GUARDRAIL_EXPIRY_DAYS * 86_400),
        };
        create_guardrail(storage, &guardrail).await?;
        report.tripped_signatures += 1;
    }

    Ok(report)
}

/// Mistake signatures are `wrong:{title}:{id}` (see
/// [`super::feedback::apply_feedback`]); pull the id back out.
fn extract_item_id(note: &str) -> Option<Uuid> {
    note.rsplit(':').next().and_then(|s| Uuid::parse_str(s).ok())
}

async fn quarantine_if_unprotected(storage: &Arc<dyn Storage>, id: Uuid, now: i64) -> Result<bool> {
    let rows = storage
        .query("SELECT * FROM memory_items WHERE id = ?1", vec![Value::Text(id.to_string())])
        .await?;
    let Some(row) = rows.first() else {
        return Ok(false);
    };
    let item = crate::row::item_from_row(row)?;
    if item.is_protected() || item.status != ItemStatus::Active {
        return Ok(false);
    }

    storage
        .exec(
            "UPDATE memory_items SET status = 'quarantined', status_reason = ?1, updated_at = ?2 WHERE id = ?3",
            vec![
                Value::Text("loop-breaker: repeated wrong feedback".to_string()),
                Value::Integer(now),
                Value::Text(id.to_string()),
            ],
        )
        .await
        .map_err(Error::from)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_item_id_from_signature() {
        let id = Uuid::new_v4();
        let signature = format!("wrong:Some Title:{id}");
        assert_eq!(extract_item_id(&signature), Some(id));
    }

    #[test]
    fn malformed_signature_yields_none() {
        assert_eq!(extract_item_id("not-a-signature"), None);
    }
}
