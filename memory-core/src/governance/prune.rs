//! The `prune` maintenance action: evaluate every active/quarantined item
//! through the policy engine and apply the resulting transition unless the
//! item is protected.

use std::sync::Arc;

use memory_storage::{Storage, Value};

use super::lifecycle::{evaluate_policy, PolicyThresholds};
use crate::error::{Error, Result};
use crate::row::item_from_row;

#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    pub evaluated: usize,
    pub transitioned: usize,
    pub skipped_protected: usize,
}

/// Run the prune pass for `(tenant, project)`. In `dry_run`, computes the
/// same decisions but writes nothing.
pub async fn run_prune(
    storage: &Arc<dyn Storage>,
    tenant: &str,
    project: &str,
    thresholds: &PolicyThresholds,
    now: i64,
    dry_run: bool,
) -> Result<PruneReport> {
    let rows = storage
        .query(
            "SELECT * FROM memory_items WHERE tenant = ?1 AND project = ?2 AND status IN ('active', 'quarantined')",
            vec![Value::Text(tenant.to_string()), Value::Text(project.to_string())],
        )
        .await?;

    let mut report = PruneReport::default();

    for row in &rows {
        let item = item_from_row(row)?;
        report.evaluated += 1;

        let Some(decision) = evaluate_policy(&item, thresholds, now) else {
            continue;
        };

        if item.is_protected() {
            report.skipped_protected += 1;
            continue;
        }

        report.transitioned += 1;
        if dry_run {
            continue;
        }

        storage
            .exec(
                "UPDATE memory_items SET status = ?1, status_reason = ?2, updated_at = ?3 WHERE id = ?4",
                vec![
                    Value::Text(decision.new_status.as_str().to_string()),
                    Value::Text(decision.reason.clone()),
                    Value::Integer(now),
                    Value::Text(item.id.to_string()),
                ],
            )
            .await
            .map_err(Error::from)?;
    }

    Ok(report)
}
