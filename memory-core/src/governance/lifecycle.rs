//! The status-transition table (spec.md §4.4): given an item's current
//! state and the governance thresholds, decide whether (and how) it moves.

use crate::types::{ItemKind, ItemStatus, MemoryItem};

#[derive(Debug, Clone, Copy)]
pub struct PolicyThresholds {
    pub max_age_days: i64,
    pub min_usefulness: f32,
    pub max_error_count: u32,
    pub quarantine_on_wrong_threshold: u32,
    pub delete_on_wrong_threshold: u32,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            max_age_days: crate::constants::policy::MAX_AGE_DAYS,
            min_usefulness: crate::constants::policy::MIN_USEFULNESS,
            max_error_count: crate::constants::policy::MAX_ERROR_COUNT,
            quarantine_on_wrong_threshold: crate::constants::policy::QUARANTINE_ON_WRONG_THRESHOLD,
            delete_on_wrong_threshold: crate::constants::policy::DELETE_ON_WRONG_THRESHOLD,
        }
    }
}

impl From<&crate::config::PolicyConfig> for PolicyThresholds {
    fn from(cfg: &crate::config::PolicyConfig) -> Self {
        Self {
            max_age_days: cfg.max_age_days,
            min_usefulness: cfg.min_usefulness,
            max_error_count: crate::constants::policy::MAX_ERROR_COUNT,
            quarantine_on_wrong_threshold: cfg.quarantine_on_wrong_threshold,
            delete_on_wrong_threshold: cfg.delete_on_wrong_threshold,
        }
    }
}

/// A proposed status transition, carrying the reason that gets written to
/// `status_reason`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub new_status: ItemStatus,
    pub reason: String,
}

/// Map a would-be `deleted` transition to the kind-safe terminal state:
/// `decision` and `state` items are never deleted (spec.md §3 invariant).
fn safe_delete_target(kind: ItemKind) -> Option<ItemStatus> {
    match kind {
        ItemKind::Decision => Some(ItemStatus::Deprecated),
        ItemKind::State => None,
        _ => Some(ItemStatus::Deleted),
    }
}

/// Evaluate `item` against `thresholds`, as the `prune` maintenance action
/// does for every active item. Protected items are the caller's
/// responsibility to skip — this function only encodes the transition
/// table, not the protection check.
#[must_use]
pub fn evaluate_policy(item: &MemoryItem, thresholds: &PolicyThresholds, now: i64) -> Option<PolicyDecision> {
    if item.status != ItemStatus::Active && item.status != ItemStatus::Quarantined {
        return None;
    }

    if item.status == ItemStatus::Quarantined && item.error_count >= thresholds.delete_on_wrong_threshold {
        return match safe_delete_target(item.kind) {
            Some(ItemStatus::Deleted) => Some(PolicyDecision {
                new_status: ItemStatus::Deleted,
                reason: format!("error_count {} >= delete threshold", item.error_count),
            }),
            Some(status) => Some(PolicyDecision {
                new_status: status,
                reason: format!(
                    "error_count {} >= delete threshold; {:?} kind downgraded to {:?}",
                    item.error_count, item.kind, status
                ),
            }),
            None => None,
        };
    }

    if item.status != ItemStatus::Active {
        return None;
    }

    let age_days = ((now - item.updated_at).max(0)) / 86_400;
    if age_days > thresholds.max_age_days {
        return Some(PolicyDecision {
            new_status: ItemStatus::Deprecated,
            reason: format!("age {age_days}d exceeds max_age_days {}", thresholds.max_age_days),
        });
    }

    if item.usefulness_score < thresholds.min_usefulness {
        return Some(PolicyDecision {
            new_status: ItemStatus::Deprecated,
            reason: format!(
                "usefulness_score {} below min_usefulness {}",
                item.usefulness_score, thresholds.min_usefulness
            ),
        });
    }

    if item.error_count >= thresholds.max_error_count {
        return Some(PolicyDecision {
            new_status: ItemStatus::Quarantined,
            reason: format!("error_count {} >= max_error_count", item.error_count),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    fn sample(kind: ItemKind, status: ItemStatus, error_count: u32, usefulness: f32, updated_at: i64) -> MemoryItem {
        MemoryItem {
            id: uuid::Uuid::new_v4(),
            tenant: "t".into(),
            project: "p".into(),
            kind,
            title: "T".into(),
            content: "C".into(),
            tags: vec![],
            verified: false,
            confidence: 0.1,
            usefulness_score: usefulness,
            error_count,
            version: 1,
            status,
            status_reason: None,
            content_hash: "h".into(),
            embedding: None,
            provenance: serde_json::json!({}),
            source: Source::Agent,
            created_at: 0,
            updated_at,
            last_used_at: None,
        }
    }

    #[test]
    fn quarantined_decision_downgrades_to_deprecated_not_deleted() {
        let thresholds = PolicyThresholds::default();
        let item = sample(ItemKind::Decision, ItemStatus::Quarantined, 10, 0.0, 0);
        let decision = evaluate_policy(&item, &thresholds, 0).unwrap();
        assert_eq!(decision.new_status, ItemStatus::Deprecated);
    }

    #[test]
    fn quarantined_state_never_transitions_on_delete_threshold() {
        let thresholds = PolicyThresholds::default();
        let item = sample(ItemKind::State, ItemStatus::Quarantined, 10, 0.0, 0);
        assert!(evaluate_policy(&item, &thresholds, 0).is_none());
    }

    #[test]
    fn quarantined_runbook_deletes_past_threshold() {
        let thresholds = PolicyThresholds::default();
        let item = sample(ItemKind::Runbook, ItemStatus::Quarantined, 10, 0.0, 0);
        let decision = evaluate_policy(&item, &thresholds, 0).unwrap();
        assert_eq!(decision.new_status, ItemStatus::Deleted);
    }

    #[test]
    fn active_item_within_bounds_has_no_decision() {
        let thresholds = PolicyThresholds::default();
        let item = sample(ItemKind::Fact, ItemStatus::Active, 0, 1.0, 0);
        assert!(evaluate_policy(&item, &thresholds, 0).is_none());
    }

    #[test]
    fn stale_item_is_deprecated() {
        let thresholds = PolicyThresholds::default();
        let item = sample(ItemKind::Fact, ItemStatus::Active, 0, 1.0, 0);
        let now = 200 * 86_400;
        let decision = evaluate_policy(&item, &thresholds, now).unwrap();
        assert_eq!(decision.new_status, ItemStatus::Deprecated);
    }
}
