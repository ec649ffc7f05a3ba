//! Feedback labels and their effect on an item's score, error count, and
//! status (spec.md §4.4).

use crate::types::{ItemStatus, MemoryItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackLabel {
    Useful,
    NotRelevant,
    Wrong,
}

impl FeedbackLabel {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "useful" => Some(FeedbackLabel::Useful),
            "not_relevant" => Some(FeedbackLabel::NotRelevant),
            "wrong" => Some(FeedbackLabel::Wrong),
            _ => None,
        }
    }
}

/// Side effects the caller must persist after calling [`apply_feedback`]:
/// the mutated item always needs writing back; `mistake_signature` is
/// `Some` only when a `wrong` label was recorded.
#[derive(Debug, Clone)]
pub struct FeedbackEffect {
    pub quarantined: bool,
    pub mistake_signature: Option<String>,
}

/// Mutate `item` in place per the feedback label, using
/// `quarantine_on_wrong_threshold` to decide whether a `wrong` label trips
/// quarantine. Protected items still accumulate score/error-count changes
/// but never auto-quarantine.
#[must_use]
pub fn apply_feedback(
    item: &mut MemoryItem,
    label: FeedbackLabel,
    quarantine_on_wrong_threshold: u32,
) -> FeedbackEffect {
    match label {
        FeedbackLabel::Useful => {
            item.usefulness_score = (item.usefulness_score + crate::constants::policy::FEEDBACK_USEFUL_DELTA)
                .min(crate::constants::policy::USEFULNESS_MAX);
            FeedbackEffect {
                quarantined: false,
                mistake_signature: None,
            }
        }
        FeedbackLabel::NotRelevant => {
            item.usefulness_score = (item.usefulness_score
                + crate::constants::policy::FEEDBACK_NOT_RELEVANT_DELTA)
                .max(crate::constants::policy::USEFULNESS_MIN);
            FeedbackEffect {
                quarantined: false,
                mistake_signature: None,
            }
        }
        FeedbackLabel::Wrong => {
            item.error_count += 1;
            item.verified = false;

            let mut quarantined = false;
            if item.error_count >= quarantine_on_wrong_threshold
                && !item.is_protected()
                && item.status == ItemStatus::Active
            {
                item.status = ItemStatus::Quarantined;
                item.status_reason = Some(format!(
                    "error_count {} >= quarantine threshold {quarantine_on_wrong_threshold}",
                    item.error_count
                ));
                quarantined = true;
            }

            let signature = format!("wrong:{}:{}", item.title, item.id);
            FeedbackEffect {
                quarantined,
                mistake_signature: Some(signature),
            }
        }
    }
}

/// `memory_get`'s implicit interest signal: a small usefulness bump capped
/// at the maximum, applied on every read.
pub fn apply_interest_signal(item: &mut MemoryItem) {
    item.usefulness_score = (item.usefulness_score + crate::constants::policy::INTEREST_SIGNAL_DELTA)
        .min(crate::constants::policy::USEFULNESS_MAX);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemKind, Source};

    fn sample() -> MemoryItem {
        MemoryItem {
            id: uuid::Uuid::new_v4(),
            tenant: "t".into(),
            project: "p".into(),
            kind: ItemKind::Runbook,
            title: "Dangerous".into(),
            content: "rm -rf /".into(),
            tags: vec![],
            verified: false,
            confidence: 0.1,
            usefulness_score: 0.5,
            error_count: 0,
            version: 1,
            status: ItemStatus::Active,
            status_reason: None,
            content_hash: "h".into(),
            embedding: None,
            provenance: serde_json::json!({}),
            source: Source::Agent,
            created_at: 0,
            updated_at: 0,
            last_used_at: None,
        }
    }

    #[test]
    fn wrong_feedback_quarantines_at_threshold_one() {
        let mut item = sample();
        let effect = apply_feedback(&mut item, FeedbackLabel::Wrong, 1);
        assert_eq!(item.status, ItemStatus::Quarantined);
        assert_eq!(item.error_count, 1);
        assert!(effect.quarantined);
    }

    #[test]
    fn protected_item_never_auto_quarantines() {
        let mut item = sample();
        item.verified = true;
        apply_feedback(&mut item, FeedbackLabel::Wrong, 1);
        assert_eq!(item.status, ItemStatus::Active);
    }

    #[test]
    fn useful_feedback_is_capped_at_five() {
        let mut item = sample();
        item.usefulness_score = 4.9;
        apply_feedback(&mut item, FeedbackLabel::Useful, 3);
        assert!((item.usefulness_score - 5.0).abs() < 1e-6);
    }

    #[test]
    fn interest_signal_increments_by_hundredth() {
        let mut item = sample();
        apply_interest_signal(&mut item);
        assert!((item.usefulness_score - 0.51).abs() < 1e-6);
    }
}
