//! Global constants for memory-core.
//!
//! Centralizes the magic numbers and string lists the governance engine,
//! ranker, and upsert pipeline share, so a threshold change happens in one
//! place.

/// Governance policy defaults, overridable per `memory_maintain` call.
pub mod policy {
    pub const MAX_AGE_DAYS: i64 = 180;
    pub const MIN_USEFULNESS: f32 = -5.0;
    pub const MAX_ERROR_COUNT: u32 = 5;
    pub const KEEP_LAST_N_EPISODES: usize = 500;
    pub const QUARANTINE_ON_WRONG_THRESHOLD: u32 = 3;
    pub const DELETE_ON_WRONG_THRESHOLD: u32 = 5;

    pub const USEFULNESS_MIN: f32 = -5.0;
    pub const USEFULNESS_MAX: f32 = 5.0;

    pub const BASE_USEFULNESS_FACT_OR_RUNBOOK: f32 = 0.5;
    pub const BASE_USEFULNESS_OTHER: f32 = 0.2;
    pub const SUCCESS_BONUS: f32 = 1.0;
    pub const FAILURE_PENALTY: f32 = -0.5;

    pub const FEEDBACK_USEFUL_DELTA: f32 = 1.0;
    pub const FEEDBACK_NOT_RELEVANT_DELTA: f32 = -0.5;
    pub const INTEREST_SIGNAL_DELTA: f32 = 0.01;

    /// Tags that make an item immune to automated quarantine/prune/loop-breaker
    /// actions, regardless of error count or age.
    pub const PROTECTED_TAGS: &[&str] = &[
        "critical",
        "operational",
        "persistence",
        "credential",
        "verified",
        "guardrail",
        "ssh",
        "webshell",
        "exploit",
        "root",
    ];

    pub const PROTECTED_CONFIDENCE_THRESHOLD: f32 = 0.8;
    pub const PROTECTED_USEFULNESS_THRESHOLD: f32 = 1.0;
}

/// Fuzzy title matching thresholds for the upsert pipeline's third gate.
pub mod fuzzy_match {
    pub const MIN_KEYWORD_LENGTH: usize = 2;
    pub const BEST_MATCH_THRESHOLD: f64 = 0.60;
    pub const SECOND_BEST_CEILING: f64 = 0.55;
}

/// Keyword search normalization thresholds.
pub mod keyword_search {
    pub const MIN_KEYWORD_LENGTH: usize = 3;
}

/// Hybrid ranker weights and decay constants.
pub mod ranking {
    pub const DEFAULT_LIMIT: usize = 10;
    pub const DIVERSIFICATION_CAP_PER_KIND: usize = 3;

    pub const DECAY_EVENT: f64 = 0.15;
    pub const DECAY_STATE: f64 = 0.10;
    pub const DECAY_RULE: f64 = 0.03;
    pub const DECAY_PREFERENCE: f64 = 0.02;

    pub const RECENCY_FLOOR: f64 = 0.05;
    pub const RECENCY_CEILING: f64 = 1.0;

    pub const ERROR_PENALTY_FACTOR: f32 = 0.1;
    pub const ERROR_PENALTY_MAX: f32 = 0.5;
    pub const TITLE_BONUS_FACTOR: f32 = 0.15;
    pub const TAG_BOOST_FACTOR: f32 = 0.25;
    pub const TAG_BOOST_MAX: f32 = 0.5;
}

/// Cache sizing, per the shared in-memory LRU.
pub mod cache {
    use std::time::Duration;

    pub const CAPACITY: usize = 200;
    pub const TTL: Duration = Duration::from_secs(5 * 60);
}

/// Loop-breaker and guardrail constants.
pub mod guardrails {
    pub const MISTAKE_LOOKBACK_DAYS: i64 = 7;
    pub const GUARDRAIL_EXPIRY_DAYS: i64 = 30;
}

/// Maintenance action execution order. `memory_maintain` runs the
/// requested subset in this fixed order regardless of the order the
/// caller listed them in.
pub const MAINTENANCE_ACTION_ORDER: &[&str] = &[
    "dedup",
    "conflict",
    "prune",
    "compact",
    "loopbreak",
    "clean_links",
    "auto_guardrails",
    "archive",
    "consolidate",
    "audit_trim",
    "cross_type_overlap",
    "rebuild_fts",
    "wal_checkpoint",
    "vacuum",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usefulness_bounds_are_consistent() {
        assert!(policy::USEFULNESS_MIN < policy::USEFULNESS_MAX);
    }

    #[test]
    fn quarantine_threshold_is_not_above_delete_threshold() {
        assert!(policy::QUARANTINE_ON_WRONG_THRESHOLD <= policy::DELETE_ON_WRONG_THRESHOLD);
    }

    #[test]
    fn maintenance_order_has_fourteen_actions() {
        assert_eq!(MAINTENANCE_ACTION_ORDER.len(), 14);
    }

    #[test]
    fn protected_tags_are_non_empty() {
        assert!(!policy::PROTECTED_TAGS.is_empty());
    }
}
