//! Wall-clock access and recency decay.
//!
//! All "now" timestamps funnel through [`now_unix`] rather than calling
//! `chrono::Utc::now()` directly, so ranking and governance tests can pass
//! an explicit `now` instead of racing the clock.

use crate::types::TemporalClass;

#[must_use]
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// `recency = clamp(1 / (1 + age_days * k), floor, ceiling)` per spec.md
/// §4.5, where `k` is the decay constant for the item's temporal class.
#[must_use]
pub fn recency_score(class: TemporalClass, updated_at: i64, now: i64) -> f64 {
    let age_days = ((now - updated_at).max(0) as f64) / 86_400.0;
    let raw = 1.0 / (1.0 + age_days * class.decay_constant());
    raw.clamp(
        crate::constants::ranking::RECENCY_FLOOR,
        crate::constants::ranking::RECENCY_CEILING,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recency_is_one_at_zero_age() {
        let score = recency_score(TemporalClass::State, 1000, 1000);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn recency_decays_toward_floor_for_old_items() {
        let now = 1_000_000_000;
        let very_old = now - 365 * 86_400 * 5;
        let score = recency_score(TemporalClass::Event, very_old, now);
        assert!((score - crate::constants::ranking::RECENCY_FLOOR).abs() < 1e-9);
    }

    #[test]
    fn rules_decay_slower_than_events() {
        let now = 1_000_000_000;
        let aged = now - 30 * 86_400;
        let event_score = recency_score(TemporalClass::Event, aged, now);
        let rule_score = recency_score(TemporalClass::Rule, aged, now);
        assert!(rule_score > event_score);
    }
}
