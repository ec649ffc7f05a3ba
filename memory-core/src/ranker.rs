//! Hybrid ranking: merge keyword/vector partial scores, apply temporal
//! decay and reranking multipliers, diversify, and cap at `limit`.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::constants::ranking;
use crate::hashing;
use crate::index::{KeywordHit, VectorHit};
use crate::time::recency_score;
use crate::types::{ItemStatus, MemoryItem, TemporalClass};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchMode {
    KeywordOnly,
    Hybrid,
    VectorOnly,
}

impl SearchMode {
    #[must_use]
    pub fn weights(self) -> (f64, f64, f64) {
        match self {
            SearchMode::KeywordOnly => (0.75, 0.0, 0.25),
            SearchMode::Hybrid => (0.5, 0.3, 0.2),
            SearchMode::VectorOnly => (0.0, 0.8, 0.2),
        }
    }
}

/// Words common enough across runbooks/episodes that an exact tag match on
/// one of them shouldn't count toward the target-tag boost.
const COMMON_TECHNIQUE_WORDS: &[&str] = &[
    "error", "fix", "issue", "bug", "test", "deploy", "config", "setup", "run", "check",
];

#[derive(Debug, Clone)]
pub struct RankedHit {
    pub item: MemoryItem,
    pub score: f64,
}

/// Merge keyword and vector hits by identity, score each against `items`
/// (already loaded by the caller), and return the top `limit` sorted
/// descending. `query_keywords` drives the title-bonus and tag-boost
/// reranking multipliers.
#[must_use]
pub fn rank(
    items: Vec<MemoryItem>,
    keyword_hits: &[KeywordHit],
    vector_hits: &[VectorHit],
    query_keywords: &[String],
    mode: SearchMode,
    now: i64,
    limit: usize,
    diversify: bool,
) -> Vec<RankedHit> {
    let (w_kw, w_vec, w_rec) = mode.weights();

    let kw_scores: HashMap<Uuid, f64> = keyword_hits.iter().map(|h| (h.id, h.raw_score)).collect();
    let vec_scores: HashMap<Uuid, f64> = vector_hits.iter().map(|h| (h.id, h.score)).collect();

    let mut scored: Vec<RankedHit> = items
        .into_iter()
        .map(|item| {
            let kw_norm = kw_scores.get(&item.id).copied().unwrap_or(0.0).min(20.0) / 20.0;
            let vec_score = vec_scores.get(&item.id).copied().unwrap_or(0.0);

            let class = TemporalClass::classify(item.kind, &item.tags);
            let recency = recency_score(class, item.updated_at, now);

            let verified_bonus = if item.verified { 0.1 } else { 0.0 };
            let deprecated_mult = if item.status == ItemStatus::Deprecated {
                0.7
            } else {
                1.0
            };

            let base = (w_kw * kw_norm + w_vec * vec_score + w_rec * recency + verified_bonus)
                * deprecated_mult;

            let error_penalty =
                1.0 - (f64::from(item.error_count) * f64::from(ranking::ERROR_PENALTY_FACTOR))
                    .min(f64::from(ranking::ERROR_PENALTY_MAX));

            let title_keywords = hashing::extract_keywords(&item.title, 2);
            let title_match_ratio = match_ratio(query_keywords, &title_keywords);
            let title_bonus = 1.0 + title_match_ratio * f64::from(ranking::TITLE_BONUS_FACTOR);

            let tag_hits = query_keywords
                .iter()
                .filter(|kw| {
                    !COMMON_TECHNIQUE_WORDS.contains(&kw.as_str())
                        && item.tags.iter().any(|t| t == *kw)
                })
                .count();
            let tag_boost = 1.0
                + (tag_hits as f64 * f64::from(ranking::TAG_BOOST_FACTOR))
                    .min(f64::from(ranking::TAG_BOOST_MAX));

            let score = (base * error_penalty * title_bonus * tag_boost).min(1.0);

            RankedHit { item, score }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    if diversify {
        diversify_by_kind(scored, limit)
    } else {
        scored.truncate(limit);
        scored
    }
}

fn match_ratio(query_keywords: &[String], candidate_keywords: &[String]) -> f64 {
    if query_keywords.is_empty() {
        return 0.0;
    }
    let candidate_set: HashSet<&String> = candidate_keywords.iter().collect();
    let matched = query_keywords.iter().filter(|kw| candidate_set.contains(kw)).count();
    matched as f64 / query_keywords.len() as f64
}

/// Walk the score-sorted list, admitting at most
/// [`ranking::DIVERSIFICATION_CAP_PER_KIND`] items per kind, until `limit`
/// results are collected or the input is exhausted.
fn diversify_by_kind(scored: Vec<RankedHit>, limit: usize) -> Vec<RankedHit> {
    let mut per_kind_count: HashMap<crate::types::ItemKind, usize> = HashMap::new();
    let mut out = Vec::with_capacity(limit);

    for hit in scored {
        if out.len() >= limit {
            break;
        }
        let count = per_kind_count.entry(hit.item.kind).or_insert(0);
        if *count >= ranking::DIVERSIFICATION_CAP_PER_KIND {
            continue;
        }
        *count += 1;
        out.push(hit);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemKind, Source};

    fn item(id: Uuid, kind: ItemKind, score_inputs: (bool, u32)) -> MemoryItem {
        MemoryItem {
            id,
            tenant: "t".into(),
            project: "p".into(),
            kind,
            title: "Sample title".into(),
            content: "content".into(),
            tags: vec![],
            verified: score_inputs.0,
            confidence: 0.5,
            usefulness_score: 0.0,
            error_count: score_inputs.1,
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
    fn score_is_capped_at_one() {
        let id = Uuid::new_v4();
        let items = vec![item(id, ItemKind::Fact, (true, 0))];
        let kw_hits = vec![KeywordHit { id, raw_score: 100.0 }];
        let vec_hits = vec![VectorHit { id, score: 1.0 }];
        let ranked = rank(items, &kw_hits, &vec_hits, &[], SearchMode::Hybrid, 0, 10, false);
        assert!(ranked[0].score <= 1.0);
    }

    #[test]
    fn diversification_caps_per_kind_results() {
        let items: Vec<MemoryItem> = (0..6)
            .map(|_| item(Uuid::new_v4(), ItemKind::Episode, (false, 0)))
            .collect();
        let ranked = rank(items, &[], &[], &[], SearchMode::Hybrid, 0, 10, true);
        assert!(ranked.len() <= ranking::DIVERSIFICATION_CAP_PER_KIND);
    }

    #[test]
    fn error_count_reduces_score() {
        let low_errors = Uuid::new_v4();
        let high_errors = Uuid::new_v4();
        let items = vec![item(low_errors, ItemKind::Fact, (false, 0)), item(high_errors, ItemKind::Fact, (false, 5))];
        let kw_hits = vec![
            KeywordHit { id: low_errors, raw_score: 10.0 },
            KeywordHit { id: high_errors, raw_score: 10.0 },
        ];
        let ranked = rank(items, &kw_hits, &[], &[], SearchMode::KeywordOnly, 0, 10, false);
        let low = ranked.iter().find(|r| r.item.id == low_errors).unwrap();
        let high = ranked.iter().find(|r| r.item.id == high_errors).unwrap();
        assert!(low.score > high.score);
    }
}
