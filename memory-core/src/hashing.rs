//! Content hashing, text normalization, and keyword extraction shared by
//! the upsert pipeline and the keyword index.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

/// A language-agnostic stop-word list. Deliberately small: this system
/// ranks technical runbooks and decisions, not prose, so it only excludes
/// words that would otherwise dominate every keyword match.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "of", "to", "in", "on", "for", "with", "is", "are",
    "was", "were", "be", "been", "this", "that", "it", "as", "at", "by", "from", "not",
];

/// SHA-256 of the normalized content, hex-encoded. Two items with
/// differently-cased or whitespace-varied but semantically identical
/// content hash the same, which is what lets the upsert idempotency gate
/// collapse true duplicates.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let normalized = normalize_text(content);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lowercase, strip diacritics, collapse punctuation to spaces, collapse
/// whitespace runs.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized text into keywords of at least `min_len` characters,
/// with stop words removed.
#[must_use]
pub fn extract_keywords(text: &str, min_len: usize) -> Vec<String> {
    normalize_text(text)
        .split_whitespace()
        .filter(|w| w.len() >= min_len && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity between two keyword sets: `|A ∩ B| / |A ∪ B|`.
#[must_use]
pub fn jaccard_similarity(a: &[String], b: &[String]) -> f64 {
    let set_a: HashSet<&String> = a.iter().collect();
    let set_b: HashSet<&String> = b.iter().collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Normalize a tag: lowercase, trimmed.
#[must_use]
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Merge `new_tags` into `old_tags`, preserving every protected tag from
/// `old_tags` even if the caller's update omitted it (spec.md §4.3, gates
/// 2 and 3: "merge tags preserving a fixed protected-tag set").
#[must_use]
pub fn merge_tags_preserving_protected(old_tags: &[String], new_tags: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = new_tags.iter().map(|t| normalize_tag(t)).collect();
    let merged_set: HashSet<String> = merged.iter().cloned().collect();

    for tag in old_tags {
        let normalized = normalize_tag(tag);
        let is_protected = crate::constants::policy::PROTECTED_TAGS
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&normalized));
        if is_protected && !merged_set.contains(&normalized) {
            merged.push(normalized);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_ignores_case_and_whitespace_differences() {
        let a = content_hash("Fix the  Auth Bug");
        let b = content_hash("fix the auth bug");
        assert_eq!(a, b);
    }

    #[test]
    fn content_hash_differs_for_different_content() {
        assert_ne!(content_hash("a"), content_hash("b"));
    }

    #[test]
    fn extract_keywords_drops_stop_words_and_short_tokens() {
        let keywords = extract_keywords("the fix is in the code", 3);
        assert!(!keywords.contains(&"the".to_string()));
        assert!(keywords.contains(&"fix".to_string()));
        assert!(keywords.contains(&"code".to_string()));
    }

    #[test]
    fn jaccard_similarity_of_identical_sets_is_one() {
        let a = vec!["deploy".to_string(), "fix".to_string()];
        assert_eq!(jaccard_similarity(&a, &a), 1.0);
    }

    #[test]
    fn jaccard_similarity_of_disjoint_sets_is_zero() {
        let a = vec!["deploy".to_string()];
        let b = vec!["rollback".to_string()];
        assert_eq!(jaccard_similarity(&a, &b), 0.0);
    }

    #[test]
    fn merge_tags_keeps_protected_tag_dropped_by_caller() {
        let old = vec!["critical".to_string(), "ops".to_string()];
        let new = vec!["ops".to_string(), "deploy".to_string()];
        let merged = merge_tags_preserving_protected(&old, &new);
        assert!(merged.contains(&"critical".to_string()));
        assert!(merged.contains(&"deploy".to_string()));
    }
}
