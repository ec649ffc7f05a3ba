//! Keyword and vector indices over `memory_items`. Each returns raw,
//! unmerged partial scores; [`crate::ranker`] is where they combine.

pub mod keyword;
pub mod vector;

pub use keyword::{keyword_search, KeywordHit};
pub use vector::{vector_search, VectorHit};

use uuid::Uuid;

/// Shared pre-filter applied by both indices before scoring.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub tenant: String,
    pub project: String,
    pub excluded_statuses: Vec<crate::types::ItemStatus>,
    pub kinds: Option<Vec<crate::types::ItemKind>>,
    pub tags: Option<Vec<String>>,
}

/// A scored reference to an item, without the item body. Callers fetch the
/// full row only for identifiers that survive ranking.
#[derive(Debug, Clone, Copy)]
pub struct ScoredId {
    pub id: Uuid,
    pub score: f64,
}
