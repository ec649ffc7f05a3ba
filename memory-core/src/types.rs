//! The data model: `MemoryItem` and its satellite tables.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a memory item represents. Governs which lifecycle terminal state it
/// maps to when `deleted` would otherwise apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Fact,
    State,
    Decision,
    Runbook,
    Episode,
}

impl ItemKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Fact => "fact",
            ItemKind::State => "state",
            ItemKind::Decision => "decision",
            ItemKind::Runbook => "runbook",
            ItemKind::Episode => "episode",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fact" => Some(ItemKind::Fact),
            "state" => Some(ItemKind::State),
            "decision" => Some(ItemKind::Decision),
            "runbook" => Some(ItemKind::Runbook),
            "episode" => Some(ItemKind::Episode),
            _ => None,
        }
    }

    /// `decision` items never reach `deleted`; `prune`/quarantine-expiry
    /// downgrades them to `deprecated` instead.
    #[must_use]
    pub fn is_never_deleted(self) -> bool {
        matches!(self, ItemKind::Decision | ItemKind::State)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Active,
    Quarantined,
    Deprecated,
    Deleted,
}

impl ItemStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Active => "active",
            ItemStatus::Quarantined => "quarantined",
            ItemStatus::Deprecated => "deprecated",
            ItemStatus::Deleted => "deleted",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ItemStatus::Active),
            "quarantined" => Some(ItemStatus::Quarantined),
            "deprecated" => Some(ItemStatus::Deprecated),
            "deleted" => Some(ItemStatus::Deleted),
            _ => None,
        }
    }
}

/// Who supplied an item's content, folded into `provenance.persona` when
/// absent from the caller's request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Agent,
    Human,
    System,
}

impl Default for Source {
    fn default() -> Self {
        Source::Agent
    }
}

/// Free-form provenance metadata carried alongside an item (persona,
/// originating tool call, model name).
pub type Provenance = serde_json::Value;

/// The unit of knowledge. Scoped to `(tenant, project)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: Uuid,
    pub tenant: String,
    pub project: String,
    pub kind: ItemKind,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub verified: bool,
    pub confidence: f32,
    pub usefulness_score: f32,
    pub error_count: u32,
    pub version: u32,
    pub status: ItemStatus,
    pub status_reason: Option<String>,
    pub content_hash: String,
    pub embedding: Option<Vec<f32>>,
    pub provenance: Provenance,
    pub source: Source,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_used_at: Option<i64>,
}

impl MemoryItem {
    #[must_use]
    pub fn is_protected(&self) -> bool {
        crate::constants::policy::PROTECTED_TAGS
            .iter()
            .any(|tag| self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
            || self.verified
            || self.confidence >= crate::constants::policy::PROTECTED_CONFIDENCE_THRESHOLD
            || self.usefulness_score >= crate::constants::policy::PROTECTED_USEFULNESS_THRESHOLD
    }
}

/// Typed directed edge between two items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Causes,
    DependsOn,
    Contradicts,
    Supersedes,
    RelatedTo,
}

impl Relation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Causes => "causes",
            Relation::DependsOn => "depends_on",
            Relation::Contradicts => "contradicts",
            Relation::Supersedes => "supersedes",
            Relation::RelatedTo => "related_to",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "causes" => Some(Relation::Causes),
            "depends_on" => Some(Relation::DependsOn),
            "contradicts" => Some(Relation::Contradicts),
            "supersedes" => Some(Relation::Supersedes),
            "related_to" => Some(Relation::RelatedTo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryLink {
    pub from_id: Uuid,
    pub to_id: Uuid,
    pub relation: Relation,
    pub weight: f32,
    pub metadata: serde_json::Value,
    pub auto_created: bool,
    pub created_at: i64,
}

/// Append-only log of every tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub seq: i64,
    pub trace_id: String,
    pub tenant: String,
    pub project: String,
    pub timestamp: i64,
    pub tool: String,
    pub request_json: serde_json::Value,
    pub response_summary_json: serde_json::Value,
    pub is_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MistakeSeverity {
    Info,
    Warn,
    Critical,
}

/// A deduplicated, hashed failure signature used by the loop-breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mistake {
    pub signature_hash: String,
    pub tenant: String,
    pub project: String,
    pub count: u32,
    pub severity: MistakeSeverity,
    pub last_seen: i64,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailRuleType {
    Block,
    Warn,
    Suppress,
}

impl GuardrailRuleType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GuardrailRuleType::Block => "block",
            GuardrailRuleType::Warn => "warn",
            GuardrailRuleType::Suppress => "suppress",
        }
    }
}

/// A declarative rule that suppresses or warns on a set of item identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guardrail {
    pub id: Uuid,
    pub tenant: String,
    pub project: String,
    pub rule_type: GuardrailRuleType,
    pub pattern_signature: String,
    pub description: String,
    pub suppress_ids: Vec<Uuid>,
    pub active: bool,
    pub created_at: i64,
    pub expires_at: Option<i64>,
}

impl Guardrail {
    #[must_use]
    pub fn is_live(&self, now: i64) -> bool {
        self.active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Interpretation,
    Contradiction,
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Open,
    Resolved,
    Dismissed,
}

/// A pair of items flagged as conflicting, always stored with `item_a <
/// item_b` in canonical order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConflict {
    pub item_a: Uuid,
    pub item_b: Uuid,
    pub conflict_type: ConflictType,
    pub resolution_status: ResolutionStatus,
    pub tenant: String,
    pub project: String,
    pub created_at: i64,
}

impl ModelConflict {
    /// Build a conflict record with `item_a`/`item_b` placed in canonical
    /// (lexicographically smaller first) order.
    #[must_use]
    pub fn canonical(
        a: Uuid,
        b: Uuid,
        conflict_type: ConflictType,
        tenant: String,
        project: String,
        created_at: i64,
    ) -> Self {
        let (item_a, item_b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            item_a,
            item_b,
            conflict_type,
            resolution_status: ResolutionStatus::Open,
            tenant,
            project,
            created_at,
        }
    }
}

/// A prior snapshot written on every content-changing update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    pub item_id: Uuid,
    pub version: u32,
    pub tenant: String,
    pub project: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub content_hash: String,
    pub usefulness_score: f32,
    pub updated_at: i64,
    pub reason: String,
}

/// Temporal decay class, derived from an item's kind and tags (spec.md
/// §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalClass {
    Event,
    State,
    Rule,
    Preference,
}

impl TemporalClass {
    #[must_use]
    pub fn classify(kind: ItemKind, tags: &[String]) -> Self {
        let has_tag = |needles: &[&str]| {
            tags.iter()
                .any(|t| needles.iter().any(|n| t.eq_ignore_ascii_case(n)))
        };

        if kind == ItemKind::Episode || has_tag(&["event", "log"]) {
            TemporalClass::Event
        } else if matches!(kind, ItemKind::Decision | ItemKind::Runbook)
            || has_tag(&["rule", "policy", "guardrail"])
        {
            TemporalClass::Rule
        } else if has_tag(&["user_preference", "preference"]) {
            TemporalClass::Preference
        } else {
            TemporalClass::State
        }
    }

    #[must_use]
    pub fn decay_constant(self) -> f64 {
        match self {
            TemporalClass::Event => crate::constants::ranking::DECAY_EVENT,
            TemporalClass::State => crate::constants::ranking::DECAY_STATE,
            TemporalClass::Rule => crate::constants::ranking::DECAY_RULE,
            TemporalClass::Preference => crate::constants::ranking::DECAY_PREFERENCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_and_state_are_never_deleted() {
        assert!(ItemKind::Decision.is_never_deleted());
        assert!(ItemKind::State.is_never_deleted());
        assert!(!ItemKind::Runbook.is_never_deleted());
    }

    #[test]
    fn conflict_canonical_order_is_stable_regardless_of_input_order() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c1 = ModelConflict::canonical(
            a,
            b,
            ConflictType::Contradiction,
            "t".into(),
            "p".into(),
            0,
        );
        let c2 = ModelConflict::canonical(
            b,
            a,
            ConflictType::Contradiction,
            "t".into(),
            "p".into(),
            0,
        );
        assert_eq!(c1.item_a, c2.item_a);
        assert_eq!(c1.item_b, c2.item_b);
    }

    #[test]
    fn temporal_classification_prefers_tags_over_kind_for_rule() {
        let class = TemporalClass::classify(ItemKind::Fact, &["policy".to_string()]);
        assert_eq!(class, TemporalClass::Rule);
    }

    #[test]
    fn guardrail_expiry_is_respected() {
        let mut g = Guardrail {
            id: Uuid::nil(),
            tenant: "t".into(),
            project: "p".into(),
            rule_type: GuardrailRuleType::Warn,
            pattern_signature: "sig".into(),
            description: "d".into(),
            suppress_ids: vec![],
            active: true,
            created_at: 0,
            expires_at: Some(100),
        };
        assert!(g.is_live(50));
        assert!(!g.is_live(150));
        g.expires_at = None;
        assert!(g.is_live(9_999_999));
    }
}
