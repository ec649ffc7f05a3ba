//! Governance: the lifecycle state machine, feedback handling, pruning,
//! conflict detection, and the loop-breaker/guardrail subsystem.

pub mod conflict;
pub mod feedback;
pub mod guardrails;
pub mod lifecycle;
pub mod prune;

pub use feedback::{apply_feedback, FeedbackEffect, FeedbackLabel};
pub use guardrails::{check_loop_breaker, create_guardrail, get_suppressed_ids, record_mistake};
pub use lifecycle::{PolicyDecision, PolicyThresholds};
pub use prune::run_prune;
