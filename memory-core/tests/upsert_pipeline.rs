//! Integration coverage of the four-gate upsert pipeline against a real
//! temp-file-backed embedded store: idempotency, exact-title, fuzzy-title,
//! and insert transitions, plus the usefulness-score preservation rule on
//! the fuzzy gate.

use memory_core::store::MemoryStore;
use memory_core::types::{ItemKind, Source};
use memory_core::upsert::{ProposedItem, UpsertAction};
use memory_core::StoreConfig;

async fn open_test_store() -> (MemoryStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig::default();
    config.database.embedded_path = dir.path().join("test.db").to_str().unwrap().to_string();
    let store = MemoryStore::open(config, "test-tenant").await.unwrap();
    (store, dir)
}

fn fact(project: &str, title: &str, content: &str) -> ProposedItem {
    ProposedItem {
        kind: ItemKind::Fact,
        project: project.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        tags: vec![],
        verified: false,
        confidence: 0.5,
        provenance: serde_json::json!({}),
        success: None,
        source: Source::Agent,
    }
}

#[tokio::test]
async fn first_write_of_a_title_inserts() {
    let (store, _dir) = open_test_store().await;
    let report = store
        .upsert(vec![fact("p", "Use cargo nextest", "cargo nextest run is faster in CI")])
        .await
        .unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].action, UpsertAction::Created);
}

#[tokio::test]
async fn resubmitting_identical_content_is_idempotent() {
    let (store, _dir) = open_test_store().await;
    let item = fact("p", "Use cargo nextest", "cargo nextest run is faster in CI");
    let first = store.upsert(vec![item.clone()]).await.unwrap();
    let first_id = first.results[0].id;

    let mut resubmitted = item;
    resubmitted.title = "Use cargo-nextest".to_string();
    let second = store.upsert(vec![resubmitted]).await.unwrap();

    assert_eq!(second.results[0].id, first_id);
    assert_eq!(second.results[0].action, UpsertAction::Updated);

    let stored = store.get(first_id).await.unwrap();
    assert_eq!(stored.title, "Use cargo-nextest");
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn idempotency_gate_never_touches_usefulness_score() {
    let (store, _dir) = open_test_store().await;
    let first = store
        .upsert(vec![fact("p", "Use cargo nextest", "cargo nextest run is faster in CI")])
        .await
        .unwrap();
    let id = first.results[0].id;
    let before = store.get(id).await.unwrap().usefulness_score;

    // feedback bumps usefulness_score away from the base value, then an
    // identical-content resubmit must leave it exactly where feedback put it.
    store
        .feedback(id, memory_core::governance::FeedbackLabel::Useful)
        .await
        .unwrap();
    let after_feedback = store.get(id).await.unwrap().usefulness_score;
    assert!(after_feedback != before);

    store
        .upsert(vec![fact("p", "Use cargo nextest", "cargo nextest run is faster in CI")])
        .await
        .unwrap();
    let after_resubmit = store.get(id).await.unwrap().usefulness_score;
    assert!((after_resubmit - after_feedback).abs() < 1e-6);
}

#[tokio::test]
async fn same_title_different_content_replaces_content() {
    let (store, _dir) = open_test_store().await;
    let first = store
        .upsert(vec![fact("p", "Deploy runbook notes", "use blue-green")])
        .await
        .unwrap();
    let id = first.results[0].id;

    let second = store
        .upsert(vec![fact("p", "Deploy runbook notes", "use canary")])
        .await
        .unwrap();
    assert_eq!(second.results[0].id, id);
    assert_eq!(second.results[0].action, UpsertAction::ContentUpdated);

    let stored = store.get(id).await.unwrap();
    assert_eq!(stored.content, "use canary");
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn fuzzy_title_match_preserves_the_greater_usefulness_score() {
    let (store, _dir) = open_test_store().await;
    let first = store
        .upsert(vec![fact(
            "p",
            "Postgres connection pool tuning",
            "set max_connections to 200",
        )])
        .await
        .unwrap();
    let id = first.results[0].id;

    // Push usefulness_score above the base-for-kind value feedback wouldn't reach.
    for _ in 0..5 {
        store
            .feedback(id, memory_core::governance::FeedbackLabel::Useful)
            .await
            .unwrap();
    }
    let boosted = store.get(id).await.unwrap().usefulness_score;

    // Close title overlap, different content — lands on the fuzzy gate.
    let fuzzy = store
        .upsert(vec![fact(
            "p",
            "Postgres connection pool tuning guide",
            "set max_connections to 400 and statement_timeout",
        )])
        .await
        .unwrap();
    assert_eq!(fuzzy.results[0].id, id);
    assert_eq!(fuzzy.results[0].action, UpsertAction::FuzzyUpdated);

    let merged = store.get(id).await.unwrap();
    assert!(
        merged.usefulness_score >= boosted,
        "fuzzy merge must never regress an already-useful item's score: {} < {}",
        merged.usefulness_score,
        boosted
    );
    assert_eq!(merged.title, "Postgres connection pool tuning guide");
    assert_eq!(merged.content, "set max_connections to 400 and statement_timeout");
}

#[tokio::test]
async fn distinct_titles_with_no_overlap_insert_separately() {
    let (store, _dir) = open_test_store().await;
    store.upsert(vec![fact("p", "Use cargo nextest", "a")]).await.unwrap();
    let second = store
        .upsert(vec![fact("p", "Rotate TLS certificates", "b")])
        .await
        .unwrap();
    assert_eq!(second.results[0].action, UpsertAction::Created);
}

#[tokio::test]
async fn runbook_without_format_markers_is_rejected() {
    let (store, _dir) = open_test_store().await;
    let item = ProposedItem {
        kind: ItemKind::Runbook,
        project: "p".to_string(),
        title: "Restart service".to_string(),
        content: "just restart it".to_string(),
        tags: vec![],
        verified: false,
        confidence: 0.5,
        provenance: serde_json::json!({}),
        success: None,
        source: Source::Agent,
    };
    let err = store.upsert(vec![item]).await.unwrap_err();
    assert!(err.to_string().contains("format validation failed"));
}
