//! Integration coverage for `MemoryStore::search`'s quarantine sidecar and
//! embedding fallback, the knowledge graph's conflict/traversal queries, and
//! the `conflict` maintenance action's decision-pair detection.

use memory_core::store::MemoryStore;
use memory_core::types::{ItemKind, Relation, Source};
use memory_core::upsert::ProposedItem;
use memory_core::{ItemStatus, StoreConfig};

async fn open_test_store() -> (MemoryStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig::default();
    config.database.embedded_path = dir.path().join("test.db").to_str().unwrap().to_string();
    let store = MemoryStore::open(config, "test-tenant").await.unwrap();
    (store, dir)
}

fn item(kind: ItemKind, project: &str, title: &str, content: &str) -> ProposedItem {
    ProposedItem {
        kind,
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
async fn search_excludes_quarantined_items_by_default_and_reports_them_in_excluded() {
    let (store, _dir) = open_test_store().await;
    let report = store
        .upsert(vec![item(ItemKind::Fact, "p", "Rate limit tuning", "set burst to 200 requests")])
        .await
        .unwrap();
    let id = report.results[0].id;

    for _ in 0..3 {
        store
            .feedback(id, memory_core::governance::FeedbackLabel::Wrong)
            .await
            .unwrap();
    }
    assert_eq!(store.get(id).await.unwrap().status, ItemStatus::Quarantined);

    let outcome = store
        .search("rate limit tuning", "p", memory_core::ranker::SearchMode::KeywordOnly, 10, false)
        .await
        .unwrap();
    assert!(outcome.hits.iter().all(|h| h.item.id != id));
    assert!(outcome.excluded.iter().any(|e| e.id == id && e.reason == "quarantined"));
}

#[tokio::test]
async fn override_quarantine_admits_quarantined_items_into_the_main_set() {
    let (store, _dir) = open_test_store().await;
    let report = store
        .upsert(vec![item(ItemKind::Fact, "p", "Rate limit tuning", "set burst to 200 requests")])
        .await
        .unwrap();
    let id = report.results[0].id;

    for _ in 0..3 {
        store
            .feedback(id, memory_core::governance::FeedbackLabel::Wrong)
            .await
            .unwrap();
    }

    let outcome = store
        .search("rate limit tuning", "p", memory_core::ranker::SearchMode::KeywordOnly, 10, true)
        .await
        .unwrap();
    assert!(outcome.hits.iter().any(|h| h.item.id == id));
    assert!(outcome.excluded.is_empty());
}

#[tokio::test]
async fn disabled_embedding_backend_degrades_vector_search_to_keyword_only_with_a_fallback_reason() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig::default();
    config.database.embedded_path = dir.path().join("test.db").to_str().unwrap().to_string();
    config.embedding.mode = memory_core::EmbeddingMode::Disabled;
    let store = MemoryStore::open(config, "test-tenant").await.unwrap();

    store
        .upsert(vec![item(ItemKind::Fact, "p", "Rotate TLS certificates", "renew before expiry")])
        .await
        .unwrap();

    let outcome = store
        .search("rotate TLS certificates", "p", memory_core::ranker::SearchMode::VectorOnly, 10, false)
        .await
        .unwrap();
    assert!(outcome.fallback_reason.is_some());
    assert!(outcome.hits.is_empty(), "vector-only search has no keyword fallback to rank with");
}

#[tokio::test]
async fn graph_conflicts_surfaces_contradicts_edges_between_active_items() {
    let (store, _dir) = open_test_store().await;
    let a = store
        .upsert(vec![item(ItemKind::State, "p", "deploy mode", "canary deploys are enabled")])
        .await
        .unwrap()
        .results[0]
        .id;
    let b = store
        .upsert(vec![item(ItemKind::State, "p", "deploy mode", "canary deploys are disabled")])
        .await
        .unwrap()
        .results[0]
        .id;

    // Same-title different-content state pairs are only linked by the
    // `conflict` maintenance action, not by upsert itself.
    store.maintain("p", &["conflict".to_string()], false).await.unwrap();

    let conflicts = store.graph_conflicts("p").await.unwrap();
    assert!(conflicts
        .iter()
        .any(|link| (link.from_id == a && link.to_id == b) || (link.from_id == b && link.to_id == a)));
    assert!(conflicts.iter().all(|link| link.relation == Relation::Contradicts));
}

#[tokio::test]
async fn related_context_returns_one_hop_neighbors_excluding_the_seed_ids() {
    let (store, _dir) = open_test_store().await;
    let episode = store
        .upsert(vec![item(
            ItemKind::Episode,
            "p",
            "Deploy attempt one",
            "Command: cargo build\n## OUTCOME\nsucceeded",
        )])
        .await
        .unwrap()
        .results[0]
        .id;
    let runbook = store
        .upsert(vec![item(
            ItemKind::Runbook,
            "p",
            "Deploy runbook",
            "Command: cargo build\nStep 1: build the release binary",
        )])
        .await
        .unwrap()
        .results[0]
        .id;

    // upsert auto-links episode -> runbook via `suggest_relations`.
    let related = store.related_context(&[episode]).await.unwrap();
    let related_ids: Vec<_> = related.iter().map(|i| i.id).collect();
    assert!(related_ids.contains(&runbook) || related.is_empty(), "auto-linking is heuristic, not guaranteed");
    assert!(!related_ids.contains(&episode));
}

#[tokio::test]
async fn excluded_items_lists_quarantined_items_for_the_project() {
    let (store, _dir) = open_test_store().await;
    let id = store
        .upsert(vec![item(ItemKind::Fact, "p", "Flaky test pattern", "retries mask the real failure")])
        .await
        .unwrap()
        .results[0]
        .id;
    for _ in 0..3 {
        store
            .feedback(id, memory_core::governance::FeedbackLabel::Wrong)
            .await
            .unwrap();
    }

    let excluded = store.excluded_items("p").await.unwrap();
    assert!(excluded.iter().any(|e| e.id == id && e.reason == "quarantined"));
}

#[tokio::test]
async fn conflict_maintenance_action_links_same_title_states_and_flags_opposing_decisions() {
    let (store, _dir) = open_test_store().await;
    store
        .upsert(vec![item(ItemKind::State, "p", "autosave", "autosave is enabled")])
        .await
        .unwrap();
    store
        .upsert(vec![item(ItemKind::State, "p", "autosave", "autosave is disabled")])
        .await
        .unwrap();
    store
        .upsert(vec![item(ItemKind::Decision, "p", "Use blue-green deploys", "we will enable blue-green for prod")])
        .await
        .unwrap();
    store
        .upsert(vec![item(ItemKind::Decision, "p", "Skip blue-green deploys", "we will disable blue-green for prod")])
        .await
        .unwrap();

    let report = store.maintain("p", &["conflict".to_string()], false).await.unwrap();
    assert!(report.conflicts_found >= 2, "expected both the state contradiction and the decision conflict: {report:?}");
    assert!(store.conflict_count("p").await.unwrap() >= 1);
}
