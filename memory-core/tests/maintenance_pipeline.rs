//! Integration coverage for `memory_maintain`'s mutating actions against a
//! real temp-file-backed embedded store: link cleanup after a hard delete,
//! auto-guardrail creation once an item hits `max_error_count`, and the
//! cross-kind overlap linker.

use memory_core::store::MemoryStore;
use memory_core::types::ItemKind;
use memory_core::upsert::ProposedItem;
use memory_core::{types::Source, StoreConfig};

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
async fn clean_links_drops_edges_whose_endpoint_was_forgotten() {
    let (store, _dir) = open_test_store().await;
    let episode = store
        .upsert(vec![item(
            ItemKind::Episode,
            "p",
            "Deploy attempt",
            "Command: cargo build\n## OUTCOME\nsucceeded",
        )])
        .await
        .unwrap()
        .results[0]
        .id;
    store
        .upsert(vec![item(
            ItemKind::Runbook,
            "p",
            "Deploy runbook",
            "Command: cargo build\nStep 1: build",
        )])
        .await
        .unwrap();

    store.forget(episode, "no longer needed").await.unwrap();

    let report = store.maintain("p", &["clean_links".to_string()], false).await.unwrap();
    assert!(report.links_cleaned > 0, "forgetting an endpoint should leave a dangling edge to clean up");
}

#[tokio::test]
async fn dry_run_reports_counts_without_mutating() {
    let (store, _dir) = open_test_store().await;
    let episode = store
        .upsert(vec![item(
            ItemKind::Episode,
            "p",
            "Deploy attempt",
            "Command: cargo build\n## OUTCOME\nsucceeded",
        )])
        .await
        .unwrap()
        .results[0]
        .id;
    store
        .upsert(vec![item(
            ItemKind::Runbook,
            "p",
            "Deploy runbook",
            "Command: cargo build\nStep 1: build",
        )])
        .await
        .unwrap();
    store.forget(episode, "no longer needed").await.unwrap();

    let dry = store.maintain("p", &["clean_links".to_string()], true).await.unwrap();
    assert!(dry.links_cleaned > 0);

    let still_dangling = store.maintain("p", &["clean_links".to_string()], true).await.unwrap();
    assert_eq!(still_dangling.links_cleaned, dry.links_cleaned, "dry_run must not have deleted anything the first time");
}

#[tokio::test]
async fn auto_guardrails_covers_items_that_hit_max_error_count_before_quarantining() {
    // Raise the quarantine threshold above max_error_count so the item is
    // still `active` (and thus visible to auto_guardrails) once its error
    // count reaches the default max_error_count.
    let dir = tempfile::tempdir().unwrap();
    let mut config = StoreConfig::default();
    config.database.embedded_path = dir.path().join("test.db").to_str().unwrap().to_string();
    config.policy.quarantine_on_wrong_threshold = 10;
    config.policy.delete_on_wrong_threshold = 10;
    let store = MemoryStore::open(config, "test-tenant").await.unwrap();

    let id = store
        .upsert(vec![item(ItemKind::Fact, "p", "Dubious advice", "run with elevated privileges")])
        .await
        .unwrap()
        .results[0]
        .id;

    for _ in 0..5 {
        store
            .feedback(id, memory_core::governance::FeedbackLabel::Wrong)
            .await
            .unwrap();
    }
    assert_eq!(store.get(id).await.unwrap().status, memory_core::ItemStatus::Active);

    let report = store.maintain("p", &["auto_guardrails".to_string()], false).await.unwrap();
    assert!(report.guardrails_created >= 1);

    let snapshot = store.governance_snapshot(Some("p")).await.unwrap();
    assert!(snapshot.guardrails_active >= 1);
}

#[tokio::test]
async fn cross_type_overlap_links_items_of_differing_kind_with_similar_titles() {
    let (store, _dir) = open_test_store().await;
    store
        .upsert(vec![item(ItemKind::Fact, "p", "Postgres connection pool limits", "max_connections matters")])
        .await
        .unwrap();
    store
        .upsert(vec![item(
            ItemKind::Runbook,
            "p",
            "Postgres connection pool limits",
            "Command: psql\nStep 1: check max_connections",
        )])
        .await
        .unwrap();

    let report = store.maintain("p", &["cross_type_overlap".to_string()], false).await.unwrap();
    assert!(report.cross_type_links >= 1);
}

#[tokio::test]
async fn actions_run_in_fixed_order_regardless_of_request_order() {
    let (store, _dir) = open_test_store().await;
    store
        .upsert(vec![item(ItemKind::Fact, "p", "Anything", "anything at all")])
        .await
        .unwrap();

    let report = store
        .maintain("p", &["rebuild_fts".to_string(), "dedup".to_string(), "conflict".to_string()], false)
        .await
        .unwrap();
    assert_eq!(report.actions_run, vec!["dedup", "conflict", "rebuild_fts"]);
}
