//! Embedding maintenance job against a SQLite catalog.

use shopassist_catalog::{CatalogError, EmbeddingIndexer, IndexerConfig, OpenAIEmbeddings};
use shopassist_core::CatalogRepository;
use shopassist_integration_tests::{product, sqlite_storage, Harness, STORE};

#[tokio::test]
async fn test_rerunning_on_embedded_store_is_a_no_op() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(storage, Vec::new()).await;
    harness
        .seed(vec![
            product("p1", "Trail Runner", 90.0),
            product("p2", "Rain Jacket", 120.0),
            product("p3", "Wool Socks", 15.0),
        ])
        .await;

    let first = harness.indexer.generate(STORE).await.unwrap();
    assert_eq!(first.embedded, 3);
    let calls = harness.embedder.calls();

    let second = harness.indexer.generate(STORE).await.unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.embedded, 0);
    assert_eq!(harness.embedder.calls(), calls);

    let status = harness.indexer.status(STORE).await.unwrap();
    assert_eq!(status.embedded, 3);
    assert_eq!(status.pending, 0);
}

#[tokio::test]
async fn test_unsaleable_products_are_not_embedded() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(storage, Vec::new()).await;

    let mut hidden = product("hidden", "Hidden Item", 5.0);
    hidden.available_for_sale = false;
    harness
        .seed(vec![product("shown", "Shown Item", 5.0), hidden])
        .await;

    let report = harness.indexer.generate(STORE).await.unwrap();
    assert_eq!(report.embedded, 1);

    let hidden = harness
        .storage
        .catalog
        .get_product(STORE, "hidden")
        .await
        .unwrap()
        .unwrap();
    assert!(!hidden.has_embedding());
}

#[tokio::test]
async fn test_regenerate_rebuilds_every_embedding() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(storage, Vec::new()).await;
    harness
        .seed(
            (0..5)
                .map(|i| product(&format!("p{i}"), &format!("Item {i}"), 10.0))
                .collect(),
        )
        .await;
    harness.indexer.generate(STORE).await.unwrap();

    let report = harness.indexer.regenerate_all(STORE).await.unwrap();
    assert_eq!(report.cleared, 5);
    assert_eq!(report.total_embedded, 5);
    // Batches of two: 2 + 2 + 1, then an empty pass.
    assert_eq!(report.passes, 4);
    assert_eq!(harness.indexer.status(STORE).await.unwrap().embedded, 5);
}

#[tokio::test]
async fn test_changed_product_text_is_picked_up_again() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(storage, Vec::new()).await;
    harness
        .seed(vec![product("p1", "Canvas Tote", 25.0)])
        .await;
    harness.indexer.generate(STORE).await.unwrap();

    let mut stored = harness
        .storage
        .catalog
        .get_product(STORE, "p1")
        .await
        .unwrap()
        .unwrap();
    stored.total_inventory = 40;
    harness.seed(vec![stored.clone()]).await;
    assert_eq!(harness.indexer.status(STORE).await.unwrap().pending, 0);

    stored.title = "Canvas Tote Bag".to_string();
    harness.seed(vec![stored]).await;
    assert_eq!(harness.indexer.status(STORE).await.unwrap().pending, 1);

    let report = harness.indexer.generate(STORE).await.unwrap();
    assert_eq!(report.embedded, 1);
}

#[tokio::test]
async fn test_missing_credential_fails_up_front() {
    let harness = Harness::in_memory(Vec::new()).await;
    harness
        .seed(vec![product("p1", "Canvas Tote", 25.0)])
        .await;

    let indexer = EmbeddingIndexer::new(
        harness.storage.catalog.clone(),
        std::sync::Arc::new(OpenAIEmbeddings::new(None)),
        IndexerConfig::default(),
    );
    let err = indexer.generate(STORE).await.unwrap_err();
    assert!(matches!(err, CatalogError::Configuration(_)));
    assert_eq!(harness.indexer.status(STORE).await.unwrap().pending, 1);
}
