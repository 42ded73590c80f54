//! Product retrieval against a SQLite catalog.

use shopassist_catalog::{PriceRange, SearchRequest, SearchType};
use shopassist_core::ProductStatus;
use shopassist_integration_tests::{product, sqlite_storage, tagged, Harness, STORE};

fn request(query: &str, search_type: SearchType) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        search_type,
        max_results: None,
        store_id: STORE.to_string(),
    }
}

fn ids(outcome: &shopassist_catalog::SearchOutcome) -> Vec<&str> {
    outcome.products.iter().map(|p| p.id.as_str()).collect()
}

#[tokio::test]
async fn test_headphones_under_50_returns_only_cheaper_product() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(storage, Vec::new()).await;
    harness
        .seed(vec![
            tagged(product("h40", "Studio Headphones", 40.0), &["headphones"]),
            tagged(product("h80", "Pro Headphones", 80.0), &["headphones"]),
        ])
        .await;

    let outcome = harness
        .engine
        .search(&request("headphones under $50", SearchType::Keyword))
        .await;

    assert!(outcome.success);
    assert_eq!(ids(&outcome), vec!["h40"]);
    assert_eq!(
        outcome.search_metadata.unwrap().price_constraints,
        PriceRange {
            min: None,
            max: Some(50)
        }
    );
}

#[tokio::test]
async fn test_keyword_search_skips_unavailable_products() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(storage, Vec::new()).await;

    let mut sold_out = product("sold-out", "Linen Shirt Sold Out", 30.0);
    sold_out.total_inventory = 0;
    let mut unlisted = product("unlisted", "Linen Shirt Unlisted", 30.0);
    unlisted.available_for_sale = false;
    let mut draft = product("draft", "Linen Shirt Draft", 30.0);
    draft.status = ProductStatus::Draft;

    harness
        .seed(vec![
            product("ok", "Linen Shirt", 30.0),
            sold_out,
            unlisted,
            draft,
        ])
        .await;

    let outcome = harness
        .engine
        .search(&request("linen shirt", SearchType::Keyword))
        .await;
    assert_eq!(ids(&outcome), vec!["ok"]);
}

#[tokio::test]
async fn test_price_range_and_result_cap() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(storage, Vec::new()).await;
    harness
        .seed(
            [10.0, 25.0, 45.0, 60.0, 95.0]
                .iter()
                .enumerate()
                .map(|(i, price)| tagged(product(&format!("m{i}"), "Mug", *price), &["mug"]))
                .collect(),
        )
        .await;

    let outcome = harness
        .engine
        .search(&request("mug $20 to $60", SearchType::Keyword))
        .await;
    let mut found = ids(&outcome);
    found.sort();
    assert_eq!(found, vec!["m1", "m2", "m3"]);

    let mut capped = request("mug", SearchType::Keyword);
    capped.max_results = Some(2);
    assert_eq!(harness.engine.search(&capped).await.products_found, 2);

    // Written high-to-low, the range constrains nothing.
    let outcome = harness
        .engine
        .search(&request("mug $80 to $50", SearchType::Keyword))
        .await;
    assert_eq!(outcome.products_found, 5);
}

#[tokio::test]
async fn test_exact_names_include_out_of_stock_items() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(storage, Vec::new()).await;

    let mut lamp = product("lamp", "Aurora Desk Lamp", 70.0);
    lamp.total_inventory = 0;
    harness
        .seed(vec![lamp, product("mug", "Ceramic Mug", 12.0)])
        .await;

    let outcome = harness
        .engine
        .search(&request("Do you have the Aurora Desk Lamp?", SearchType::ExactNames))
        .await;
    assert_eq!(ids(&outcome), vec!["lamp"]);
    assert!(!outcome.products[0].in_stock);

    let keyword = harness
        .engine
        .search(&request("aurora desk lamp", SearchType::Keyword))
        .await;
    assert!(keyword.products.is_empty());
}

#[tokio::test]
async fn test_semantic_search_ranks_nearest_first() {
    let (storage, _dir) = sqlite_storage().await;
    let harness = Harness::new(storage, Vec::new()).await;
    harness
        .seed(vec![
            product("phones", "Wireless Noise Cancelling Headphones", 120.0),
            product("mug", "Ceramic Coffee Mug", 12.0),
            product("lamp", "Brass Desk Lamp", 70.0),
        ])
        .await;
    harness.indexer.generate(STORE).await.unwrap();

    let outcome = harness
        .engine
        .search(&request("wireless headphones", SearchType::Semantic))
        .await;
    assert!(outcome.success);
    assert_eq!(outcome.products.first().map(|p| p.id.as_str()), Some("phones"));
}

#[tokio::test]
async fn test_failures_are_absorbed_into_the_outcome() {
    let harness = Harness::in_memory(Vec::new()).await;
    let outcome = harness
        .engine
        .search(&request("   ", SearchType::Keyword))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.products_found, 0);
    assert!(outcome.error.is_some());
}
