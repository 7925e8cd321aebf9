//! Filtered, paginated queries against the in-memory store

mod common;

use provreg_common::{FilterSpec, PageRequest};
use provreg_server::config::QueryConfig;
use provreg_server::features::providers::queries::{list, query_page};
use provreg_server::features::providers::{ListProvidersError, ListProvidersQuery};
use provreg_server::store::{MemoryStore, RecordStore};
use std::collections::HashSet;

use common::{record, seed_regions};

async fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    seed_regions(&store).await.unwrap();
    store
}

#[tokio::test]
async fn test_region_page_reports_full_total() {
    let store = seeded().await;
    let page = query_page(
        &store,
        &QueryConfig::default(),
        &FilterSpec::new().region("TX"),
        PageRequest::new(50, 100),
    )
    .await
    .unwrap();

    assert_eq!(page.total, 120);
    assert_eq!(page.data.len(), 20);
    assert_eq!(page.offset, 100);
    assert!(page.data.iter().all(|r| r.region_code.as_deref() == Some("TX")));
    assert_eq!(page.next_offset(), None);
}

#[tokio::test]
async fn test_pages_partition_the_result_set() {
    let store = seeded().await;
    let filter = FilterSpec::new().region("tx");
    let limits = QueryConfig::default();

    let mut seen = Vec::new();
    let mut offset = 0;
    loop {
        let page = query_page(&store, &limits, &filter, PageRequest::new(17, offset))
            .await
            .unwrap();
        assert_eq!(page.total, 120);
        seen.extend(page.data.iter().map(|r| r.id));
        match page.next_offset() {
            Some(next) => offset = next,
            None => break,
        }
    }

    let unique: HashSet<_> = seen.iter().collect();
    assert_eq!(seen.len(), 120);
    assert_eq!(unique.len(), 120);

    let mut sorted = seen.clone();
    sorted.sort();
    assert_eq!(seen, sorted);
}

#[tokio::test]
async fn test_offset_at_total_is_empty_not_error() {
    let store = seeded().await;
    let page = query_page(
        &store,
        &QueryConfig::default(),
        &FilterSpec::new().region("CA"),
        PageRequest::new(10, 80),
    )
    .await
    .unwrap();

    assert_eq!(page.total, 80);
    assert!(page.data.is_empty());
}

#[tokio::test]
async fn test_filters_combine_with_and() {
    let store = seeded().await;
    let page = query_page(
        &store,
        &QueryConfig::default(),
        &FilterSpec::new().region("CA").name_contains("SMITH"),
        PageRequest::new(100, 0),
    )
    .await
    .unwrap();

    // i in 120..200 with i % 3 == 0
    assert_eq!(page.total, 27);
    assert!(page
        .data
        .iter()
        .all(|r| r.display_name.starts_with("Jane Smith") && r.region_code.as_deref() == Some("CA")));
}

#[tokio::test]
async fn test_unknown_region_matches_nothing() {
    let store = seeded().await;
    let page = query_page(
        &store,
        &QueryConfig::default(),
        &FilterSpec::new().region("NY"),
        PageRequest::new(10, 0),
    )
    .await
    .unwrap();

    assert_eq!(page.total, 0);
    assert!(page.data.is_empty());
}

#[tokio::test]
async fn test_search_treats_wildcards_literally() {
    let store = MemoryStore::new();
    store
        .insert_batch(&[
            record("1000000001", "100% Care Clinic", Some("TX"), None),
            record("1000000002", "1000 Oaks Care", Some("TX"), None),
            record("1000000003", "Smith_Jones", Some("TX"), None),
            record("1000000004", "SmithXJones", Some("TX"), None),
        ])
        .await
        .unwrap();
    let limits = QueryConfig::default();

    let percent = query_page(
        &store,
        &limits,
        &FilterSpec::new().name_contains("100%"),
        PageRequest::new(10, 0),
    )
    .await
    .unwrap();
    assert_eq!(percent.total, 1);
    assert_eq!(percent.data[0].natural_key, "1000000001");

    let underscore = query_page(
        &store,
        &limits,
        &FilterSpec::new().name_contains("h_j"),
        PageRequest::new(10, 0),
    )
    .await
    .unwrap();
    assert_eq!(underscore.total, 1);
    assert_eq!(underscore.data[0].natural_key, "1000000003");
}

#[tokio::test]
async fn test_limit_is_clamped_to_max() {
    let store = seeded().await;
    let limits = QueryConfig {
        default_limit: 10,
        max_limit: 25,
    };
    let page = query_page(&store, &limits, &FilterSpec::new(), PageRequest::new(500, 0))
        .await
        .unwrap();

    assert_eq!(page.limit, 25);
    assert_eq!(page.data.len(), 25);
    assert_eq!(page.total, 200);
}

#[tokio::test]
async fn test_invalid_windows_are_rejected() {
    let store = seeded().await;
    let limits = QueryConfig::default();

    for page in [PageRequest::new(0, 0), PageRequest::new(-5, 0), PageRequest::new(10, -1)] {
        let err = query_page(&store, &limits, &FilterSpec::new(), page)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ListProvidersError::InvalidPageRequest(_)),
            "{:?} should be rejected",
            page
        );
    }
}

#[tokio::test]
async fn test_handle_applies_default_limit() {
    let store = seeded().await;
    let limits = QueryConfig {
        default_limit: 15,
        max_limit: 100,
    };
    let response = list::handle(
        &store,
        &limits,
        ListProvidersQuery {
            region: Some(" ca ".to_string()),
            specialty: Some("207Q00000X".to_string()),
            search: None,
            limit: None,
            offset: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(response.limit, 15);
    assert_eq!(response.offset, 0);
    assert_eq!(response.total, 80);
    assert_eq!(response.data.len(), 15);
}
