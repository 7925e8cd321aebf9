use provreg_common::{CanonicalRecord, CommonError, FilterSpec, PageRequest};
use serde::{Deserialize, Serialize};

use crate::config::QueryConfig;
use crate::features::shared::pagination::{Paginated, PaginationParams};
use crate::store::{RecordFilter, RecordStore, StoreError};

/// `GET /providers` parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListProvidersQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    /// Case-insensitive substring of the display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

pub type ListProvidersResponse = Paginated<CanonicalRecord>;

#[derive(Debug, thiserror::Error)]
pub enum ListProvidersError {
    #[error("Invalid page request: {0}")]
    InvalidPageRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CommonError> for ListProvidersError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::InvalidPageRequest(message) => Self::InvalidPageRequest(message),
            other => Self::InvalidPageRequest(other.to_string()),
        }
    }
}

impl ListProvidersQuery {
    pub fn filter(&self) -> FilterSpec {
        FilterSpec::from_parts(
            self.region.as_deref(),
            self.specialty.as_deref(),
            self.search.as_deref(),
        )
    }

    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.limit, self.offset)
    }
}

/// Return one window of the records matching `filter`, with the total count.
///
/// `total` and `data` come from the same snapshot. An offset at or past the
/// end yields an empty page with the real total.
#[tracing::instrument(skip(store))]
pub async fn query_page<S>(
    store: &S,
    limits: &QueryConfig,
    filter: &FilterSpec,
    page: PageRequest,
) -> Result<ListProvidersResponse, ListProvidersError>
where
    S: RecordStore + ?Sized,
{
    let page = page.clamped(limits.max_limit)?;
    let compiled = RecordFilter::compile(filter);

    let (total, data) = store.count_and_page(&compiled, page.limit, page.offset).await?;

    Ok(Paginated::new(data, total, page))
}

pub async fn handle<S>(
    store: &S,
    limits: &QueryConfig,
    query: ListProvidersQuery,
) -> Result<ListProvidersResponse, ListProvidersError>
where
    S: RecordStore + ?Sized,
{
    let page = query.pagination().to_page_request(limits.default_limit);
    query_page(store, limits, &query.filter(), page).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewRecord};

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let records: Vec<NewRecord> = (0..7)
            .map(|i| NewRecord {
                natural_key: format!("{:010}", 1_000_000_000 + i),
                display_name: format!("Provider {}", i),
                phone: None,
                specialty_code: None,
                region_code: Some(if i % 2 == 0 { "TX" } else { "CA" }.to_string()),
            })
            .collect();
        store.insert_batch(&records).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_default_limit_applies() {
        let store = seeded().await;
        let limits = QueryConfig {
            default_limit: 3,
            max_limit: 10,
        };
        let response = handle(&store, &limits, ListProvidersQuery::default())
            .await
            .unwrap();
        assert_eq!(response.total, 7);
        assert_eq!(response.limit, 3);
        assert_eq!(response.data.len(), 3);
    }

    #[tokio::test]
    async fn test_limit_is_clamped_to_max() {
        let store = seeded().await;
        let limits = QueryConfig {
            default_limit: 3,
            max_limit: 5,
        };
        let response = query_page(&store, &limits, &FilterSpec::new(), PageRequest::new(100, 0))
            .await
            .unwrap();
        assert_eq!(response.limit, 5);
        assert_eq!(response.data.len(), 5);
    }

    #[tokio::test]
    async fn test_negative_offset_is_rejected() {
        let store = seeded().await;
        let err = query_page(
            &store,
            &QueryConfig::default(),
            &FilterSpec::new(),
            PageRequest::new(10, -1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ListProvidersError::InvalidPageRequest(_)));
    }

    #[tokio::test]
    async fn test_region_filter_from_query() {
        let store = seeded().await;
        let query = ListProvidersQuery {
            region: Some("tx".to_string()),
            ..ListProvidersQuery::default()
        };
        let response = handle(&store, &QueryConfig::default(), query).await.unwrap();
        assert_eq!(response.total, 4);
        assert!(response
            .data
            .iter()
            .all(|r| r.region_code.as_deref() == Some("TX")));
    }
}
