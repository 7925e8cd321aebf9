//! Provider API routes
//!
//! # Route Structure
//!
//! - `GET /api/v1/providers` - Filtered, paginated listing
//! - `GET /api/v1/providers/export` - Streaming CSV of every match
//! - `GET /api/v1/providers/by-npi/:npi` - Single provider by registry number

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use super::queries::{
    self, csv_chunks, ExportCursor, ExportProvidersQuery, GetProviderQuery, ListProvidersQuery,
};
use super::ProvidersState;
use crate::error::AppError;

pub fn providers_routes() -> Router<ProvidersState> {
    Router::new()
        .route("/", get(list_providers))
        .route("/export", get(export_providers))
        .route("/by-npi/:npi", get(get_provider))
}

/// List providers with filters and an offset window
///
/// # Endpoint
///
/// `GET /api/v1/providers?region=TX&specialty=207Q00000X&search=smith&limit=50&offset=0`
///
/// # Response
///
/// - `200 OK` - `{ total, limit, offset, data }`
/// - `400 Bad Request` - Non-positive limit or negative offset
/// - `503 Service Unavailable` - Store unreachable
#[tracing::instrument(
    skip(state, query),
    fields(limit = ?query.limit, offset = ?query.offset, region = ?query.region)
)]
async fn list_providers(
    State(state): State<ProvidersState>,
    Query(query): Query<ListProvidersQuery>,
) -> Result<Response, AppError> {
    let response = queries::list::handle(state.store.as_ref(), &state.limits, query).await?;

    tracing::debug!(
        count = response.data.len(),
        total = response.total,
        "Providers listed via API"
    );

    Ok(Json(response).into_response())
}

/// Stream every matching provider as CSV
///
/// # Endpoint
///
/// `GET /api/v1/providers/export?region=TX`
///
/// The body is written as records arrive from the store. A store failure after
/// the headers are sent aborts the body, so clients see a truncated transfer
/// rather than a short but well-formed file.
#[tracing::instrument(skip(state))]
async fn export_providers(
    State(state): State<ProvidersState>,
    Query(query): Query<ExportProvidersQuery>,
) -> Response {
    let cursor = ExportCursor::open(state.store.as_ref(), &query.filter());

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"providers.csv\""),
        ],
        Body::from_stream(csv_chunks(cursor)),
    )
        .into_response()
}

/// Get a single provider by NPI
///
/// # Response
///
/// - `200 OK` - Provider found
/// - `404 Not Found` - No provider with that NPI
#[tracing::instrument(skip(state))]
async fn get_provider(
    State(state): State<ProvidersState>,
    Path(npi): Path<String>,
) -> Result<Response, AppError> {
    let record =
        queries::get_by_npi::handle(state.store.as_ref(), GetProviderQuery { npi }).await?;
    Ok(Json(record).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::store::{MemoryStore, NewRecord, RecordStore};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        let store = MemoryStore::new();
        store
            .insert_batch(&[
                NewRecord {
                    natural_key: "1000000001".to_string(),
                    display_name: "Jane Smith".to_string(),
                    phone: Some("512-555-0100".to_string()),
                    specialty_code: Some("207Q00000X".to_string()),
                    region_code: Some("TX".to_string()),
                },
                NewRecord {
                    natural_key: "1000000002".to_string(),
                    display_name: "Ravi Patel".to_string(),
                    phone: None,
                    specialty_code: None,
                    region_code: Some("CA".to_string()),
                },
            ])
            .await
            .unwrap();

        providers_routes().with_state(ProvidersState {
            store: Arc::new(store),
            limits: QueryConfig::default(),
        })
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_list_endpoint() {
        let response = app()
            .await
            .oneshot(Request::builder().uri("/?region=tx").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["limit"], 50);
        assert_eq!(json["offset"], 0);
        assert_eq!(json["data"][0]["natural_key"], "1000000001");
    }

    #[tokio::test]
    async fn test_list_rejects_negative_offset() {
        let response = app()
            .await
            .oneshot(Request::builder().uri("/?offset=-1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_export_endpoint() {
        let response = app()
            .await
            .oneshot(Request::builder().uri("/export").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let body = body_string(response).await;
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "id,natural_key,name,phone,specialty,region,created_at");
        assert!(body.contains(",1000000002,Ravi Patel,,,CA,"));
    }

    #[tokio::test]
    async fn test_get_by_npi_not_found() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/by-npi/9999999999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
