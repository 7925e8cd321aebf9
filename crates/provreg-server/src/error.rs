//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::features::providers::{GetProviderError, ListProvidersError};
use crate::store::StoreError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ListProvidersError> for AppError {
    fn from(err: ListProvidersError) -> Self {
        match err {
            ListProvidersError::InvalidPageRequest(message) => AppError::Validation(message),
            ListProvidersError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<GetProviderError> for AppError {
    fn from(err: GetProviderError) -> Self {
        match err {
            GetProviderError::NpiRequired => AppError::Validation(err.to_string()),
            GetProviderError::NotFound(_) => AppError::NotFound(err.to_string()),
            GetProviderError::Store(e) => AppError::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Store(StoreError::Unavailable(ref message)) => {
                tracing::error!("Store unavailable: {}", message);
                (StatusCode::SERVICE_UNAVAILABLE, "The record store is unavailable".to_string())
            },
            AppError::Store(ref e) => {
                tracing::error!("Store error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "A database error occurred".to_string())
            },
            AppError::NotFound(ref message) => (StatusCode::NOT_FOUND, message.clone()),
            AppError::Validation(ref message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message.clone())
            },
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_page_maps_to_bad_request() {
        let err = AppError::from(ListProvidersError::InvalidPageRequest("offset".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unavailable_maps_to_503() {
        let err = AppError::from(StoreError::Unavailable("pool timed out".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_database_error_maps_to_500() {
        let err = AppError::from(StoreError::Database("syntax".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
