//! Provider queries and export
//!
//! Read-only views over the record store: filtered pages with a total count,
//! a streaming CSV export of every match, and lookup by NPI.

pub mod encoding;
pub mod queries;
pub mod routes;

use std::sync::Arc;

use crate::config::QueryConfig;
use crate::store::RecordStore;

pub use queries::{
    ExportCursor, ExportError, ExportProvidersQuery, GetProviderError, GetProviderQuery,
    ListProvidersError, ListProvidersQuery, ListProvidersResponse,
};
pub use routes::providers_routes;

/// State for provider routes
#[derive(Clone)]
pub struct ProvidersState {
    pub store: Arc<dyn RecordStore>,
    pub limits: QueryConfig,
}
