//! Feature modules implementing the provreg API
//!
//! Each feature is a vertical slice with its own queries and routes.
//!
//! # Features
//!
//! - **providers**: filtered listing, CSV export and NPI lookup
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `queries/` - Read operations, one file per query with its own error type
//! - `routes.rs` - HTTP route definitions
//!
//! Query handlers are plain async functions over a [`RecordStore`], so the
//! same code serves the HTTP routes, the CLI and the tests.
//!
//! [`RecordStore`]: crate::store::RecordStore

pub mod providers;
pub mod shared;

use axum::Router;
use std::sync::Arc;

use crate::config::QueryConfig;
use crate::store::RecordStore;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub store: Arc<dyn RecordStore>,
    pub limits: QueryConfig,
}

/// Creates the API router with all feature routes mounted
///
/// - `/providers` - Provider listing, export and lookup
pub fn router(state: FeatureState) -> Router<()> {
    let providers = providers::ProvidersState {
        store: state.store,
        limits: state.limits,
    };

    Router::new().nest("/providers", providers::providers_routes().with_state(providers))
}
