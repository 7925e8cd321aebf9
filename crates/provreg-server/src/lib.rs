//! Provreg Server Library
//!
//! Provider registry: loads registry extracts into a deduplicated store of
//! canonical records and serves filtered, paginated views and CSV exports.
//!
//! # Overview
//!
//! - **Ingestion** ([`ingest`]): streaming CSV reader, normalization, in-run and
//!   store-level deduplication, batched transactional loads
//! - **Store** ([`store`]): the [`RecordStore`](store::RecordStore) trait with
//!   PostgreSQL and in-memory implementations
//! - **Queries** ([`features`]): filtered pages with a snapshot-consistent total,
//!   streaming CSV export, lookup by NPI
//! - **HTTP** ([`api`]): thin axum adapter over the query handlers
//! - **Configuration** ([`config`]): environment-based settings
//!
//! # Example
//!
//! ```no_run
//! use provreg_server::{api, config::Config, db, store::PgRecordStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!     db::run_migrations(&pool).await?;
//!     api::serve(config, Arc::new(PgRecordStore::new(pool))).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod store;

// Re-export commonly used types
pub use error::AppError;
