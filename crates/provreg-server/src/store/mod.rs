//! Record store
//!
//! The store is the only shared state in the system: one table of canonical
//! provider records keyed by a unique natural key. Ingestion writes to it through
//! [`RecordStore::insert_batch`] / [`RecordStore::insert_one`]; the query and
//! export features read from it.
//!
//! Two implementations exist:
//!
//! - [`PgRecordStore`]: PostgreSQL via `sqlx`, used by the binaries
//! - [`MemoryStore`]: in-process map, used by dry runs and tests
//!
//! Every method reports failures as [`StoreError`], which separates the cases the
//! callers treat differently: a natural-key conflict, a lost or exhausted
//! connection, and anything else the database rejected.

pub mod filter;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use futures::stream::BoxStream;
use provreg_common::CanonicalRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub use filter::RecordFilter;
pub use memory::{FaultPlan, MemoryStore};
pub use postgres::PgRecordStore;

/// A validated record that has not been stored yet.
///
/// The store assigns `id` and `created_at` on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub natural_key: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub specialty_code: Option<String>,
    pub region_code: Option<String>,
}

/// Result of a single-row insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The natural key already exists; nothing was written
    Conflict,
}

/// Store failures
#[derive(Error, Debug)]
pub enum StoreError {
    /// A natural-key uniqueness violation
    #[error("Natural key already exists: {0}")]
    Conflict(String),

    /// The store could not be reached or a connection was lost mid-operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Any other failure reported by the store
    #[error("Database query failed: {0}")]
    Database(String),
}

impl StoreError {
    /// Connectivity failures abort ingestion; everything else is handled per row.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// SQLSTATE classes and codes that mean the connection itself is gone.
///
/// `08` is the connection exception class; `57P0x` covers server shutdown and
/// `53300` is "too many connections". `57014` is a statement cancelled by the
/// session `statement_timeout`, which callers treat like an unreachable store.
const UNAVAILABLE_SQLSTATES: &[&str] = &["57014", "57P01", "57P02", "57P03", "53300"];

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    let constraint = db_err.constraint().unwrap_or("natural_key").to_string();
                    return StoreError::Conflict(constraint);
                }
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
                if code.starts_with("08") || UNAVAILABLE_SQLSTATES.contains(&code.as_str()) {
                    StoreError::Unavailable(err.to_string())
                } else {
                    StoreError::Database(err.to_string())
                }
            },
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Database(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence boundary shared by ingestion, query and export.
///
/// Implementations must keep `natural_key` unique under concurrent writers and
/// return records in ascending `id` order from both [`count_and_page`] and
/// [`stream`].
///
/// [`count_and_page`]: RecordStore::count_and_page
/// [`stream`]: RecordStore::stream
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Return the subset of `keys` that is already stored.
    async fn existing_keys(&self, keys: &[String]) -> StoreResult<HashSet<String>>;

    /// Insert all records in one atomic unit.
    ///
    /// Either every record is stored or none is. A natural-key collision fails
    /// the whole batch with [`StoreError::Conflict`].
    async fn insert_batch(&self, records: &[NewRecord]) -> StoreResult<u64>;

    /// Insert one record, reporting a natural-key collision as
    /// [`InsertOutcome::Conflict`] instead of an error.
    async fn insert_one(&self, record: &NewRecord) -> StoreResult<InsertOutcome>;

    /// Count the records matching `filter` and fetch one window of them.
    ///
    /// Both values come from the same snapshot.
    async fn count_and_page(
        &self,
        filter: &RecordFilter,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(i64, Vec<CanonicalRecord>)>;

    /// Stream every record matching `filter` in ascending id order.
    ///
    /// Records are produced incrementally. Dropping the stream releases the
    /// underlying cursor and connection.
    fn stream(&self, filter: RecordFilter) -> BoxStream<'static, StoreResult<CanonicalRecord>>;

    async fn find_by_natural_key(&self, natural_key: &str) -> StoreResult<Option<CanonicalRecord>>;

    /// Cheap connectivity probe used by the health endpoint
    async fn health_check(&self) -> StoreResult<()>;
}
