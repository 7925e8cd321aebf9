//! Provider ingestion
//!
//! Loads a registry extract into the record store.
//!
//! # Architecture
//!
//! - **config**: column presets, eligibility rules and batch sizing (`INGEST_*`)
//! - **source**: streaming CSV reader with header validation
//! - **normalizer**: raw row to canonical candidate, or a rejection reason
//! - **dedup**: in-run first-wins filter and the store-existence check
//! - **loader**: batched, transactional inserts with row-level fallback
//! - **pipeline**: runs the stages concurrently and reports [`IngestStats`]

pub mod config;
pub mod dedup;
pub mod loader;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod source;

pub use config::{ColumnMapping, ColumnPreset, EligibilityRule, IngestConfig};
pub use dedup::Deduplicator;
pub use loader::{BulkLoader, LoadError, LoadOutcome};
pub use models::{Candidate, IngestStats, LoadStats, RawRow, RejectReason};
pub use normalizer::RecordNormalizer;
pub use pipeline::{IngestError, IngestPipeline};
pub use source::{CsvSource, SourceError};
