//! Ingestion data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::store::NewRecord;

/// One row of the source extract, keyed by header name.
///
/// Only the columns the active [`ColumnMapping`](super::config::ColumnMapping)
/// needs are retained. A column missing from a short row is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line in the source, header included
    pub line: u64,
    values: HashMap<String, String>,
}

impl RawRow {
    pub fn new(line: u64) -> Self {
        Self {
            line,
            values: HashMap::new(),
        }
    }

    pub fn from_pairs<K, V>(line: u64, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            line,
            values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }
}

/// A normalized record on its way to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub line: u64,
    pub record: NewRecord,
}

impl Candidate {
    pub fn natural_key(&self) -> &str {
        &self.record.natural_key
    }
}

/// Why a row was rejected by the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InvalidNaturalKey,
    MissingName,
    InvalidRegionCode,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::InvalidNaturalKey => "invalid_natural_key",
            RejectReason::MissingName => "missing_name",
            RejectReason::InvalidRegionCode => "invalid_region_code",
        };
        f.write_str(s)
    }
}

/// Outcome counts for one ingestion run.
///
/// Every row read is accounted for exactly once:
/// `rows_read == filtered + rejected + duplicate_skipped + inserted + store_failed + unprocessed`.
/// `unprocessed` is only non-zero when a run stops early.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub rows_read: u64,
    /// Rows dropped by eligibility rules before normalization
    pub filtered: u64,
    pub rejected: u64,
    pub rejected_by_reason: BTreeMap<RejectReason, u64>,
    /// In-run repeats plus keys already in the store
    pub duplicate_skipped: u64,
    pub inserted: u64,
    /// Rows the store refused for reasons other than a key conflict
    pub store_failed: u64,
    pub batches_committed: u64,
    /// Batches that failed as a unit and were retried row by row
    pub batches_retried: u64,
    /// Rows read but never written because the run stopped early: the batch in
    /// flight, the batch being filled, and candidates still queued for the loader
    pub unprocessed: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn record_rejection(&mut self, reason: RejectReason) {
        self.rejected += 1;
        *self.rejected_by_reason.entry(reason).or_insert(0) += 1;
    }

    pub fn rejected_for(&self, reason: RejectReason) -> u64 {
        self.rejected_by_reason.get(&reason).copied().unwrap_or(0)
    }

    /// Rows with a final outcome, plus those left unprocessed by an early stop
    pub fn accounted(&self) -> u64 {
        self.filtered
            + self.rejected
            + self.duplicate_skipped
            + self.inserted
            + self.store_failed
            + self.unprocessed
    }

    /// Attribute every row read without an outcome to `unprocessed`.
    pub fn settle_unprocessed(&mut self) {
        self.unprocessed += self.rows_read.saturating_sub(self.accounted());
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn duration_secs(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }

    /// Fold the loader's counts into the producer's.
    pub fn merge_load(&mut self, load: &LoadStats) {
        self.duplicate_skipped += load.duplicate_skipped;
        self.inserted += load.inserted;
        self.store_failed += load.store_failed;
        self.batches_committed += load.batches_committed;
        self.batches_retried += load.batches_retried;
    }
}

/// Counts kept by the bulk loader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    pub inserted: u64,
    /// Keys that were already in the store
    pub duplicate_skipped: u64,
    pub store_failed: u64,
    pub batches_committed: u64,
    pub batches_retried: u64,
}
