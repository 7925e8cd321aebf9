//! Bulk loader
//!
//! Groups candidates into batches and writes each batch in one store
//! transaction. When a batch fails as a unit (a key inserted by a concurrent
//! run, or a row the store refuses) the loader retries the batch one row at a
//! time so one bad row cannot discard its neighbours:
//!
//! - key conflict on retry: counted as a duplicate
//! - other store error on retry: counted as `store_failed` and logged
//! - store unavailable at any point: the load stops and the error propagates
//!
//! A cancelled load stops pulling candidates and drops the batch it was
//! filling. A batch already being written finishes first.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dedup::split_existing;
use super::models::{Candidate, LoadStats};
use crate::store::{InsertOutcome, NewRecord, RecordStore, StoreError};

/// Load stopped early; carries the counts reached so far
#[derive(Error, Debug)]
#[error("Bulk load aborted after {} inserted: {source}", .partial.inserted)]
pub struct LoadError {
    pub partial: LoadStats,
    #[source]
    pub source: StoreError,
}

/// How a load finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub stats: LoadStats,
    pub cancelled: bool,
}

pub struct BulkLoader<S: ?Sized> {
    store: Arc<S>,
    batch_size: usize,
}

impl<S> BulkLoader<S>
where
    S: RecordStore + ?Sized,
{
    pub fn new(store: Arc<S>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Consume `candidates` until exhausted or cancelled.
    pub async fn load<C>(
        &self,
        candidates: C,
        cancel: &CancellationToken,
    ) -> Result<LoadOutcome, LoadError>
    where
        C: Stream<Item = Candidate> + Unpin,
    {
        let mut candidates = candidates;
        let mut stats = LoadStats::default();
        let mut batch = Vec::with_capacity(self.batch_size);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(
                        discarded = batch.len(),
                        inserted = stats.inserted,
                        "Load cancelled, discarding unwritten batch"
                    );
                    return Ok(LoadOutcome { stats, cancelled: true });
                }
                next = candidates.next() => next,
            };

            match next {
                Some(candidate) => {
                    batch.push(candidate);
                    if batch.len() >= self.batch_size {
                        let full = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                        self.write_batch(full, &mut stats).await.map_err(|source| LoadError {
                            partial: stats,
                            source,
                        })?;
                    }
                },
                None => break,
            }
        }

        if !batch.is_empty() {
            self.write_batch(batch, &mut stats)
                .await
                .map_err(|source| LoadError {
                    partial: stats,
                    source,
                })?;
        }

        Ok(LoadOutcome {
            stats,
            cancelled: false,
        })
    }

    /// Write one batch; only an unavailable store is returned as an error.
    async fn write_batch(
        &self,
        batch: Vec<Candidate>,
        stats: &mut LoadStats,
    ) -> Result<(), StoreError> {
        let (fresh, already_stored) = split_existing(self.store.as_ref(), batch).await?;
        stats.duplicate_skipped += already_stored;
        if fresh.is_empty() {
            return Ok(());
        }

        let records: Vec<NewRecord> = fresh.iter().map(|c| c.record.clone()).collect();
        match self.store.insert_batch(&records).await {
            Ok(inserted) => {
                stats.inserted += inserted;
                stats.batches_committed += 1;
                debug!(
                    batch = stats.batches_committed,
                    inserted,
                    skipped = already_stored,
                    "Batch committed"
                );
                Ok(())
            },
            Err(e) if e.is_unavailable() => Err(e),
            Err(e) => {
                warn!(error = %e, rows = fresh.len(), "Batch failed, retrying rows individually");
                stats.batches_retried += 1;
                self.write_rows(&fresh, stats).await
            },
        }
    }

    async fn write_rows(
        &self,
        candidates: &[Candidate],
        stats: &mut LoadStats,
    ) -> Result<(), StoreError> {
        for candidate in candidates {
            match self.store.insert_one(&candidate.record).await {
                Ok(InsertOutcome::Inserted) => stats.inserted += 1,
                Ok(InsertOutcome::Conflict) => {
                    debug!(
                        natural_key = %candidate.natural_key(),
                        line = candidate.line,
                        "Key inserted concurrently, skipping"
                    );
                    stats.duplicate_skipped += 1;
                },
                Err(e) if e.is_unavailable() => return Err(e),
                Err(e) => {
                    warn!(
                        natural_key = %candidate.natural_key(),
                        line = candidate.line,
                        error = %e,
                        "Failed to store row"
                    );
                    stats.store_failed += 1;
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FaultPlan, MemoryStore};
    use futures::stream;

    fn candidate(key: &str) -> Candidate {
        Candidate {
            line: 2,
            record: NewRecord {
                natural_key: key.to_string(),
                display_name: format!("Provider {}", key),
                phone: None,
                specialty_code: None,
                region_code: Some("TX".to_string()),
            },
        }
    }

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n).map(|i| candidate(&format!("{:010}", 1_000_000_000 + i))).collect()
    }

    #[tokio::test]
    async fn test_loads_in_batches() {
        let store = Arc::new(MemoryStore::new());
        let loader = BulkLoader::new(store.clone(), 4);

        let outcome = loader
            .load(stream::iter(candidates(10)), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!outcome.cancelled);
        assert_eq!(outcome.stats.inserted, 10);
        assert_eq!(outcome.stats.batches_committed, 3);
        assert_eq!(store.len().await, 10);
    }

    #[tokio::test]
    async fn test_second_load_is_all_duplicates() {
        let store = Arc::new(MemoryStore::new());
        let loader = BulkLoader::new(store.clone(), 3);
        let token = CancellationToken::new();

        loader.load(stream::iter(candidates(5)), &token).await.unwrap();
        let second = loader.load(stream::iter(candidates(5)), &token).await.unwrap();

        assert_eq!(second.stats.inserted, 0);
        assert_eq!(second.stats.duplicate_skipped, 5);
        assert_eq!(store.len().await, 5);
    }

    #[tokio::test]
    async fn test_unavailable_store_returns_partial_counts() {
        let store = Arc::new(MemoryStore::with_faults(FaultPlan {
            unavailable_after_batches: Some(2),
            ..FaultPlan::default()
        }));
        let loader = BulkLoader::new(store.clone(), 2);

        let err = loader
            .load(stream::iter(candidates(7)), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.source.is_unavailable());
        assert_eq!(err.partial.inserted, 4);
        assert_eq!(err.partial.batches_committed, 2);
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let loader = BulkLoader::new(store.clone(), 2);
        let token = CancellationToken::new();
        token.cancel();

        let outcome = loader.load(stream::iter(candidates(4)), &token).await.unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.stats.inserted, 0);
        assert!(store.is_empty().await);
    }
}
