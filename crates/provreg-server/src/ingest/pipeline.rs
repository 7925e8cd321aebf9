//! Ingestion pipeline
//!
//! Wires the stages together:
//!
//! ```text
//! CsvSource -> eligibility -> RecordNormalizer -> Deduplicator
//!     -- bounded channel -->
//! BulkLoader (store-existence check, batched inserts, row-level retry)
//! ```
//!
//! The producer (read, filter, normalize, in-run dedup) runs on its own task
//! and hands candidates to the loader through a bounded channel, so reading
//! never runs more than one channel's worth ahead of the store. Both sides
//! watch the same [`CancellationToken`].

use futures::stream;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::IngestConfig;
use super::dedup::Deduplicator;
use super::loader::{BulkLoader, LoadError};
use super::models::{Candidate, IngestStats};
use super::normalizer::RecordNormalizer;
use super::source::{CsvSource, SourceError};
use crate::store::{NewRecord, RecordStore, StoreError};

/// Run-level failures.
///
/// Every variant carries the counts reached before the run stopped.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Source extract failed: {source}")]
    Source {
        #[source]
        source: SourceError,
        partial: Box<IngestStats>,
    },

    #[error("Store became unavailable: {source}")]
    StoreUnavailable {
        #[source]
        source: StoreError,
        partial: Box<IngestStats>,
    },

    #[error("Ingestion cancelled")]
    Cancelled { partial: Box<IngestStats> },

    #[error("Ingestion task failed: {0}")]
    Internal(String),
}

impl IngestError {
    pub fn partial(&self) -> Option<&IngestStats> {
        match self {
            IngestError::Source { partial, .. }
            | IngestError::StoreUnavailable { partial, .. }
            | IngestError::Cancelled { partial } => Some(partial),
            IngestError::Internal(_) => None,
        }
    }
}

pub struct IngestPipeline<S: ?Sized> {
    store: Arc<S>,
    config: IngestConfig,
}

impl<S> IngestPipeline<S>
where
    S: RecordStore + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, config: IngestConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Ingest a CSV file.
    pub async fn run_path(
        &self,
        path: impl AsRef<Path>,
        cancel: CancellationToken,
    ) -> Result<IngestStats, IngestError> {
        let source = CsvSource::open_path(path, &self.config.required_columns())
            .await
            .map_err(|source| IngestError::Source {
                source,
                partial: Box::new(IngestStats::new()),
            })?;
        self.run_source(source, cancel).await
    }

    /// Ingest CSV from any async reader.
    pub async fn run<R>(&self, reader: R, cancel: CancellationToken) -> Result<IngestStats, IngestError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let source = CsvSource::open(reader, &self.config.required_columns())
            .await
            .map_err(|source| IngestError::Source {
                source,
                partial: Box::new(IngestStats::new()),
            })?;
        self.run_source(source, cancel).await
    }

    #[tracing::instrument(skip_all, fields(batch_size = self.config.batch_size))]
    async fn run_source<R>(
        &self,
        source: CsvSource<R>,
        cancel: CancellationToken,
    ) -> Result<IngestStats, IngestError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        info!("Starting ingestion run");

        let (tx, mut rx) = mpsc::channel::<Candidate>(self.config.channel_capacity);
        let producer_cancel = cancel.child_token();
        let producer = tokio::spawn(produce(
            source,
            Producer::new(&self.config),
            tx,
            producer_cancel.clone(),
        ));

        let loader = BulkLoader::new(Arc::clone(&self.store), self.config.batch_size);
        let candidates = stream::poll_fn(move |cx| rx.poll_recv(cx));
        let load_result = loader.load(candidates, &cancel).await;

        // Stop the producer if the loader finished early for any reason.
        producer_cancel.cancel();
        let (mut stats, source_result) = producer
            .await
            .map_err(|e| IngestError::Internal(e.to_string()))?;

        let cancelled = match load_result {
            Ok(outcome) => {
                stats.merge_load(&outcome.stats);
                outcome.cancelled
            },
            Err(LoadError { partial, source }) => {
                stats.merge_load(&partial);
                stats.settle_unprocessed();
                stats.complete();
                warn!(
                error = %source,
                inserted = stats.inserted,
                unprocessed = stats.unprocessed,
                "Ingestion aborted"
            );
                return Err(IngestError::StoreUnavailable {
                    source,
                    partial: Box::new(stats),
                });
            },
        };
        if cancelled || cancel.is_cancelled() || source_result.is_err() {
            stats.settle_unprocessed();
        }
        stats.complete();

        if let Err(source) = source_result {
            warn!(error = %source, rows_read = stats.rows_read, "Source extract failed mid-run");
            return Err(IngestError::Source {
                source,
                partial: Box::new(stats),
            });
        }

        if cancelled || cancel.is_cancelled() {
            info!(inserted = stats.inserted, "Ingestion cancelled");
            return Err(IngestError::Cancelled {
                partial: Box::new(stats),
            });
        }

        info!(
            rows_read = stats.rows_read,
            inserted = stats.inserted,
            duplicates = stats.duplicate_skipped,
            rejected = stats.rejected,
            filtered = stats.filtered,
            store_failed = stats.store_failed,
            "Ingestion complete"
        );
        Ok(stats)
    }

    /// Normalize the first `limit` eligible rows without touching the store.
    pub async fn preview<R>(&self, reader: R, limit: usize) -> Result<Vec<NewRecord>, SourceError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut source = CsvSource::open(reader, &self.config.required_columns()).await?;
        let normalizer =
            RecordNormalizer::new(self.config.columns.clone(), self.config.natural_key_length);
        let mut records = Vec::with_capacity(limit);

        while records.len() < limit {
            let Some(row) = source.next_row().await? else {
                break;
            };
            if !self.config.is_eligible(&row) {
                continue;
            }
            if let Ok(record) = normalizer.normalize(&row) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// Producer-side stages
struct Producer {
    config: IngestConfig,
    normalizer: RecordNormalizer,
    dedup: Deduplicator,
    stats: IngestStats,
}

impl Producer {
    fn new(config: &IngestConfig) -> Self {
        Self {
            config: config.clone(),
            normalizer: RecordNormalizer::new(config.columns.clone(), config.natural_key_length),
            dedup: Deduplicator::new(),
            stats: IngestStats::new(),
        }
    }
}

async fn produce<R>(
    mut source: CsvSource<R>,
    mut producer: Producer,
    tx: mpsc::Sender<Candidate>,
    cancel: CancellationToken,
) -> (IngestStats, Result<(), SourceError>)
where
    R: AsyncRead + Unpin + Send,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = source.next_row() => next,
        };

        let row = match next {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) => return (producer.stats, Err(e)),
        };
        producer.stats.rows_read += 1;

        if !producer.config.is_eligible(&row) {
            producer.stats.filtered += 1;
            continue;
        }

        let record = match producer.normalizer.normalize(&row) {
            Ok(record) => record,
            Err(reason) => {
                debug!(line = row.line, %reason, "Row rejected");
                producer.stats.record_rejection(reason);
                continue;
            },
        };

        if !producer.dedup.admit(&record.natural_key) {
            debug!(line = row.line, natural_key = %record.natural_key, "Duplicate key in source");
            producer.stats.duplicate_skipped += 1;
            continue;
        }

        let candidate = Candidate {
            line: row.line,
            record,
        };
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = tx.send(candidate) => sent,
        };
        if sent.is_err() {
            break;
        }
    }

    debug!(rows_read = producer.stats.rows_read, "Producer finished");
    (producer.stats, Ok(()))
}
