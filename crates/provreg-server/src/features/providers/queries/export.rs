//! Streaming export
//!
//! An [`ExportCursor`] yields every record matching a filter, in the same
//! ascending-id order as paged queries, without holding the result set in
//! memory. If the store fails mid-stream the cursor yields one
//! [`ExportError::StreamTerminated`] and then ends; consumers must treat the
//! output as incomplete.

use futures::stream::{self, BoxStream, Stream, StreamExt};
use provreg_common::{CanonicalRecord, FilterSpec};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::warn;

use crate::features::providers::encoding;
use crate::store::{RecordFilter, RecordStore, StoreError, StoreResult};

/// `GET /providers/export` parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportProvidersQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ExportProvidersQuery {
    pub fn filter(&self) -> FilterSpec {
        FilterSpec::from_parts(
            self.region.as_deref(),
            self.specialty.as_deref(),
            self.search.as_deref(),
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The store failed after `rows_emitted` records were produced
    #[error("Export stream terminated after {rows_emitted} rows: {source}")]
    StreamTerminated {
        rows_emitted: u64,
        #[source]
        source: StoreError,
    },

    #[error("Failed to encode export row: {0}")]
    Encode(#[from] csv::Error),
}

/// Lazy, finite, ordered sequence of matching records
pub struct ExportCursor {
    inner: Option<BoxStream<'static, StoreResult<CanonicalRecord>>>,
    rows_emitted: u64,
}

impl ExportCursor {
    /// Open a cursor over every record matching `filter`.
    pub fn open<S>(store: &S, filter: &FilterSpec) -> Self
    where
        S: RecordStore + ?Sized,
    {
        Self {
            inner: Some(store.stream(RecordFilter::compile(filter))),
            rows_emitted: 0,
        }
    }

    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }

    /// Release the underlying store cursor now instead of at drop.
    pub fn close(&mut self) {
        self.inner = None;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl Stream for ExportCursor {
    type Item = Result<CanonicalRecord, ExportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(record))) => {
                this.rows_emitted += 1;
                Poll::Ready(Some(Ok(record)))
            },
            Poll::Ready(Some(Err(source))) => {
                this.inner = None;
                warn!(rows_emitted = this.rows_emitted, error = %source, "Export terminated early");
                Poll::Ready(Some(Err(ExportError::StreamTerminated {
                    rows_emitted: this.rows_emitted,
                    source,
                })))
            },
            Poll::Ready(None) => {
                this.inner = None;
                Poll::Ready(None)
            },
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Encode a cursor as CSV chunks: the header, then one chunk per record.
///
/// Stops after the first error.
pub fn csv_chunks(cursor: ExportCursor) -> impl Stream<Item = Result<Vec<u8>, ExportError>> + Send {
    let header = stream::once(async { encoding::encode_header().map_err(ExportError::from) });
    let rows = cursor.map(|item| item.and_then(|record| Ok(encoding::encode_record(&record)?)));

    header.chain(rows).scan(false, |failed, item| {
        if *failed {
            return futures::future::ready(None);
        }
        *failed = item.is_err();
        futures::future::ready(Some(item))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FaultPlan, MemoryStore, NewRecord};
    use futures::TryStreamExt;

    async fn seed(store: &MemoryStore, n: usize) {
        let records: Vec<NewRecord> = (0..n)
            .map(|i| NewRecord {
                natural_key: format!("{:010}", 1_000_000_000 + i),
                display_name: format!("Provider {}", i),
                phone: None,
                specialty_code: None,
                region_code: Some("TX".to_string()),
            })
            .collect();
        store.insert_batch(&records).await.unwrap();
    }

    #[tokio::test]
    async fn test_cursor_yields_all_matches() {
        let store = MemoryStore::new();
        seed(&store, 4).await;

        let mut cursor = ExportCursor::open(&store, &FilterSpec::new());
        let mut count = 0;
        while let Some(item) = cursor.next().await {
            item.unwrap();
            count += 1;
        }
        assert_eq!(count, 4);
        assert_eq!(cursor.rows_emitted(), 4);
        assert!(cursor.is_closed());
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let store = MemoryStore::new();
        seed(&store, 4).await;

        let mut cursor = ExportCursor::open(&store, &FilterSpec::new());
        cursor.next().await.unwrap().unwrap();
        cursor.close();
        assert!(cursor.next().await.is_none());
        assert_eq!(cursor.rows_emitted(), 1);
    }

    #[tokio::test]
    async fn test_failure_ends_with_stream_terminated() {
        let store = MemoryStore::with_faults(FaultPlan {
            stream_fails_after: Some(2),
            ..FaultPlan::default()
        });
        seed(&store, 5).await;

        let items: Vec<_> = ExportCursor::open(&store, &FilterSpec::new()).collect().await;

        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok() && items[1].is_ok());
        match &items[2] {
            Err(ExportError::StreamTerminated { rows_emitted, .. }) => assert_eq!(*rows_emitted, 2),
            other => panic!("expected StreamTerminated, got {:?}", other.as_ref().map(|r| &r.id)),
        }
    }

    #[tokio::test]
    async fn test_csv_chunks_of_empty_result_is_header_only() {
        let store = MemoryStore::new();
        let chunks: Vec<Vec<u8>> = csv_chunks(ExportCursor::open(&store, &FilterSpec::new()))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with(b"id,natural_key"));
    }
}
