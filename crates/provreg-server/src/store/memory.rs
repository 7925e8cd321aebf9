//! In-memory record store
//!
//! Backs `--dry-run` imports and the test suites. Records live in a `BTreeMap`
//! keyed by id so iteration order matches the ascending-id order of the
//! PostgreSQL store.
//!
//! [`FaultPlan`] lets tests make the store fail in the ways a real database does:
//! a connection lost after some batches, or a cursor that dies mid-export.

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use provreg_common::CanonicalRecord;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{InsertOutcome, NewRecord, RecordFilter, RecordStore, StoreError, StoreResult};

/// Failures to inject into a [`MemoryStore`]
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Writes and key lookups fail as unavailable once this many batches have
    /// been committed
    pub unavailable_after_batches: Option<u64>,
    /// Streams end with an unavailable error after emitting this many records
    pub stream_fails_after: Option<usize>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<Uuid, CanonicalRecord>,
    by_key: HashMap<String, Uuid>,
}

impl MemoryState {
    fn insert(&mut self, record: &NewRecord) -> CanonicalRecord {
        let stored = CanonicalRecord {
            id: Uuid::now_v7(),
            natural_key: record.natural_key.clone(),
            display_name: record.display_name.clone(),
            phone: record.phone.clone(),
            specialty_code: record.specialty_code.clone(),
            region_code: record.region_code.clone(),
            created_at: Utc::now(),
        };
        self.by_key.insert(stored.natural_key.clone(), stored.id);
        self.records.insert(stored.id, stored.clone());
        stored
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    faults: Arc<FaultPlan>,
    batches_committed: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: FaultPlan) -> Self {
        Self {
            faults: Arc::new(faults),
            ..Self::default()
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// All stored records in id order
    pub async fn records(&self) -> Vec<CanonicalRecord> {
        self.state.read().await.records.values().cloned().collect()
    }

    fn check_available(&self) -> StoreResult<()> {
        match self.faults.unavailable_after_batches {
            Some(limit) if self.batches_committed.load(Ordering::SeqCst) >= limit => Err(
                StoreError::Unavailable("connection to memory store lost".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn existing_keys(&self, keys: &[String]) -> StoreResult<HashSet<String>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(keys
            .iter()
            .filter(|key| state.by_key.contains_key(key.as_str()))
            .cloned()
            .collect())
    }

    async fn insert_batch(&self, records: &[NewRecord]) -> StoreResult<u64> {
        self.check_available()?;
        let mut state = self.state.write().await;

        let mut batch_keys = HashSet::with_capacity(records.len());
        for record in records {
            if state.by_key.contains_key(&record.natural_key)
                || !batch_keys.insert(record.natural_key.as_str())
            {
                return Err(StoreError::Conflict(record.natural_key.clone()));
            }
        }

        for record in records {
            state.insert(record);
        }
        self.batches_committed.fetch_add(1, Ordering::SeqCst);
        Ok(records.len() as u64)
    }

    async fn insert_one(&self, record: &NewRecord) -> StoreResult<InsertOutcome> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state.by_key.contains_key(&record.natural_key) {
            return Ok(InsertOutcome::Conflict);
        }
        state.insert(record);
        Ok(InsertOutcome::Inserted)
    }

    async fn count_and_page(
        &self,
        filter: &RecordFilter,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(i64, Vec<CanonicalRecord>)> {
        let state = self.state.read().await;
        let matching: Vec<&CanonicalRecord> =
            state.records.values().filter(|r| filter.matches(r)).collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect();
        Ok((total, page))
    }

    fn stream(&self, filter: RecordFilter) -> BoxStream<'static, StoreResult<CanonicalRecord>> {
        let cursor = MemoryCursor {
            state: Arc::clone(&self.state),
            filter,
            after: None,
            ceiling: None,
            emitted: 0,
            fail_after: self.faults.stream_fails_after,
            done: false,
        };

        stream::unfold(cursor, |mut cursor| async move {
            let item = cursor.advance().await?;
            Some((item, cursor))
        })
        .boxed()
    }

    async fn find_by_natural_key(&self, natural_key: &str) -> StoreResult<Option<CanonicalRecord>> {
        let state = self.state.read().await;
        Ok(state
            .by_key
            .get(natural_key)
            .and_then(|id| state.records.get(id))
            .cloned())
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.check_available()
    }
}

/// Walks the id-ordered map one record per step.
///
/// The highest id present on the first step bounds the walk, so records
/// inserted while the stream is open are not returned.
struct MemoryCursor {
    state: Arc<RwLock<MemoryState>>,
    filter: RecordFilter,
    after: Option<Uuid>,
    ceiling: Option<Option<Uuid>>,
    emitted: usize,
    fail_after: Option<usize>,
    done: bool,
}

impl MemoryCursor {
    async fn advance(&mut self) -> Option<StoreResult<CanonicalRecord>> {
        if self.done {
            return None;
        }
        if self.fail_after == Some(self.emitted) {
            self.done = true;
            return Some(Err(StoreError::Unavailable(
                "cursor lost mid-stream".to_string(),
            )));
        }

        let state = self.state.read().await;
        let ceiling = *self
            .ceiling
            .get_or_insert_with(|| state.records.keys().next_back().copied());
        let next = ceiling.and_then(|ceiling| {
            let lower = match self.after {
                Some(id) => Bound::Excluded(id),
                None => Bound::Unbounded,
            };
            state
                .records
                .range((lower, Bound::Included(ceiling)))
                .map(|(_, record)| record)
                .find(|record| self.filter.matches(record))
                .cloned()
        });
        drop(state);

        match next {
            Some(record) => {
                self.after = Some(record.id);
                self.emitted += 1;
                Some(Ok(record))
            },
            None => {
                self.done = true;
                None
            },
        }
    }
}
