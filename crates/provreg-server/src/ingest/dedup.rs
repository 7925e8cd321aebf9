//! Deduplication
//!
//! Two layers. [`Deduplicator`] drops repeats within one run, first occurrence
//! wins. [`split_existing`] drops candidates whose key is already stored,
//! which is what makes re-running an import a no-op. The store's uniqueness
//! constraint is the final guard against a concurrent run inserting the same
//! key between the check and the insert.

use std::collections::HashSet;

use super::models::Candidate;
use crate::store::{RecordStore, StoreResult};

/// In-run first-wins key filter.
///
/// Holds every admitted key for the life of the run.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time `key` is seen, false for every repeat.
    pub fn admit(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Partition a batch into candidates that are new to the store and a count
/// of those that are not.
pub async fn split_existing<S>(
    store: &S,
    batch: Vec<Candidate>,
) -> StoreResult<(Vec<Candidate>, u64)>
where
    S: RecordStore + ?Sized,
{
    let keys: Vec<String> = batch.iter().map(|c| c.natural_key().to_string()).collect();
    let existing = store.existing_keys(&keys).await?;
    if existing.is_empty() {
        return Ok((batch, 0));
    }

    let before = batch.len();
    let fresh: Vec<Candidate> = batch
        .into_iter()
        .filter(|c| !existing.contains(c.natural_key()))
        .collect();
    let skipped = (before - fresh.len()) as u64;
    Ok((fresh, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewRecord};

    fn candidate(key: &str) -> Candidate {
        Candidate {
            line: 2,
            record: NewRecord {
                natural_key: key.to_string(),
                display_name: "Jane Smith".to_string(),
                phone: None,
                specialty_code: None,
                region_code: None,
            },
        }
    }

    #[test]
    fn test_first_occurrence_wins() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.admit("1234567890"));
        assert!(!dedup.admit("1234567890"));
        assert!(dedup.admit("1234567891"));
        assert_eq!(dedup.len(), 2);
    }

    #[tokio::test]
    async fn test_split_existing_drops_stored_keys() {
        let store = MemoryStore::new();
        store
            .insert_batch(&[candidate("1000000001").record])
            .await
            .unwrap();

        let batch = vec![candidate("1000000001"), candidate("1000000002")];
        let (fresh, skipped) = split_existing(&store, batch).await.unwrap();

        assert_eq!(skipped, 1);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].natural_key(), "1000000002");
    }

    #[tokio::test]
    async fn test_split_existing_on_empty_store() {
        let store = MemoryStore::new();
        let (fresh, skipped) = split_existing(&store, vec![candidate("1000000001")])
            .await
            .unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(fresh.len(), 1);
    }
}
