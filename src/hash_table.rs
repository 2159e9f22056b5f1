//! Partitioned hash table shared by the build workers.
//!
//! Two lock levels keep unrelated keys from serializing each other:
//!
//! - the table level, a sharded map whose shard locks guard only which keys
//!   exist;
//! - the bucket level, one `RwLock` per key guarding that key's values.
//!
//! Appending to an existing key holds the shard lock shared and the bucket
//! lock exclusive. Creating a key takes the shard lock exclusive and inserts
//! through the entry API, which re-checks for a bucket published by a racing
//! writer in the same critical section.
//!
//! Once every build worker has finished, [`PartitionedHashTable::freeze`]
//! turns the table into a [`FrozenHashTable`] that probe workers read without
//! locking.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Append-only values sharing one join key.
#[derive(Debug)]
pub struct Bucket {
    values: RwLock<Vec<i64>>,
}

impl Bucket {
    fn seeded(value: i64) -> Self {
        Self {
            values: RwLock::new(vec![value]),
        }
    }

    fn append(&self, value: i64) {
        self.values.write().push(value);
    }

    /// Shared view of the values.
    pub fn values(&self) -> RwLockReadGuard<'_, Vec<i64>> {
        self.values.read()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn into_values(self) -> Vec<i64> {
        self.values.into_inner()
    }
}

/// What `insert` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Appended to a bucket found under the shared lock.
    Appended,
    /// Created a new bucket for the key.
    Created,
    /// Found the key missing, but another writer created it first.
    RaceLost,
}

/// Concurrent key to bucket mapping populated by the build stage.
#[derive(Debug, Default)]
pub struct PartitionedHashTable {
    buckets: DashMap<i64, Arc<Bucket>>,
    values: AtomicU64,
    races_lost: AtomicU64,
}

impl PartitionedHashTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` to the bucket of `key`, creating it if needed.
    pub fn insert(&self, key: i64, value: i64) -> InsertOutcome {
        self.values.fetch_add(1, Ordering::Relaxed);

        if let Some(bucket) = self.buckets.get(&key) {
            bucket.append(value);
            return InsertOutcome::Appended;
        }

        match self.buckets.entry(key) {
            Entry::Occupied(entry) => {
                entry.get().append(value);
                self.races_lost.fetch_add(1, Ordering::Relaxed);
                InsertOutcome::RaceLost
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Bucket::seeded(value)));
                InsertOutcome::Created
            }
        }
    }

    /// Look up the bucket of `key`. Its contents may still change while
    /// build workers are running.
    pub fn lookup(&self, key: i64) -> Option<Arc<Bucket>> {
        self.buckets.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of inserted values across all buckets.
    pub fn value_count(&self) -> u64 {
        self.values.load(Ordering::Relaxed)
    }

    /// How many inserts found the key missing under the shared lock but
    /// present under the exclusive one.
    pub fn races_lost(&self) -> u64 {
        self.races_lost.load(Ordering::Relaxed)
    }

    /// Consume the table once the build stage is complete.
    pub fn freeze(self) -> FrozenHashTable {
        let values = self.value_count();
        let buckets = self
            .buckets
            .into_iter()
            .map(|(key, bucket)| {
                let values = match Arc::try_unwrap(bucket) {
                    Ok(bucket) => bucket.into_values(),
                    // Someone still holds a lookup handle.
                    Err(shared) => shared.values().clone(),
                };
                (key, values.into_boxed_slice())
            })
            .collect();
        FrozenHashTable { buckets, values }
    }
}

/// Read-only hash table used by the probe stage.
#[derive(Debug, Default)]
pub struct FrozenHashTable {
    buckets: HashMap<i64, Box<[i64]>>,
    values: u64,
}

impl FrozenHashTable {
    pub fn lookup(&self, key: i64) -> Option<&[i64]> {
        self.buckets.get(&key).map(|values| &values[..])
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn value_count(&self) -> u64 {
        self.values
    }
}
