//! # Index
//!
//! The in-memory key/value index behind the kvlog store.
//!
//! The index is a hash table with separate chaining, written out by hand
//! rather than wrapping a standard map: collision handling and growth are
//! part of the store's observable design.
//!
//! ## Layout
//! - The bucket array length is always a power of two, so a key's bucket is
//!   `hash(key) & (bucket_count - 1)`.
//! - Each bucket is an ordered chain of `(key, value)` pairs, scanned
//!   linearly.
//! - Hashing uses [`FxHasher`], which is unseeded and therefore deterministic
//!   across runs.
//!
//! ## Write semantics
//! - An existing key is overwritten **in place**; the entry count is
//!   unchanged.
//! - A new key is appended to the end of its chain.
//! - When the entry count exceeds three quarters of the bucket count the
//!   bucket array doubles and every chain is redistributed. Lookups behave
//!   identically before and after growth.
//!
//! ## Example
//! ```rust
//! use index::Index;
//!
//! let mut idx = Index::new();
//! idx.set("x".to_string(), "10".to_string());
//! idx.set("x".to_string(), "20".to_string());
//! assert_eq!(idx.get("x"), Some("20"));
//! assert_eq!(idx.len(), 1);
//! assert!(idx.get("y").is_none());
//! ```

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

/// Bucket count used by [`Index::new`].
pub const DEFAULT_CAPACITY: usize = 1024;

/// Upper bound on the *initial* bucket count. Growth past this is still
/// allowed; this only caps what a caller can pre-allocate.
pub const MAX_INITIAL_CAPACITY: usize = 1 << 20;

// grow once len > bucket_count * 3/4
const LOAD_NUM: usize = 3;
const LOAD_DEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    value: String,
}

/// A chained hash table mapping token keys to token values.
///
/// Only point lookup ([`get`](Index::get)) and upsert
/// ([`set`](Index::set)) are exposed; there is no removal because the log
/// format has no delete record.
#[derive(Debug, Clone)]
pub struct Index {
    buckets: Vec<Vec<Entry>>,
    len: usize,
}

impl Index {
    /// Creates an empty index with [`DEFAULT_CAPACITY`] buckets.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty index whose bucket count is the next power of two
    /// `>= capacity` (at least 1, at most [`MAX_INITIAL_CAPACITY`]).
    pub fn with_capacity(capacity: usize) -> Self {
        let bucket_count = capacity.clamp(1, MAX_INITIAL_CAPACITY).next_power_of_two();
        Self {
            buckets: empty_buckets(bucket_count),
            len: 0,
        }
    }

    /// Returns the value stored for `key`, or `None` if the key was never set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.buckets[self.bucket_index(key)]
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Inserts or overwrites `key`.
    ///
    /// Returns the previous value when the key was already present (the
    /// entry is updated in place), or `None` when a new entry was appended
    /// to the key's chain.
    pub fn set(&mut self, key: String, value: String) -> Option<String> {
        let idx = self.bucket_index(&key);
        let chain = &mut self.buckets[idx];

        if let Some(entry) = chain.iter_mut().find(|e| e.key == key) {
            return Some(std::mem::replace(&mut entry.value, value));
        }

        chain.push(Entry { key, value });
        self.len += 1;

        if self.len * LOAD_DEN > self.buckets.len() * LOAD_NUM {
            self.grow();
        }
        None
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no key has been set.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current length of the bucket array (always a power of two).
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_index(&self, key: &str) -> usize {
        bucket_for(key, self.buckets.len())
    }

    /// Doubles the bucket array and redistributes every chain. Entries keep
    /// their relative order within each new chain.
    fn grow(&mut self) {
        let bucket_count = self.buckets.len() * 2;
        let old = std::mem::replace(&mut self.buckets, empty_buckets(bucket_count));
        for entry in old.into_iter().flatten() {
            let idx = bucket_for(&entry.key, bucket_count);
            self.buckets[idx].push(entry);
        }
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

fn empty_buckets(n: usize) -> Vec<Vec<Entry>> {
    (0..n).map(|_| Vec::new()).collect()
}

fn hash_key(key: &str) -> u64 {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

/// `bucket_count` must be a power of two.
fn bucket_for(key: &str, bucket_count: usize) -> usize {
    debug_assert!(bucket_count.is_power_of_two());
    (hash_key(key) as usize) & (bucket_count - 1)
}
