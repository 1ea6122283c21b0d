/*!
 * Sharded Hash Map
 *
 * Fixed number of buckets, each an unordered entry list behind its own
 * reader/writer lock. Contention is confined to keys that share a bucket.
 *
 * # Design: Fixed Bucket Array
 *
 * Buckets are allocated once and never resized. A key always maps to
 * `hash(key) % capacity`, so bucket selection needs no lock at all, and any
 * single-key operation takes exactly one lock.
 *
 * # Snapshot Consistency
 *
 * `snapshot` is the only multi-lock operation. It read-locks *every* bucket in
 * ascending index order before copying anything, so the result reflects one
 * instant across the whole table. Single-key writers never wait on a second
 * lock, so the fixed order is enough to rule out lock cycles.
 */

use crate::config::MapConfig;
use crate::errors::{ContainerError, ContainerResult};
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use tracing::{debug, trace};

/// Unordered entry list for one shard
struct Bucket<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> Bucket<K, V> {
    const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[inline]
    fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.entries.iter().position(|(k, _)| k.borrow() == key)
    }
}

/// Concurrent hash map with per-bucket shared/exclusive locking
///
/// # Performance
///
/// - **Reads**: shared lock on one bucket; readers of a bucket run in parallel
/// - **Writes**: exclusive lock on one bucket; other buckets are untouched
/// - **Snapshot**: shared lock on every bucket at once; keep it off hot paths
///
/// # Example
///
/// ```
/// use finelock::sync::ShardedMap;
///
/// let map = ShardedMap::new(16);
/// map.set("a", 1);
/// map.set("b", 2);
///
/// let snapshot = map.snapshot();
/// assert_eq!(snapshot.len(), 2);
///
/// map.erase("a");
/// assert_eq!(map.try_get("a"), None);
/// assert_eq!(map.try_get("b"), Some(2));
/// ```
pub struct ShardedMap<K, V, S = ahash::RandomState> {
    buckets: Box<[RwLock<Bucket<K, V>>]>,
    hasher: S,
}

impl<K, V> ShardedMap<K, V>
where
    K: Hash + Eq,
{
    /// Create a map with `capacity` buckets
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Use [`try_new`](Self::try_new) to get an
    /// error instead.
    pub fn new(capacity: usize) -> Self {
        Self::with_hasher(capacity, ahash::RandomState::new())
    }

    /// Create a map with `capacity` buckets, rejecting zero
    pub fn try_new(capacity: usize) -> ContainerResult<Self> {
        Self::try_with_hasher(capacity, ahash::RandomState::new())
    }

    /// Create a map sized by a [`MapConfig`]
    pub fn with_config(config: MapConfig) -> Self {
        Self::new(config.buckets)
    }

    /// Create a map sized by a [`MapConfig`] that may come from untrusted input
    pub fn try_with_config(config: MapConfig) -> ContainerResult<Self> {
        Self::try_new(config.buckets)
    }
}

impl<K, V, S> ShardedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Create a map with `capacity` buckets and a custom hash builder
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_hasher(capacity: usize, hasher: S) -> Self {
        assert!(capacity > 0, "Sharded map requires at least one bucket");
        Self::build(capacity, hasher)
    }

    /// Create a map with a custom hash builder, rejecting zero capacity
    pub fn try_with_hasher(capacity: usize, hasher: S) -> ContainerResult<Self> {
        if capacity == 0 {
            return Err(ContainerError::ZeroCapacity);
        }
        Ok(Self::build(capacity, hasher))
    }

    fn build(capacity: usize, hasher: S) -> Self {
        let buckets = (0..capacity)
            .map(|_| RwLock::new(Bucket::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        debug!(buckets = capacity, "sharded map created");
        Self { buckets, hasher }
    }

    /// Get bucket index for key (pure, takes no lock)
    #[inline]
    fn bucket_index<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        let mut hasher = self.hasher.build_hasher();
        key.hash(&mut hasher);
        (hasher.finish() % self.buckets.len() as u64) as usize
    }

    #[inline]
    fn bucket<Q>(&self, key: &Q) -> &RwLock<Bucket<K, V>>
    where
        Q: Hash + ?Sized,
    {
        &self.buckets[self.bucket_index(key)]
    }

    /// Insert or overwrite, returning the previous value
    pub fn set(&self, key: K, value: V) -> Option<V> {
        let mut bucket = self.bucket(&key).write();
        match bucket.position(&key) {
            Some(idx) => Some(std::mem::replace(&mut bucket.entries[idx].1, value)),
            None => {
                bucket.entries.push((key, value));
                None
            }
        }
    }

    /// Look up a value (shared lock only)
    pub fn try_get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let bucket = self.bucket(key).read();
        bucket
            .position(key)
            .map(|idx| bucket.entries[idx].1.clone())
    }

    /// Remove a key, returning its value if it was present
    pub fn erase<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut bucket = self.bucket(key).write();
        bucket
            .position(key)
            .map(|idx| bucket.entries.swap_remove(idx).1)
    }

    /// Check if key exists
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.bucket(key).read().position(key).is_some()
    }

    /// Point-in-time copy of every entry, ordered by key
    ///
    /// Holds a shared lock on every bucket for the duration of the copy, which
    /// stalls all writers. Meant for diagnostics and iteration, not hot paths.
    pub fn snapshot(&self) -> BTreeMap<K, V>
    where
        K: Ord + Clone,
        V: Clone,
    {
        // Ascending index order; nothing is read until every lock is held
        let guards: Vec<_> = self.buckets.iter().map(|bucket| bucket.read()).collect();

        let mut result = BTreeMap::new();
        for guard in &guards {
            for (key, value) in &guard.entries {
                result.insert(key.clone(), value.clone());
            }
        }
        drop(guards);

        trace!(entries = result.len(), buckets = self.buckets.len(), "snapshot taken");
        result
    }
}

impl<K, V, S> ShardedMap<K, V, S> {
    /// Number of buckets, fixed at construction
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Total entries, locking one bucket at a time
    ///
    /// Not a consistent count under concurrent writes; use
    /// [`snapshot`](Self::snapshot) for that.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.read().entries.len()).sum()
    }

    /// Check if empty (same caveat as [`len`](Self::len))
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|bucket| bucket.read().entries.is_empty())
    }
}

impl<K: Hash + Eq, V> Default for ShardedMap<K, V> {
    fn default() -> Self {
        Self::with_config(MapConfig::default())
    }
}

impl<K, V, S> fmt::Debug for ShardedMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedMap")
            .field("capacity", &self.buckets.len())
            .finish_non_exhaustive()
    }
}
