//! Cache for encoded slice PNGs.
//!
//! Scrubbing the slider back and forth requests the same slices repeatedly;
//! encoding a large slice dominates the cost of serving it.
//!
//! # Cache Key
//!
//! Slices are cached by session id and slice index. Volumes are immutable, so
//! an entry only goes stale when its session is deleted, at which point
//! [`SliceCache::remove_session`] drops it.
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of cached PNGs in bytes and evicts
//! least-recently-used entries when the capacity is exceeded.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;

/// Default cache capacity: 256MB
pub const DEFAULT_SLICE_CACHE_CAPACITY: usize = 256 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

// =============================================================================
// Cache Key
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SliceCacheKey {
    pub session: Arc<str>,
    pub slice: usize,
}

impl SliceCacheKey {
    pub fn new(session: impl Into<Arc<str>>, slice: usize) -> Self {
        Self {
            session: session.into(),
            slice,
        }
    }
}

// =============================================================================
// Slice Cache
// =============================================================================

struct Entries {
    lru: LruCache<SliceCacheKey, Bytes>,
    size: usize,
}

/// LRU cache of encoded slices with a byte budget.
///
/// Shared across request handlers via `Arc`.
pub struct SliceCache {
    entries: RwLock<Entries>,
    max_size: usize,
}

impl SliceCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SLICE_CACHE_CAPACITY)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(Entries {
                lru: LruCache::new(max_entries),
                size: 0,
            }),
            max_size,
        }
    }

    /// Cached PNG for `key`, marking it recently used.
    pub async fn get(&self, key: &SliceCacheKey) -> Option<Bytes> {
        let mut entries = self.entries.write().await;
        entries.lru.get(key).cloned()
    }

    /// Store a PNG, evicting least-recently-used entries while over budget.
    ///
    /// An entry larger than the whole budget is not stored.
    pub async fn put(&self, key: SliceCacheKey, data: Bytes) {
        if data.len() > self.max_size {
            return;
        }

        let mut guard = self.entries.write().await;
        let entries = &mut *guard;
        let data_size = data.len();

        if let Some(old) = entries.lru.peek(&key) {
            entries.size = entries.size.saturating_sub(old.len());
        }

        // Count-based eviction inside `push` must be accounted too
        if let Some((evicted_key, evicted)) = entries.lru.push(key.clone(), data) {
            if evicted_key != key {
                entries.size = entries.size.saturating_sub(evicted.len());
            }
        }
        entries.size += data_size;

        while entries.size > self.max_size {
            match entries.lru.pop_lru() {
                Some((_, evicted)) => {
                    entries.size = entries.size.saturating_sub(evicted.len());
                }
                None => break,
            }
        }
    }

    /// Drop every slice cached for `session`. Returns how many were removed.
    pub async fn remove_session(&self, session: &str) -> usize {
        let mut guard = self.entries.write().await;
        let entries = &mut *guard;
        let stale: Vec<SliceCacheKey> = entries
            .lru
            .iter()
            .filter(|(key, _)| key.session.as_ref() == session)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            if let Some(data) = entries.lru.pop(key) {
                entries.size = entries.size.saturating_sub(data.len());
            }
        }
        stale.len()
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.lru.clear();
        entries.size = 0;
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.lru.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.lru.is_empty()
    }

    /// Current total size of cached PNGs in bytes.
    pub async fn size(&self) -> usize {
        self.entries.read().await.size
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for SliceCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
