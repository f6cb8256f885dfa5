//! Byte-budget in-memory cache for decoded images.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::ImageKey;

struct Entry {
    image: Arc<image::DynamicImage>,
    bytes: u64,
}

struct CacheInner {
    entries: LruCache<ImageKey, Entry>,
    resident_bytes: u64,
}

/// In-memory LRU cache for decoded images, bounded by a byte budget.
///
/// A single lock serializes all operations so the byte accounting stays
/// exact under concurrent access from the workers and the request path.
/// After any `put` returns, the tracked resident bytes never exceed the
/// budget fixed at construction.
pub struct MemoryImageCache {
    inner: Mutex<CacheInner>,
    budget: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

fn image_bytes(image: &image::DynamicImage) -> u64 {
    image.as_bytes().len() as u64
}

impl MemoryImageCache {
    /// Creates a cache with the given byte budget. A zero budget is clamped
    /// to one byte; callers validate their configuration before this.
    #[must_use]
    pub fn new(budget: u64) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::unbounded(),
                resident_bytes: 0,
            }),
            budget: budget.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up a decoded image, promoting it to most recently used.
    pub fn get(&self, key: &ImageKey) -> Option<Arc<image::DynamicImage>> {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "memory cache hit");
            Some(entry.image.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "memory cache miss");
            None
        }
    }

    /// Stores a decoded image, evicting least-recently-used entries until
    /// the byte budget holds again. An image larger than the whole budget
    /// does not stay resident.
    pub fn put(&self, key: ImageKey, image: Arc<image::DynamicImage>) {
        let bytes = image_bytes(&image);
        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.put(key.clone(), Entry { image, bytes }) {
            inner.resident_bytes -= old.bytes;
        }
        inner.resident_bytes += bytes;
        debug!(key = %key, bytes, "stored image in memory cache");

        while inner.resident_bytes > self.budget {
            let Some((evicted_key, evicted)) = inner.entries.pop_lru() else {
                break;
            };
            inner.resident_bytes -= evicted.bytes;
            debug!(key = %evicted_key, bytes = evicted.bytes, "evicted from memory cache");
        }
    }

    /// Removes a single entry.
    pub fn evict(&self, key: &ImageKey) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.pop(key) {
            inner.resident_bytes -= entry.bytes;
            debug!(key = %key, "evicted image from memory cache");
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.resident_bytes = 0;
        debug!("cleared memory image cache");
    }

    /// Bytes currently resident.
    #[must_use]
    pub fn resident_bytes(&self) -> u64 {
        self.inner.lock().resident_bytes
    }

    /// Number of cached images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.len(),
            resident_bytes: self.resident_bytes(),
        }
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub size: usize,
    /// Bytes currently resident.
    pub resident_bytes: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images, {} bytes, {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.resident_bytes, self.hit_rate, self.hits, self.misses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_image(width: u32, height: u32) -> Arc<image::DynamicImage> {
        Arc::new(image::DynamicImage::new_rgb8(width, height))
    }

    // new_rgb8 buffers are width * height * 3 bytes

    #[test]
    fn put_and_get() {
        let cache = MemoryImageCache::new(10_000);
        let key = ImageKey::new("a");

        cache.put(key.clone(), rgb_image(10, 10));
        let hit = cache.get(&key);

        assert!(hit.is_some());
        assert_eq!(hit.unwrap().width(), 10);
        assert_eq!(cache.resident_bytes(), 300);
    }

    #[test]
    fn miss_returns_none() {
        let cache = MemoryImageCache::new(10_000);
        assert!(cache.get(&ImageKey::new("missing")).is_none());
    }

    #[test]
    fn byte_budget_evicts_least_recently_used() {
        // budget fits exactly two 10x10 rgb images
        let cache = MemoryImageCache::new(600);

        cache.put(ImageKey::new("a"), rgb_image(10, 10));
        cache.put(ImageKey::new("b"), rgb_image(10, 10));
        cache.put(ImageKey::new("c"), rgb_image(10, 10));

        assert!(cache.get(&ImageKey::new("a")).is_none());
        assert!(cache.get(&ImageKey::new("b")).is_some());
        assert!(cache.get(&ImageKey::new("c")).is_some());
        assert_eq!(cache.resident_bytes(), 600);
    }

    #[test]
    fn get_promotes_recency() {
        let cache = MemoryImageCache::new(600);

        cache.put(ImageKey::new("a"), rgb_image(10, 10));
        cache.put(ImageKey::new("b"), rgb_image(10, 10));
        let _ = cache.get(&ImageKey::new("a"));
        cache.put(ImageKey::new("c"), rgb_image(10, 10));

        // "b" was least recently used once "a" got touched
        assert!(cache.get(&ImageKey::new("b")).is_none());
        assert!(cache.get(&ImageKey::new("a")).is_some());
    }

    #[test]
    fn overwrite_adjusts_accounting_and_refreshes_recency() {
        let cache = MemoryImageCache::new(1_000);

        cache.put(ImageKey::new("a"), rgb_image(10, 10));
        cache.put(ImageKey::new("a"), rgb_image(10, 5));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.resident_bytes(), 150);
    }

    #[test]
    fn oversized_entry_does_not_stay_resident() {
        let cache = MemoryImageCache::new(100);

        cache.put(ImageKey::new("big"), rgb_image(10, 10));

        assert!(cache.is_empty());
        assert_eq!(cache.resident_bytes(), 0);
    }

    #[test]
    fn budget_never_exceeded_across_sequences() {
        let cache = MemoryImageCache::new(900);

        for i in 0..20 {
            cache.put(ImageKey::new(format!("k{i}")), rgb_image(10, 10));
            assert!(cache.resident_bytes() <= 900);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn evict_and_clear() {
        let cache = MemoryImageCache::new(10_000);
        cache.put(ImageKey::new("a"), rgb_image(10, 10));
        cache.put(ImageKey::new("b"), rgb_image(10, 10));

        cache.evict(&ImageKey::new("a"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.resident_bytes(), 300);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.resident_bytes(), 0);
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let cache = MemoryImageCache::new(10_000);
        cache.put(ImageKey::new("a"), rgb_image(10, 10));

        let _ = cache.get(&ImageKey::new("a"));
        let _ = cache.get(&ImageKey::new("missing"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }
}
