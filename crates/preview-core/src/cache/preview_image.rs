//! Decoded preview image cache
//!
//! Sliding-TTL cache from [`CacheKey`] to decoded bitmaps. A hit extends the
//! entry's life by the full TTL; an entry nobody reads again is removed by the
//! periodic sweep. Memory is bounded per item (oversized bitmaps are never
//! stored) and in aggregate (LRU eviction in the underlying [`BoundedStore`]).
//!
//! All reads, writes and the sweep are serialized on one mutex, so a refresh
//! and a sweep of the same entry are ordered, never interleaved.

use std::sync::{Arc, Weak};

use image::DynamicImage;
use parking_lot::Mutex;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::bounded::BoundedStore;
use crate::config::{ImageCacheConfig, ImageCostModel};
use crate::error::ConfigError;
use crate::key::CacheKey;

/// Counters for cache behaviour since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped because their TTL passed (on read or in the sweep)
    pub expirations: u64,
    /// Inserts refused for exceeding the per-item ceiling
    pub rejections: u64,
    /// Entries dropped to satisfy the count or cost ceiling
    pub evictions: u64,
}

/// Estimated memory cost of a decoded bitmap under the given model
pub fn image_cost(model: ImageCostModel, bitmap: &DynamicImage) -> u64 {
    match model {
        ImageCostModel::FourBytesPerPixel => {
            u64::from(bitmap.width())
                .saturating_mul(u64::from(bitmap.height()))
                .saturating_mul(4)
        }
        ImageCostModel::BackingBuffer => bitmap.as_bytes().len() as u64,
    }
}

struct ImageEntry {
    bitmap: Arc<DynamicImage>,
    expires_at: Instant,
}

struct ImageCacheState {
    store: BoundedStore<CacheKey, ImageEntry>,
    ttl: Duration,
    max_item_bytes: u64,
    cost_model: ImageCostModel,
    stats: CacheStats,
}

impl ImageCacheState {
    fn get(&mut self, key: &CacheKey, now: Instant) -> Option<Arc<DynamicImage>> {
        let ttl = self.ttl;
        let Some(entry) = self.store.get_mut(key) else {
            self.stats.misses += 1;
            return None;
        };

        if now >= entry.expires_at {
            self.store.remove(key);
            self.stats.expirations += 1;
            self.stats.misses += 1;
            trace!(key = %key, "Preview image expired on read");
            return None;
        }

        entry.expires_at = now + ttl;
        let bitmap = Arc::clone(&entry.bitmap);
        self.stats.hits += 1;
        Some(bitmap)
    }

    fn put(&mut self, key: CacheKey, bitmap: Arc<DynamicImage>, now: Instant) {
        let cost = image_cost(self.cost_model, &bitmap);
        if cost > self.max_item_bytes {
            self.stats.rejections += 1;
            debug!(
                key = %key,
                cost = cost,
                max_item_bytes = self.max_item_bytes,
                "Preview image too large to cache"
            );
            return;
        }

        let entry = ImageEntry {
            bitmap,
            expires_at: now + self.ttl,
        };
        match self.store.insert(key, entry, cost) {
            Ok(evicted) if !evicted.is_empty() => {
                self.stats.evictions += evicted.len() as u64;
                trace!(
                    evicted = evicted.len(),
                    total_cost = self.store.total_cost(),
                    "Evicted preview images for capacity"
                );
            }
            Ok(_) => {}
            Err(_) => self.stats.rejections += 1,
        }
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let removed = self.store.retain(|_, entry| now < entry.expires_at);
        self.stats.expirations += removed as u64;
        removed
    }
}

/// Sliding-TTL, cost-bounded cache of decoded preview bitmaps
pub struct PreviewImageCache {
    state: Arc<Mutex<ImageCacheState>>,
    sweeper: CancellationToken,
}

impl PreviewImageCache {
    /// Build the cache and, when called inside a tokio runtime, start the
    /// background expiry sweep. Without a runtime, expired entries are
    /// dropped on read or by calling [`PreviewImageCache::purge_expired`].
    pub fn new(config: &ImageCacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let state = Arc::new(Mutex::new(ImageCacheState {
            store: BoundedStore::new(config.max_items, Some(config.max_total_bytes)),
            ttl: config.ttl(),
            max_item_bytes: config.max_item_bytes,
            cost_model: config.cost_model,
            stats: CacheStats::default(),
        }));
        let sweeper = CancellationToken::new();
        spawn_sweeper(
            Arc::downgrade(&state),
            config.sweep_interval(),
            sweeper.clone(),
        );

        Ok(Self { state, sweeper })
    }

    /// Fetch a bitmap, extending its life by the full TTL on a hit.
    ///
    /// Returns `None` for empty, unknown or expired keys; an expired entry is
    /// removed as a side effect.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<DynamicImage>> {
        if key.is_empty() {
            return None;
        }
        self.state.lock().get(key, Instant::now())
    }

    /// Store a bitmap with a fresh TTL.
    ///
    /// Bitmaps above the per-item cost ceiling are silently not stored. Other
    /// entries may be evicted, least recently used first, to make room.
    pub fn put(&self, key: CacheKey, bitmap: impl Into<Arc<DynamicImage>>) {
        if key.is_empty() {
            return;
        }
        self.state.lock().put(key, bitmap.into(), Instant::now());
    }

    pub fn remove(&self, key: &CacheKey) {
        self.state.lock().store.remove(key);
    }

    pub fn remove_all(&self) {
        self.state.lock().store.clear();
    }

    /// Whether a live (unexpired) entry exists; does not refresh it
    pub fn contains(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        self.state
            .lock()
            .store
            .peek(key)
            .is_some_and(|entry| now < entry.expires_at)
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.state.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_cost(&self) -> u64 {
        self.state.lock().store.total_cost()
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    /// Drop every expired entry now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.state.lock().purge_expired(Instant::now())
    }

    /// Stop the background sweep. Cached entries stay readable.
    pub fn shutdown(&self) {
        self.sweeper.cancel();
    }
}

impl Drop for PreviewImageCache {
    fn drop(&mut self) {
        self.sweeper.cancel();
    }
}

fn spawn_sweeper(
    state: Weak<Mutex<ImageCacheState>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        debug!("No tokio runtime, preview image sweep disabled");
        return;
    };

    runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval_ms = interval.as_millis() as u64, "Preview image sweep started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(state) = state.upgrade() else { break };
                    let removed = state.lock().purge_expired(Instant::now());
                    if removed > 0 {
                        debug!(removed = removed, "Swept expired preview images");
                    }
                }
            }
        }

        debug!("Preview image sweep stopped");
    });
}
