//! Markdown Artifact Cache
//!
//! Caches rendered markdown HTML and the measured content size so repeated
//! hovers skip re-rendering and re-measuring. Two independent LRU maps with
//! no TTL: entries live until evicted for capacity or explicitly cleared.
//! The maps may transiently disagree (HTML cached, metrics not measured yet).

use parking_lot::Mutex;
use tracing::trace;

use super::bounded::BoundedStore;
use crate::config::MarkdownCacheConfig;
use crate::error::ConfigError;
use crate::key::CacheKey;

/// Measured size of rendered content, in logical units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContentSize {
    pub width: f64,
    pub height: f64,
}

impl ContentSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Approximate in-memory cost of a string: 2 bytes per UTF-16 code unit
pub fn html_cost(html: &str) -> u64 {
    html.encode_utf16().count() as u64 * 2
}

/// Cached markdown HTML and layout metrics
pub struct MarkdownArtifactCache {
    html: Mutex<BoundedStore<CacheKey, String>>,
    metrics: Mutex<BoundedStore<CacheKey, ContentSize>>,
}

impl Default for MarkdownArtifactCache {
    fn default() -> Self {
        let config = MarkdownCacheConfig::default();
        Self::with_limits(&config)
    }
}

impl MarkdownArtifactCache {
    pub fn new(config: &MarkdownCacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_limits(config))
    }

    fn with_limits(config: &MarkdownCacheConfig) -> Self {
        Self {
            html: Mutex::new(BoundedStore::new(
                config.max_html_entries,
                Some(config.max_html_bytes),
            )),
            metrics: Mutex::new(BoundedStore::new(config.max_metrics_entries, None)),
        }
    }

    pub fn get_html(&self, key: &CacheKey) -> Option<String> {
        self.html.lock().get(key).cloned()
    }

    /// Cache rendered HTML. HTML larger than the whole byte budget is not
    /// stored, and any older HTML under the same key is dropped with it.
    pub fn set_html(&self, key: CacheKey, html: impl Into<String>) {
        let html = html.into();
        let cost = html_cost(&html);
        let mut store = self.html.lock();
        match store.insert(key.clone(), html, cost) {
            Ok(evicted) if !evicted.is_empty() => {
                trace!(evicted = evicted.len(), "Evicted markdown HTML for capacity");
            }
            Ok(_) => {}
            Err(_) => {
                store.remove(&key);
                trace!(key = %key, cost = cost, "Markdown HTML exceeds cache budget");
            }
        }
    }

    pub fn get_metrics(&self, key: &CacheKey) -> Option<ContentSize> {
        self.metrics.lock().get(key).copied()
    }

    pub fn set_metrics(&self, key: CacheKey, size: ContentSize) {
        if let Ok(evicted) = self.metrics.lock().insert(key, size, 0) {
            if !evicted.is_empty() {
                trace!(evicted = evicted.len(), "Evicted markdown metrics for capacity");
            }
        }
    }

    /// Drop both artifacts for a key
    pub fn remove(&self, key: &CacheKey) {
        self.html.lock().remove(key);
        self.metrics.lock().remove(key);
    }

    pub fn clear_html(&self) {
        self.html.lock().clear();
    }

    pub fn clear_metrics(&self) {
        self.metrics.lock().clear();
    }

    pub fn clear(&self) {
        self.clear_html();
        self.clear_metrics();
    }

    pub fn html_len(&self) -> usize {
        self.html.lock().len()
    }

    pub fn html_cost(&self) -> u64 {
        self.html.lock().total_cost()
    }

    pub fn metrics_len(&self) -> usize {
        self.metrics.lock().len()
    }
}
