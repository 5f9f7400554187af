//! Bounded LRU store
//!
//! Shared building block for the image and markdown caches. Recency order
//! comes from `lru::LruCache`; this wrapper adds a count ceiling and an
//! optional aggregate cost ceiling, evicting least-recently used entries
//! until both hold.

use std::hash::Hash;

use lru::LruCache;

struct Slot<V> {
    value: V,
    cost: u64,
}

/// LRU map with count and cost ceilings
pub struct BoundedStore<K, V> {
    entries: LruCache<K, Slot<V>>,
    max_entries: usize,
    max_cost: Option<u64>,
    total_cost: u64,
}

impl<K, V> BoundedStore<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a store holding at most `max_entries` values (at least one) and,
    /// when `max_cost` is set, at most that much aggregate cost.
    pub fn new(max_entries: usize, max_cost: Option<u64>) -> Self {
        Self {
            // Capacity is enforced here so evictions can be reported
            entries: LruCache::unbounded(),
            max_entries: max_entries.max(1),
            max_cost,
            total_cost: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn max_cost(&self) -> Option<u64> {
        self.max_cost
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// Look up a value and mark it most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    /// Mutable lookup; also marks the entry most recently used
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key).map(|slot| &mut slot.value)
    }

    /// Look up a value without affecting recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.peek(key).map(|slot| &slot.value)
    }

    /// Insert or replace a value with the given cost.
    ///
    /// Least-recently-used entries are evicted until both ceilings hold and
    /// are returned to the caller. A value whose cost alone exceeds the cost
    /// ceiling is refused and handed back in `Err`; the store is unchanged.
    pub fn insert(&mut self, key: K, value: V, cost: u64) -> Result<Vec<(K, V)>, V> {
        if self.max_cost.is_some_and(|max| cost > max) {
            return Err(value);
        }

        // Replacement drops the old value; it is not reported as an eviction
        self.remove(&key);

        let mut evicted = Vec::new();
        while self.entries.len() >= self.max_entries || self.exceeds_cost_with(cost) {
            let Some((old_key, slot)) = self.entries.pop_lru() else {
                break;
            };
            self.total_cost = self.total_cost.saturating_sub(slot.cost);
            evicted.push((old_key, slot.value));
        }

        self.total_cost += cost;
        self.entries.put(key, Slot { value, cost });

        Ok(evicted)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.pop(key)?;
        self.total_cost = self.total_cost.saturating_sub(slot.cost);
        Some(slot.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_cost = 0;
    }

    /// Remove every entry for which `keep` returns false. Returns how many were removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) -> usize {
        let doomed: Vec<K> = self
            .entries
            .iter()
            .filter(|(key, slot)| !keep(key, &slot.value))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }

    /// Keys from least to most recently used
    pub fn keys_by_recency(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().rev().map(|(key, _)| key)
    }

    fn exceeds_cost_with(&self, incoming: u64) -> bool {
        self.max_cost
            .is_some_and(|max| self.total_cost.saturating_add(incoming) > max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(store: &BoundedStore<&'static str, u32>) -> Vec<&'static str> {
        store.keys_by_recency().copied().collect()
    }

    #[test]
    fn test_count_ceiling_evicts_oldest() {
        let mut store = BoundedStore::new(2, None);
        store.insert("a", 1, 0).unwrap();
        store.insert("b", 2, 0).unwrap();
        let evicted = store.insert("c", 3, 0).unwrap();

        assert_eq!(evicted, vec![("a", 1)]);
        assert_eq!(keys(&store), vec!["b", "c"]);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut store = BoundedStore::new(2, None);
        store.insert("a", 1, 0).unwrap();
        store.insert("b", 2, 0).unwrap();
        assert_eq!(store.get(&"a"), Some(&1));
        store.insert("c", 3, 0).unwrap();

        assert!(store.contains(&"a"));
        assert!(!store.contains(&"b"));
    }

    #[test]
    fn test_peek_does_not_refresh_recency() {
        let mut store = BoundedStore::new(2, None);
        store.insert("a", 1, 0).unwrap();
        store.insert("b", 2, 0).unwrap();
        assert_eq!(store.peek(&"a"), Some(&1));
        store.insert("c", 3, 0).unwrap();

        assert!(!store.contains(&"a"));
    }

    #[test]
    fn test_cost_ceiling_evicts_until_it_fits() {
        let mut store = BoundedStore::new(10, Some(100));
        store.insert("a", 1, 40).unwrap();
        store.insert("b", 2, 40).unwrap();
        let evicted = store.insert("c", 3, 50).unwrap();

        assert_eq!(evicted, vec![("a", 1)]);
        assert_eq!(store.total_cost(), 90);
        assert!(store.total_cost() <= 100);
    }

    #[test]
    fn test_oversized_value_is_refused_without_side_effects() {
        let mut store = BoundedStore::new(10, Some(100));
        store.insert("a", 1, 60).unwrap();

        assert_eq!(store.insert("huge", 9, 101), Err(9));
        assert!(store.contains(&"a"));
        assert_eq!(store.total_cost(), 60);
    }

    #[test]
    fn test_replace_updates_cost_and_is_not_an_eviction() {
        let mut store = BoundedStore::new(2, Some(100));
        store.insert("a", 1, 30).unwrap();
        let evicted = store.insert("a", 2, 70).unwrap();

        assert!(evicted.is_empty());
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_cost(), 70);
        assert_eq!(store.peek(&"a"), Some(&2));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut store = BoundedStore::new(4, Some(100));
        store.insert("a", 1, 10).unwrap();
        store.insert("b", 2, 20).unwrap();

        assert_eq!(store.remove(&"a"), Some(1));
        assert_eq!(store.remove(&"a"), None);
        assert_eq!(store.total_cost(), 20);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.total_cost(), 0);
        assert_eq!(keys(&store), Vec::<&str>::new());
    }

    #[test]
    fn test_retain_removes_rejected_entries() {
        let mut store = BoundedStore::new(4, None);
        for (key, value) in [("a", 1), ("b", 2), ("c", 3)] {
            store.insert(key, value, 0).unwrap();
        }

        let removed = store.retain(|_, value| value % 2 == 1);
        assert_eq!(removed, 1);
        assert_eq!(keys(&store), vec!["a", "c"]);
    }

    #[test]
    fn test_eviction_after_mixed_access() {
        let mut store = BoundedStore::new(3, Some(100));
        store.insert("a", 1, 30).unwrap();
        store.insert("b", 2, 30).unwrap();
        store.insert("c", 3, 30).unwrap();
        if let Some(value) = store.get_mut(&"a") {
            *value += 10;
        }
        assert_eq!(store.get(&"b"), Some(&2));

        // Count ceiling pushes out "c", the cost ceiling then takes "a"
        let evicted = store.insert("d", 4, 50).unwrap();
        assert_eq!(evicted, vec![("c", 3), ("a", 11)]);
        assert_eq!(keys(&store), vec!["b", "d"]);
        assert_eq!(store.total_cost(), 80);
    }

    #[test]
    fn test_zero_capacity_is_treated_as_one() {
        let mut store = BoundedStore::new(0, None);
        store.insert("a", 1, 0).unwrap();
        store.insert("b", 2, 0).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains(&"b"));
    }
}
