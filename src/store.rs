//! Concurrency-safe map backing the pool
//!
//! Every operation goes through one reader/writer guard: reads run together,
//! a write excludes everything else. Iteration only ever sees a copy.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;

/// Thread-safe mapping from key to value under a single `RwLock`.
///
/// # Examples
///
/// ```
/// use generic_pool::ConcurrentStore;
///
/// let store = ConcurrentStore::new();
/// assert!(store.set(1, "a"));
/// assert!(!store.set(1, "a"));
/// assert!(store.contains(&1));
/// assert_eq!(store.count(), 1);
///
/// let snapshot = store.items();
/// store.delete(&1);
/// assert_eq!(snapshot.len(), 1);
/// assert_eq!(store.count(), 0);
/// ```
#[derive(Debug)]
pub struct ConcurrentStore<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> ConcurrentStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.read().get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.read().contains_key(key)
    }

    pub fn delete(&self, key: &K) -> Option<V> {
        self.inner.write().remove(key)
    }

    /// Copy of every entry, taken under the read guard.
    pub fn items(&self) -> Vec<(K, V)> {
        self.inner
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.inner.read().len()
    }

    /// Run `f` under the read guard.
    pub fn read<R>(&self, f: impl FnOnce(&HashMap<K, V>) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run `f` under the write guard. Compound check-then-act sequences must
    /// go through here so no other operation interleaves.
    pub fn write<R>(&self, f: impl FnOnce(&mut HashMap<K, V>) -> R) -> R {
        f(&mut self.inner.write())
    }
}

impl<K, V> ConcurrentStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
{
    /// Insert or overwrite. Returns `false` when the key already maps to an
    /// equal value and nothing was written.
    pub fn set(&self, key: K, value: V) -> bool {
        let mut map = self.inner.write();
        match map.get(&key) {
            Some(existing) if *existing == value => false,
            _ => {
                map.insert(key, value);
                true
            }
        }
    }
}

impl<K, V> Default for ConcurrentStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_is_write_on_change() {
        let store = ConcurrentStore::new();

        assert!(store.set("k", 1));
        assert!(!store.set("k", 1));
        assert!(store.set("k", 2));
        assert_eq!(store.get(&"k"), Some(2));
    }

    #[test]
    fn test_get_contains_delete() {
        let store: ConcurrentStore<u64, &str> = ConcurrentStore::new();
        assert_eq!(store.get(&1), None);
        assert!(!store.contains(&1));

        store.set(1, "one");
        assert!(store.contains(&1));
        assert_eq!(store.delete(&1), Some("one"));
        assert_eq!(store.delete(&1), None);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_items_is_a_snapshot() {
        let store = ConcurrentStore::new();
        for i in 0..4u64 {
            store.set(i, i * 10);
        }

        let snapshot = store.items();
        for (k, _) in &snapshot {
            store.delete(k);
        }

        assert_eq!(snapshot.len(), 4);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(ConcurrentStore::new());
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..100u64 {
                        store.set(t * 1000 + i, i);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.count(), 800);
    }

    #[test]
    fn test_write_closure_is_atomic() {
        let store = Arc::new(ConcurrentStore::<u64, u64>::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.write(|map| {
                            let next = map.len() as u64;
                            map.insert(next, next);
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.count(), 800);
        assert!(store.read(|map| (0..800).all(|k| map.contains_key(&k))));
    }
}
