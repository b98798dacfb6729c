//! In-process store backed by a sharded concurrent map.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::Result;

use super::{ComputeFn, KvStore, StoreStats};

/// `KvStore` over a `DashMap`.
///
/// `compute_atomic` holds the shard lock of the key for the duration of the
/// callback, which serializes writers to the same key.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, Vec<u8>>,
    puts: AtomicU64,
    gets: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn compute_atomic(&self, key: &str, f: &mut ComputeFn<'_>) -> Result<()> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                self.gets.fetch_add(1, Ordering::Relaxed);
                match f(Some(entry.get().as_slice()))? {
                    Some(value) => {
                        entry.insert(value);
                        self.puts.fetch_add(1, Ordering::Relaxed);
                    }
                    None => {
                        entry.remove();
                    }
                }
            }
            Entry::Vacant(entry) => {
                if let Some(value) = f(None)? {
                    entry.insert(value);
                    self.puts.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }

    fn size(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    fn stats(&self) -> Result<StoreStats> {
        let memory_cost_bytes = self
            .entries
            .iter()
            .map(|e| (e.key().len() + e.value().len()) as u64)
            .sum();
        Ok(StoreStats {
            owned_entry_count: self.entries.len() as u64,
            memory_cost_bytes,
            put_count: self.puts.load(Ordering::Relaxed),
            get_count: self.gets.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use ntest::timeout;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_compute_creates_updates_and_removes() {
        let store = InMemoryStore::new();
        store
            .compute_atomic("k", &mut |current| {
                assert!(current.is_none());
                Ok(Some(vec![1]))
            })
            .unwrap();
        store
            .compute_atomic("k", &mut |current| {
                let mut v = current.unwrap().to_vec();
                v.push(2);
                Ok(Some(v))
            })
            .unwrap();
        assert_eq!(store.get("k").unwrap(), Some(vec![1, 2]));

        store.compute_atomic("k", &mut |_| Ok(None)).unwrap();
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn test_failed_compute_leaves_value() {
        let store = InMemoryStore::new();
        store.compute_atomic("k", &mut |_| Ok(Some(vec![7]))).unwrap();
        let err = store
            .compute_atomic("k", &mut |_| Err(CacheError::codec("boom")))
            .unwrap_err();
        assert!(matches!(err, CacheError::Codec(_)));
        assert_eq!(store.get("k").unwrap(), Some(vec![7]));
    }

    #[test]
    fn test_stats() {
        let store = InMemoryStore::new();
        store.compute_atomic("ab", &mut |_| Ok(Some(vec![0; 10]))).unwrap();
        store.compute_atomic("cd", &mut |_| Ok(Some(vec![0; 5]))).unwrap();
        store.get("ab").unwrap();
        assert!(store.delete("cd").unwrap());
        assert!(!store.delete("cd").unwrap());

        let stats = store.stats().unwrap();
        assert_eq!(stats.owned_entry_count, 1);
        assert_eq!(stats.memory_cost_bytes, 12);
        assert_eq!(stats.put_count, 2);
        assert_eq!(stats.get_count, 1);
        assert_eq!(store.keys().unwrap(), vec!["ab".to_string()]);
    }

    #[timeout(5000)]
    #[test]
    fn test_concurrent_compute_is_atomic() {
        let store = Arc::new(InMemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..500 {
                        store
                            .compute_atomic("counter", &mut |current| {
                                let n = current
                                    .map(|b| u64::from_le_bytes(b.try_into().unwrap()))
                                    .unwrap_or(0);
                                Ok(Some((n + 1).to_le_bytes().to_vec()))
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let bytes = store.get("counter").unwrap().unwrap();
        assert_eq!(u64::from_le_bytes(bytes.try_into().unwrap()), 4_000);
    }
}
