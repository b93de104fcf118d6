//! Content-addressed cache of read results.
//!
//! Keys are statement fingerprints (see
//! [`TranslationResult::fingerprint`](crate::translate::TranslationResult::fingerprint)).
//! Entries expire after an absolute TTL. Writes never invalidate entries;
//! callers that need fresh reads after an update call [`QueryCache::remove`]
//! or [`QueryCache::clear`].

use crate::connection::RowSet;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Storage for cached read results, shared by every mapper of a context.
pub trait QueryCache: Send + Sync {
    fn get(&self, key: &str) -> Option<RowSet>;

    fn set(&self, key: String, rows: RowSet, ttl: Duration);

    fn remove(&self, key: &str) -> Option<RowSet>;

    fn clear(&self);
}

#[derive(Debug)]
struct Entry {
    rows: RowSet,
    expires_at: Instant,
}

/// In-process [`QueryCache`] guarded by a mutex. Expired entries are
/// dropped lazily on lookup and when new entries are stored.
#[derive(Debug, Default)]
pub struct MemoryQueryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl QueryCache for MemoryQueryCache {
    fn get(&self, key: &str) -> Option<RowSet> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.rows.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: String, rows: RowSet, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key,
            Entry {
                rows,
                expires_at: now + ttl,
            },
        );
    }

    fn remove(&self, key: &str) -> Option<RowSet> {
        self.lock().remove(key).map(|e| e.rows)
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::sync::Arc;

    fn rows(n: i64) -> RowSet {
        RowSet {
            columns: vec!["n".into()],
            rows: vec![vec![Value::Int(n)]],
        }
    }

    #[test]
    fn hit_and_miss() {
        let cache = MemoryQueryCache::new();
        assert!(cache.get("k").is_none());
        cache.set("k".into(), rows(1), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(rows(1)));
        assert_eq!(cache.remove("k"), Some(rows(1)));
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = MemoryQueryCache::new();
        cache.set("k".into(), rows(1), Duration::ZERO);
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn concurrent_access() {
        let cache = Arc::new(MemoryQueryCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let key = format!("k{}", i % 4);
                    cache.set(key.clone(), rows(i), Duration::from_secs(60));
                    cache.get(&key).is_some()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cache.len(), 4);
        cache.clear();
        assert!(cache.is_empty());
    }
}
