use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// In-process cache for cleaned knowledge-page text. Entries are advisory:
/// losing one only costs a redundant fetch, so a single map behind one lock
/// with whole-value replacement is enough.
pub struct KnowledgeCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, KnowledgeCacheEntry>>,
}

#[derive(Debug, Clone)]
struct KnowledgeCacheEntry {
    source_key: String,
    content: String,
    fetched_at: Instant,
}

impl KnowledgeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached content for `key`, treating expired entries and
    /// entries whose stored key does not match exactly as misses. The stored
    /// key check defends against map-key collisions if key derivation ever
    /// changes.
    pub fn get(&self, key: &str, now: Instant) -> Option<String> {
        let mut entries = self.lock_entries();
        match entries.get(key) {
            Some(entry) if entry.source_key != key => None,
            Some(entry) if now.saturating_duration_since(entry.fetched_at) < self.ttl => {
                Some(entry.content.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Replaces the entry for `key` wholesale.
    pub fn put(&self, key: &str, content: String, now: Instant) {
        let mut entries = self.lock_entries();
        entries.insert(
            key.to_string(),
            KnowledgeCacheEntry {
                source_key: key.to_string(),
                content,
                fetched_at: now,
            },
        );
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, KnowledgeCacheEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
