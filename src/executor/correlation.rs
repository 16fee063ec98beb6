//! Stream Correlation Table (spec §4.4): a bounded, TTL-pruned map from
//! `chat_request_id` to the moment the streamer finished emitting
//! segments for it. A later `SAY` effect carrying that id can then skip
//! re-speaking text the kiosk already heard streamed.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

pub const DEFAULT_CAPACITY: usize = 64;
pub const DEFAULT_TTL_MS: i64 = 5 * 60 * 1000;

pub struct StreamCorrelationTable {
    inner: Mutex<LruCache<String, i64>>,
    ttl_ms: i64,
}

impl Default for StreamCorrelationTable {
    fn default() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_CAPACITY, DEFAULT_TTL_MS)
    }
}

impl StreamCorrelationTable {
    pub fn with_capacity_and_ttl(capacity: usize, ttl_ms: i64) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(NonZeroUsize::new(capacity).expect("capacity must be non-zero"))),
            ttl_ms,
        }
    }

    /// Record that `chat_request_id` finished streaming at `now_ms`.
    pub fn set(&self, chat_request_id: &str, now_ms: i64) {
        self.inner.lock().unwrap().put(chat_request_id.to_string(), now_ms);
    }

    /// Remove the entry, returning true only if it was present and not
    /// past its TTL. An expired entry is treated as absent either way.
    pub fn delete(&self, chat_request_id: &str, now_ms: i64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.pop(chat_request_id) {
            Some(recorded_at_ms) => now_ms - recorded_at_ms < self.ttl_ms,
            None => false,
        }
    }

    /// Evict expired entries. Cheap enough to call on every read.
    pub fn prune(&self, now_ms: i64) {
        let mut inner = self.inner.lock().unwrap();
        let expired: Vec<String> = inner
            .iter()
            .filter(|(_, recorded_at_ms)| now_ms - **recorded_at_ms >= self.ttl_ms)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            inner.pop(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_returns_true_for_present_unexpired_entry() {
        let table = StreamCorrelationTable::with_capacity_and_ttl(4, 1000);
        table.set("chat-1", 0);
        assert!(table.delete("chat-1", 500));
    }

    #[test]
    fn delete_returns_false_for_expired_entry() {
        let table = StreamCorrelationTable::with_capacity_and_ttl(4, 1000);
        table.set("chat-1", 0);
        assert!(!table.delete("chat-1", 1000));
    }

    #[test]
    fn delete_returns_false_for_unknown_id() {
        let table = StreamCorrelationTable::with_capacity_and_ttl(4, 1000);
        assert!(!table.delete("chat-missing", 0));
    }

    #[test]
    fn delete_is_idempotent_after_first_removal() {
        let table = StreamCorrelationTable::with_capacity_and_ttl(4, 1000);
        table.set("chat-1", 0);
        assert!(table.delete("chat-1", 10));
        assert!(!table.delete("chat-1", 20));
    }

    #[test]
    fn capacity_evicts_least_recently_used_entry() {
        let table = StreamCorrelationTable::with_capacity_and_ttl(2, 10_000);
        table.set("chat-1", 0);
        table.set("chat-2", 0);
        table.set("chat-3", 0);
        assert!(!table.delete("chat-1", 0));
        assert!(table.delete("chat-2", 0));
        assert!(table.delete("chat-3", 0));
    }

    #[test]
    fn prune_drops_only_expired_entries() {
        let table = StreamCorrelationTable::with_capacity_and_ttl(4, 100);
        table.set("old", 0);
        table.set("fresh", 90);
        table.prune(100);
        assert!(!table.delete("old", 100));
        assert!(table.delete("fresh", 100));
    }
}
