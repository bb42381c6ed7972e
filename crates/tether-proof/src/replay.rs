//! At-most-once acceptance of (prover, request) pairs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tether_core::Timestamp;
use tracing::debug;

/// Minimum lifetime of a replay entry.
pub const DEFAULT_MIN_REPLAY_TTL_SECONDS: u64 = 300;

/// Replay key for a prover and a request hash.
pub fn replay_key(prover_id: &str, request_hash: &str) -> String {
    format!("{}:{}", prover_id, request_hash)
}

/// Entry lifetime: until the request expires, but never under `min_ttl`.
pub fn replay_ttl(now: Timestamp, request_expires_at: Timestamp, min_ttl: u64) -> u64 {
    now.seconds_until(&request_expires_at).max(min_ttl)
}

/// TTL-indexed set of accepted proof fingerprints.
///
/// An entry whose expiry is before the current time is dead: reads evict it
/// lazily and `cleanup` sweeps all of them. `check_and_insert` is the only
/// way the protocol engine writes, so two concurrent verifications of the
/// same proof cannot both observe "absent".
#[derive(Default)]
pub struct ReplayGuard {
    entries: Mutex<HashMap<String, Timestamp>>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Timestamp>> {
        // A panic while holding the lock cannot leave the map half-written
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn has(&self, key: &str) -> bool {
        self.has_at(key, Timestamp::now())
    }

    pub fn has_at(&self, key: &str, now: Timestamp) -> bool {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(expires_at) if *expires_at >= now => true,
            Some(_) => {
                entries.remove(key);
                false
            }
            None => false,
        }
    }

    pub fn add(&self, key: &str, ttl_seconds: u64) {
        self.add_at(key, ttl_seconds, Timestamp::now());
    }

    pub fn add_at(&self, key: &str, ttl_seconds: u64, now: Timestamp) {
        self.lock()
            .insert(key.to_string(), now.plus_seconds(ttl_seconds));
    }

    /// Insert `key` unless a live entry exists. Returns true if inserted.
    pub fn check_and_insert(&self, key: &str, ttl_seconds: u64) -> bool {
        self.check_and_insert_at(key, ttl_seconds, Timestamp::now())
    }

    pub fn check_and_insert_at(&self, key: &str, ttl_seconds: u64, now: Timestamp) -> bool {
        let mut entries = self.lock();
        if let Some(expires_at) = entries.get(key) {
            if *expires_at >= now {
                return false;
            }
        }
        entries.insert(key.to_string(), now.plus_seconds(ttl_seconds));
        true
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Timestamp::now())
    }

    pub fn cleanup_at(&self, now: Timestamp) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at >= now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "replay cache sweep");
        }
        removed
    }

    /// Number of stored entries, live or not yet swept.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const NOW: u64 = 1_700_000_000;

    fn ts(s: u64) -> Timestamp {
        Timestamp::from_seconds(s)
    }

    #[test]
    fn test_replay_key_format() {
        assert_eq!(replay_key("prover", "abc"), "prover:abc");
    }

    #[test]
    fn test_replay_ttl_floor() {
        assert_eq!(replay_ttl(ts(NOW), ts(NOW + 60), 300), 300);
        assert_eq!(replay_ttl(ts(NOW), ts(NOW + 900), 300), 900);
        assert_eq!(replay_ttl(ts(NOW), ts(NOW - 60), 300), 300);
    }

    #[test]
    fn test_add_has_expire() {
        let guard = ReplayGuard::new();
        guard.add_at("k", 300, ts(NOW));
        assert!(guard.has_at("k", ts(NOW + 300)));
        assert!(!guard.has_at("k", ts(NOW + 301)));
        // Lazy eviction on read
        assert_eq!(guard.size(), 0);
    }

    #[test]
    fn test_check_and_insert() {
        let guard = ReplayGuard::new();
        assert!(guard.check_and_insert_at("k", 300, ts(NOW)));
        assert!(!guard.check_and_insert_at("k", 300, ts(NOW + 10)));
        // Expired entry can be reinserted
        assert!(guard.check_and_insert_at("k", 300, ts(NOW + 301)));
    }

    #[test]
    fn test_cleanup() {
        let guard = ReplayGuard::new();
        guard.add_at("short", 10, ts(NOW));
        guard.add_at("long", 1000, ts(NOW));
        assert_eq!(guard.size(), 2);
        assert_eq!(guard.cleanup_at(ts(NOW + 11)), 1);
        assert_eq!(guard.size(), 1);
        assert!(guard.has_at("long", ts(NOW + 11)));
    }

    #[test]
    fn test_clear() {
        let guard = ReplayGuard::new();
        guard.add("a", 300);
        guard.add("b", 300);
        guard.clear();
        assert_eq!(guard.size(), 0);
        assert!(!guard.has("a"));
    }

    #[test]
    fn test_concurrent_check_and_insert_single_winner() {
        let guard = Arc::new(ReplayGuard::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = Arc::clone(&guard);
                std::thread::spawn(move || guard.check_and_insert("prover:hash", 300))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|inserted| *inserted)
            .count();
        assert_eq!(winners, 1);
    }
}
