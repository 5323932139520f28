//! Scan result cache
//!
//! Results are keyed by content hash rather than storage key, so identical
//! bytes uploaded under different names share a verdict. Entries expire
//! after a TTL and are evicted lazily on lookup. The cache is a pure
//! optimization; correctness never depends on it.

use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::protocol::ScanVerdict;

/// SHA-256 content hash, hex encoded. Shared with upload deduplication.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

struct ScanCacheEntry {
    verdict: ScanVerdict,
    expires_at: Instant,
}

/// Bounded LRU cache of scan verdicts keyed by content hash.
///
/// Interior mutability via a `Mutex`; the lock is never held across an
/// await point, so concurrent scans on independent keys only contend for
/// the map itself.
pub struct ScanCache {
    entries: Mutex<LruCache<String, ScanCacheEntry>>,
    ttl: Duration,
}

impl ScanCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        ScanCache {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Look up a verdict, lazily evicting the entry if it has expired.
    pub fn get(&self, hash: &str) -> Option<ScanVerdict> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(hash) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.verdict.clone()),
            Some(_) => {
                entries.pop(hash);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, hash: String, verdict: ScanVerdict) {
        let entry = ScanCacheEntry {
            verdict,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(hash, entry);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable_hex() {
        let a = content_hash(b"same bytes");
        let b = content_hash(b"same bytes");
        let c = content_hash(b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = ScanCache::new(16, Duration::from_secs(60));
        let hash = content_hash(b"payload");
        assert!(cache.get(&hash).is_none());

        cache.insert(hash.clone(), ScanVerdict::infected("Eicar-Test-Signature"));
        let verdict = cache.get(&hash).unwrap();
        assert!(!verdict.clean);
        assert_eq!(verdict.threat.as_deref(), Some("Eicar-Test-Signature"));
    }

    #[test]
    fn test_expired_entries_evicted_on_lookup() {
        let cache = ScanCache::new(16, Duration::from_millis(0));
        let hash = content_hash(b"payload");
        cache.insert(hash.clone(), ScanVerdict::clean());

        assert!(cache.get(&hash).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_capacity_bound() {
        let cache = ScanCache::new(2, Duration::from_secs(60));
        cache.insert("a".to_string(), ScanVerdict::clean());
        cache.insert("b".to_string(), ScanVerdict::clean());
        cache.insert("c".to_string(), ScanVerdict::clean());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
    }
}
