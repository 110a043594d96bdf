//! Content-addressed result cache
//!
//! Keyed by `(image fingerprint, profile id)` so the same bytes processed
//! under two profiles never share a result. Expiry is checked lazily on
//! lookup; there is no background sweeper and no capacity bound (memory-only,
//! lost on restart by design).

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::clock::Clock;

/// Validated generation output: field name → value
pub type Metadata = BTreeMap<String, String>;

/// SHA-256 hex digest of the raw image bytes, independent of filename
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[derive(Clone)]
struct CacheEntry {
    metadata: Metadata,
    created: Instant,
}

pub struct ContentCache {
    entries: DashMap<(String, String), CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ContentCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Return the cached metadata if present and fresh; expired entries are
    /// evicted on the way out.
    pub fn lookup(&self, fingerprint: &str, profile_id: &str) -> Option<Metadata> {
        let key = (fingerprint.to_string(), profile_id.to_string());

        let fresh = match self.entries.get(&key) {
            Some(entry) => {
                if self.clock.now().duration_since(entry.created) < self.ttl {
                    return Some(entry.metadata.clone());
                }
                false
            }
            None => return None,
        };

        if !fresh {
            self.entries.remove(&key);
            debug!(fingerprint, profile_id, "Evicted expired cache entry");
        }
        None
    }

    /// Insert or atomically replace the entry for this key
    pub fn store(&self, fingerprint: &str, profile_id: &str, metadata: Metadata) {
        let key = (fingerprint.to_string(), profile_id.to_string());
        self.entries.insert(
            key,
            CacheEntry {
                metadata,
                created: self.clock.now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn sample_metadata() -> Metadata {
        [
            ("title".to_string(), "Red Fox".to_string()),
            ("tags".to_string(), "fox,red,animal".to_string()),
        ]
        .into()
    }

    #[test]
    fn fingerprint_is_stable_and_content_addressed() {
        let a = fingerprint(b"image bytes");
        let b = fingerprint(b"image bytes");
        let c = fingerprint(b"other bytes");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn lookup_hits_within_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = ContentCache::new(Duration::from_secs(3600), clock.clone());

        cache.store("fp", "default", sample_metadata());
        clock.advance(Duration::from_secs(3599));

        assert_eq!(cache.lookup("fp", "default"), Some(sample_metadata()));
    }

    #[test]
    fn lookup_evicts_after_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = ContentCache::new(Duration::from_secs(3600), clock.clone());

        cache.store("fp", "default", sample_metadata());
        clock.advance(Duration::from_secs(3600));

        assert_eq!(cache.lookup("fp", "default"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn profile_id_is_part_of_the_key() {
        let clock = Arc::new(ManualClock::new());
        let cache = ContentCache::new(Duration::from_secs(3600), clock);

        cache.store("fp", "default", sample_metadata());

        assert!(cache.lookup("fp", "other-profile").is_none());
        assert!(cache.lookup("fp", "default").is_some());
    }

    #[test]
    fn store_replaces_existing_entry() {
        let clock = Arc::new(ManualClock::new());
        let cache = ContentCache::new(Duration::from_secs(3600), clock);

        cache.store("fp", "default", sample_metadata());

        let mut updated = sample_metadata();
        updated.insert("title".to_string(), "Gray Wolf".to_string());
        cache.store("fp", "default", updated.clone());

        assert_eq!(cache.lookup("fp", "default"), Some(updated));
        assert_eq!(cache.len(), 1);
    }
}
