//! LRU cache of line linearizations.
//!
//! Linearizing a branchy line is the most expensive read in the kernel, and
//! export or display paths ask for the same lines repeatedly.
//!
//! ## Cache Key Design
//!
//! The key covers everything that determines the result:
//! - Edition id
//! - Line id
//! - Line fingerprint (any edit to the line changes it)
//!
//! A mutated line therefore misses and is linearized afresh. Stale entries
//! age out of the LRU.

use lru::LruCache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use xxhash_rust::xxh64::Xxh64;

use crate::linearizer::{LinearizeError, Linearizer, Sequence};
use crate::types::{EditionId, Line, LineFingerprint, LineId};

const FALLBACK_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

/// Configuration for the linearization cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached lines.
    pub max_entries: usize,
    /// Whether to enable the cache.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey(u64);

impl CacheKey {
    fn compute(edition: EditionId, line: LineId, fingerprint: &LineFingerprint) -> Self {
        let mut hasher = Xxh64::new(0);
        hasher.write(&edition.get().to_le_bytes());
        hasher.write(&line.get().to_le_bytes());
        hasher.write(fingerprint.as_str().as_bytes());
        Self(hasher.finish())
    }
}

/// Result of a cached linearization.
#[derive(Debug, Clone)]
pub struct CachedLinearization {
    /// Sequences of the line.
    pub sequences: Arc<Vec<Sequence>>,
    /// Whether the result came from the cache.
    pub cache_hit: bool,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Current number of entries.
    pub len: usize,
    /// Maximum capacity.
    pub cap: usize,
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that linearized.
    pub misses: u64,
}

/// Thread-safe LRU of linearizations.
#[derive(Debug)]
pub struct LinearizationCache {
    entries: Option<RwLock<LruCache<CacheKey, Arc<Vec<Sequence>>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LinearizationCache {
    /// Create a cache. A disabled cache linearizes on every call.
    pub fn new(config: &CacheConfig) -> Self {
        let entries = config.enabled.then(|| {
            let size = NonZeroUsize::new(config.max_entries).unwrap_or(FALLBACK_CAPACITY);
            RwLock::new(LruCache::new(size))
        });
        Self {
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Linearize `line`, serving from the cache when its fingerprint is known.
    pub fn linearize(
        &self,
        edition: EditionId,
        line: &Line,
        linearizer: &Linearizer<'_>,
    ) -> Result<CachedLinearization, LinearizeError> {
        let key = CacheKey::compute(edition, line.id, &line.fingerprint());

        if let Some(entries) = &self.entries {
            // peek under the read lock; recency is refreshed on insert only
            if let Some(sequences) = entries.read().peek(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(CachedLinearization {
                    sequences: Arc::clone(sequences),
                    cache_hit: true,
                });
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let sequences = Arc::new(linearizer.linearize(line)?);
        if let Some(entries) = &self.entries {
            entries.write().put(key, Arc::clone(&sequences));
        }
        tracing::trace!(edition = %edition, line = %line.id, sequences = sequences.len(), "linearization cached");
        Ok(CachedLinearization {
            sequences,
            cache_hit: false,
        })
    }

    /// Cache statistics, `None` if caching is disabled.
    pub fn stats(&self) -> Option<CacheStats> {
        self.entries.as_ref().map(|entries| {
            let entries = entries.read();
            CacheStats {
                len: entries.len(),
                cap: entries.cap().get(),
                hits: self.hits.load(Ordering::Relaxed),
                misses: self.misses.load(Ordering::Relaxed),
            }
        })
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.write().clear();
        }
    }
}

impl Default for LinearizationCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LineBuilder;
    use crate::types::AuthorId;
    use crate::vocabulary::AttributeVocabulary;

    #[test]
    fn test_hit_after_miss() {
        let vocab = AttributeVocabulary::default();
        let linearizer = Linearizer::new(&vocab);
        let line = LineBuilder::new(&vocab, AuthorId::new(1)).text("abc").build();
        let cache = LinearizationCache::default();

        let first = cache.linearize(EditionId::new(1), &line, &linearizer).unwrap();
        let second = cache.linearize(EditionId::new(1), &line, &linearizer).unwrap();

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(first.sequences, second.sequences);
        let stats = cache.stats().unwrap();
        assert_eq!((stats.len, stats.hits, stats.misses), (1, 1, 1));
    }

    #[test]
    fn test_edit_misses() {
        let vocab = AttributeVocabulary::default();
        let linearizer = Linearizer::new(&vocab);
        let line = LineBuilder::new(&vocab, AuthorId::new(1)).text("abc").build();
        let mut edited = line.clone();
        edited.signs[1].interpretations[0].data.character = "x".to_string();
        let cache = LinearizationCache::default();

        cache.linearize(EditionId::new(1), &line, &linearizer).unwrap();
        let result = cache.linearize(EditionId::new(1), &edited, &linearizer).unwrap();

        assert!(!result.cache_hit);
        assert_eq!(result.sequences[0].comparison, "xbc");
    }

    #[test]
    fn test_disabled_cache() {
        let vocab = AttributeVocabulary::default();
        let linearizer = Linearizer::new(&vocab);
        let line = LineBuilder::new(&vocab, AuthorId::new(1)).text("a").build();
        let cache = LinearizationCache::new(&CacheConfig { max_entries: 10, enabled: false });

        cache.linearize(EditionId::new(1), &line, &linearizer).unwrap();
        assert!(!cache.linearize(EditionId::new(1), &line, &linearizer).unwrap().cache_hit);
        assert!(cache.stats().is_none());
    }
}
