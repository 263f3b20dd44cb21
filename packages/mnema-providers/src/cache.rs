use std::{
	num::NonZeroUsize,
	time::{Duration, Instant},
};

use lru::LruCache;
use parking_lot::Mutex;

/// Counters exposed by [`EmbeddingCache::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
	pub hits: u64,
	pub misses: u64,
}
impl CacheStats {
	pub fn hit_rate(&self) -> f64 {
		let total = self.hits + self.misses;

		if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
	}
}

type CacheKey = [u8; 32];

struct CacheEntry {
	vector: Vec<f32>,
	expires_at: Instant,
}

struct CacheInner {
	entries: LruCache<CacheKey, CacheEntry>,
	hits: u64,
	misses: u64,
}

enum Lookup {
	Hit(Vec<f32>),
	Expired,
	Missing,
}

/// In-memory embedding cache keyed by a hash of (normalized text, model),
/// never the raw text, so memory stays bounded by entry count alone. Entries
/// expire after the configured TTL and the least recently used entry is
/// evicted once the size bound is hit. LruCache requires exclusive access
/// even for reads, so the whole structure sits behind one mutex.
pub struct EmbeddingCache {
	inner: Mutex<CacheInner>,
	ttl: Duration,
	enabled: bool,
}
impl EmbeddingCache {
	pub fn new(max_entries: usize, ttl: Duration, enabled: bool) -> Self {
		let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);

		Self {
			inner: Mutex::new(CacheInner { entries: LruCache::new(capacity), hits: 0, misses: 0 }),
			ttl,
			enabled,
		}
	}

	pub fn from_config(cfg: &mnema_config::Cache) -> Self {
		Self::new(cfg.max_entries, Duration::from_secs(cfg.ttl_secs), cfg.enabled)
	}

	pub fn get(&self, text: &str, model: &str) -> Option<Vec<f32>> {
		if !self.enabled {
			return None;
		}

		let key = cache_key(text, model);
		let now = Instant::now();
		let mut inner = self.inner.lock();
		let lookup = match inner.entries.get(&key) {
			Some(entry) if entry.expires_at > now => Lookup::Hit(entry.vector.clone()),
			Some(_) => Lookup::Expired,
			None => Lookup::Missing,
		};

		match lookup {
			Lookup::Hit(vector) => {
				inner.hits += 1;

				Some(vector)
			},
			Lookup::Expired => {
				inner.entries.pop(&key);
				inner.misses += 1;

				None
			},
			Lookup::Missing => {
				inner.misses += 1;

				None
			},
		}
	}

	pub fn put(&self, text: &str, model: &str, vector: Vec<f32>) {
		if !self.enabled {
			return;
		}

		let key = cache_key(text, model);
		let entry = CacheEntry { vector, expires_at: Instant::now() + self.ttl };

		self.inner.lock().entries.put(key, entry);
	}

	pub fn clear(&self) {
		let mut inner = self.inner.lock();

		inner.entries.clear();
		inner.hits = 0;
		inner.misses = 0;
	}

	pub fn stats(&self) -> CacheStats {
		let inner = self.inner.lock();

		CacheStats { hits: inner.hits, misses: inner.misses }
	}
}

fn cache_key(text: &str, model: &str) -> CacheKey {
	let mut hasher = blake3::Hasher::new();

	hasher.update(normalize_text(text).as_bytes());
	hasher.update(b"\0");
	hasher.update(model.as_bytes());

	*hasher.finalize().as_bytes()
}

fn normalize_text(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
	use super::*;

	const MODEL: &str = "test-model";

	fn far_ttl() -> Duration {
		Duration::from_secs(3_600)
	}

	#[test]
	fn repeated_lookups_hit_within_ttl() {
		let cache = EmbeddingCache::new(8, far_ttl(), true);

		cache.put("hello world", MODEL, vec![1.0, 2.0]);

		assert_eq!(cache.get("hello world", MODEL), Some(vec![1.0, 2.0]));
		assert_eq!(cache.get("hello   world", MODEL), Some(vec![1.0, 2.0]));

		let stats = cache.stats();

		assert_eq!(stats.hits, 2);
		assert_eq!(stats.misses, 0);
		assert_eq!(stats.hit_rate(), 1.0);
	}

	#[test]
	fn distinct_models_do_not_share_entries() {
		let cache = EmbeddingCache::new(8, far_ttl(), true);

		cache.put("hello", "model-a", vec![1.0]);

		assert!(cache.get("hello", "model-b").is_none());
	}

	#[test]
	fn third_insert_evicts_the_least_recently_used_pair() {
		let cache = EmbeddingCache::new(2, far_ttl(), true);

		cache.put("first", MODEL, vec![1.0]);
		cache.put("second", MODEL, vec![2.0]);

		// Touch "first" so "second" becomes the eviction candidate.
		assert!(cache.get("first", MODEL).is_some());

		cache.put("third", MODEL, vec![3.0]);

		assert!(cache.get("second", MODEL).is_none());
		assert!(cache.get("first", MODEL).is_some());
		assert!(cache.get("third", MODEL).is_some());
	}

	#[test]
	fn expired_entries_count_as_misses() {
		let cache = EmbeddingCache::new(8, Duration::ZERO, true);

		cache.put("stale", MODEL, vec![1.0]);

		assert!(cache.get("stale", MODEL).is_none());
		assert_eq!(cache.stats().misses, 1);
	}

	#[test]
	fn clear_resets_entries_and_counters() {
		let cache = EmbeddingCache::new(8, far_ttl(), true);

		cache.put("kept", MODEL, vec![1.0]);
		cache.get("kept", MODEL);
		cache.clear();

		assert!(cache.get("kept", MODEL).is_none());
		assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 1 });
	}

	#[test]
	fn disabled_cache_never_stores() {
		let cache = EmbeddingCache::new(8, far_ttl(), false);

		cache.put("ignored", MODEL, vec![1.0]);

		assert!(cache.get("ignored", MODEL).is_none());
		assert_eq!(cache.stats(), CacheStats::default());
	}
}
