//! The two-tier embedding cache.
//!
//! Hot tier: a sharded in-memory LRU, sized in entries, sharded by the
//! content hash so parallel sessions rarely contend on the same lock.
//! Cold tier: the redb-backed [`ColdStore`](crate::ColdStore).
//!
//! The cache is infallible from the pipeline's point of view: the first
//! disk error permanently (for this process) downgrades it to hot-only
//! mode, the degraded flag is surfaced through [`EmbeddingCache::degraded`],
//! and retrievals keep working.

use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use canonical::Digest160;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::store::ColdStore;

#[derive(Clone, PartialEq, Eq, Hash)]
struct HotKey {
    model_id: Arc<str>,
    content_hash: Digest160,
}

/// Content-addressed vector cache keyed by `(model_id, content_hash)`.
pub struct EmbeddingCache {
    shards: Vec<Mutex<LruCache<HotKey, Arc<Vec<f32>>>>>,
    cold: Option<ColdStore>,
    disk_ok: AtomicBool,
}

impl EmbeddingCache {
    /// Build from configuration, opening the cold tier when a path is set.
    ///
    /// A cold tier that cannot even be opened is not fatal: the cache
    /// starts degraded instead, mirroring the runtime disk-error policy.
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        config.validate()?;
        let per_shard = (config.hot_capacity / config.shards).max(1);
        let shards = (0..config.shards)
            .map(|_| {
                Mutex::new(LruCache::new(
                    NonZeroUsize::new(per_shard).unwrap_or(NonZeroUsize::MIN),
                ))
            })
            .collect();

        let (cold, disk_ok) = match &config.cold_path {
            Some(path) => match ColdStore::open(path, config.cold_row_budget) {
                Ok(store) => (Some(store), true),
                Err(e) => {
                    warn!(error = %e, "cold tier unavailable at startup, running hot-only");
                    (None, false)
                }
            },
            None => (None, true),
        };

        Ok(Self {
            shards,
            cold,
            disk_ok: AtomicBool::new(disk_ok),
        })
    }

    /// Hot-only cache for tests and ephemeral sessions.
    pub fn in_memory(hot_capacity: usize) -> Self {
        Self::new(&CacheConfig {
            hot_capacity,
            cold_path: None,
            ..Default::default()
        })
        .expect("in-memory cache config is valid")
    }

    /// Whether the cold tier has been lost to a disk error (or never opened).
    pub fn degraded(&self) -> bool {
        !self.disk_ok.load(Ordering::SeqCst)
    }

    /// Look up a batch of hashes; absent keys are simply omitted from the
    /// result map. Cold hits are promoted into the hot tier and touched.
    pub fn get_many(
        &self,
        model_id: &str,
        dim: usize,
        hashes: &[Digest160],
    ) -> HashMap<Digest160, Arc<Vec<f32>>> {
        let model: Arc<str> = Arc::from(model_id);
        let mut found = HashMap::new();
        let mut missing = Vec::new();

        for &hash in hashes {
            let key = HotKey {
                model_id: model.clone(),
                content_hash: hash,
            };
            let mut shard = self.shard(&hash);
            if let Some(vector) = shard.get(&key) {
                found.insert(hash, vector.clone());
            } else {
                missing.push(hash);
            }
        }

        if missing.is_empty() || !self.cold_available() {
            return found;
        }
        let Some(cold) = &self.cold else {
            return found;
        };

        match cold.get_many(model_id, dim, &missing) {
            Ok(rows) => {
                let hits: Vec<Digest160> = rows.keys().copied().collect();
                for (hash, vector) in rows {
                    let vector = Arc::new(vector);
                    self.shard(&hash).put(
                        HotKey {
                            model_id: model.clone(),
                            content_hash: hash,
                        },
                        vector.clone(),
                    );
                    found.insert(hash, vector);
                }
                if let Err(e) = cold.touch_many(model_id, dim, &hits, now_ns()) {
                    self.mark_degraded(&e);
                }
            }
            Err(e) => self.mark_degraded(&e),
        }
        found
    }

    /// Insert a batch of freshly computed vectors into both tiers. The cold
    /// write is one transaction; its failure degrades the cache but keeps
    /// the hot insertions.
    pub fn put_many(&self, model_id: &str, dim: usize, entries: Vec<(Digest160, Vec<f32>)>) {
        let model: Arc<str> = Arc::from(model_id);
        for (hash, vector) in &entries {
            self.shard(hash).put(
                HotKey {
                    model_id: model.clone(),
                    content_hash: *hash,
                },
                Arc::new(vector.clone()),
            );
        }
        if !self.cold_available() {
            return;
        }
        if let Some(cold) = &self.cold {
            if let Err(e) = cold.put_many(model_id, dim, &entries, now_ns()) {
                self.mark_degraded(&e);
            }
        }
    }

    /// Entries currently resident in the hot tier.
    pub fn hot_len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().map(|s| s.len()).unwrap_or(0))
            .sum()
    }

    fn cold_available(&self) -> bool {
        self.cold.is_some() && self.disk_ok.load(Ordering::SeqCst)
    }

    fn mark_degraded(&self, error: &CacheError) {
        if self.disk_ok.swap(false, Ordering::SeqCst) {
            warn!(error = %error, "cold tier disk error, cache degraded to hot-only");
        }
    }

    fn shard(&self, hash: &Digest160) -> std::sync::MutexGuard<'_, LruCache<HotKey, Arc<Vec<f32>>>> {
        let shard_index = fxhash::hash64(hash.as_bytes()) as usize % self.shards.len();
        self.shards[shard_index]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
