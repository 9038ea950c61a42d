//! Two-tier content cache: an in-memory tier evicted by lowest hit-count,
//! and an optional durable tier persisted as one JSON file per key with
//! atomic temp-file-then-rename writes.
//!
//! Grounded on `original_source/crawl-service/utils/cache.py`'s
//! `CacheManager`: same key shape (`cache_type:identifier[:param_hash]`),
//! same "expiry reads as a miss, entry is then evicted" rule, same
//! memory-promotion-on-durable-hit behavior.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::digest::cache_param_hash;

/// Per spec.md §3's `CacheEntry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hit_count: u64,
}

impl CacheEntry {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Builds `cache_type ":" identifier [":" param_hash]`, per spec.md §3.
/// `params`, when present, should be a canonical (stably-ordered) JSON
/// encoding of the request parameters that scope the cached value.
pub fn cache_key(cache_type: &str, identifier: &str, params: Option<&str>) -> String {
    match params {
        Some(p) if !p.is_empty() => {
            format!("{cache_type}:{identifier}:{}", cache_param_hash(p))
        }
        _ => format!("{cache_type}:{identifier}"),
    }
}

struct MemoryTier {
    capacity: usize,
    entries: HashMap<String, CacheEntry>,
}

impl MemoryTier {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
        }
    }

    fn get(&mut self, key: &str) -> Option<CacheEntry> {
        let now = Utc::now();
        let expired = match self.entries.get(key) {
            Some(e) => e.is_expired_at(now),
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        let entry = self.entries.get_mut(key).expect("checked above");
        entry.hit_count += 1;
        Some(entry.clone())
    }

    fn insert(&mut self, mut entry: CacheEntry) {
        if !self.entries.contains_key(&entry.key) && self.entries.len() >= self.capacity {
            self.evict_lowest_hit_count();
        }
        // A re-insert (write refreshing an existing key) keeps the existing
        // hit-count rather than resetting accumulated popularity.
        if let Some(existing) = self.entries.get(&entry.key) {
            entry.hit_count = existing.hit_count;
        }
        self.entries.insert(entry.key.clone(), entry);
    }

    fn evict_lowest_hit_count(&mut self) {
        if let Some(victim) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.hit_count)
            .map(|(k, _)| k.clone())
        {
            self.entries.remove(&victim);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Durable, filesystem-backed tier. One file per key under `dir`, named by
/// the key's hex-encoded SHA-256 digest to avoid filesystem-unsafe
/// characters. Cross-process writers coordinate via an `fs2` advisory lock
/// on a sibling `.lock` file, the way the teacher's checkpointer crates
/// guard shared on-disk state.
pub struct DurableTier {
    dir: PathBuf,
}

impl DurableTier {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let name = hex::encode(hasher.finalize());
        self.dir.join(format!("{name}.json"))
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(".cache.lock")
    }

    /// Reads and bumps `hit_count`, writing the incremented entry back
    /// before returning it, per spec.md §4.1 ("on durable hit... the
    /// durable hit-count is incremented").
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let path = self.path_for(key);
        let raw = tokio::fs::read(&path).await.ok()?;
        let mut entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(e) => e,
            Err(_) => {
                // A missing or partial file is treated as a miss, per spec.md §5.
                let _ = tokio::fs::remove_file(&path).await;
                return None;
            }
        };
        if entry.is_expired_at(Utc::now()) {
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }
        entry.hit_count += 1;
        if let Err(err) = self.put(&entry).await {
            tracing::warn!(key = %key, error = %err, "durable cache hit-count write-back failed");
        }
        Some(entry)
    }

    pub async fn put(&self, entry: &CacheEntry) -> std::io::Result<()> {
        let dir = self.dir.clone();
        let lock_path = self.lock_path();
        let final_path = self.path_for(&entry.key);
        let body = serde_json::to_vec_pretty(entry)?;

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let lock_file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .open(&lock_path)?;
            lock_file.lock_exclusive()?;

            let tmp_path = tmp_path_in(&dir);
            std::fs::write(&tmp_path, &body)?;
            std::fs::rename(&tmp_path, &final_path)?;

            FileExt::unlock(&lock_file)?;
            Ok(())
        })
        .await
        .expect("durable cache write task panicked")
    }
}

fn tmp_path_in(dir: &Path) -> PathBuf {
    let suffix: u64 = rand::random();
    dir.join(format!(".tmp-{suffix:x}"))
}

/// The two-tier cache facade collectors and the substrate consult before
/// any external fetch and populate after each successful one.
pub struct Cache {
    memory: Mutex<MemoryTier>,
    durable: Option<DurableTier>,
}

impl Cache {
    pub fn new(memory_capacity: usize, durable: Option<DurableTier>) -> Self {
        Self {
            memory: Mutex::new(MemoryTier::new(memory_capacity)),
            durable,
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(entry) = self.memory.lock().get(key) {
            return Some(entry.payload);
        }
        let durable = self.durable.as_ref()?;
        let entry = durable.get(key).await?;
        self.memory.lock().insert(entry.clone());
        Some(entry.payload)
    }

    pub async fn put(&self, key: &str, payload: Value, ttl: Duration) {
        let now = Utc::now();
        let entry = CacheEntry {
            key: key.to_string(),
            payload,
            created_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
            hit_count: 0,
        };
        self.memory.lock().insert(entry.clone());
        if let Some(durable) = &self.durable {
            if let Err(err) = durable.put(&entry).await {
                tracing::warn!(key = %key, error = %err, "durable cache write failed");
            }
        }
    }

    /// Current in-memory entry count, for diagnostics/tests.
    pub fn memory_len(&self) -> usize {
        self.memory.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, hit_count: u64) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            key: key.to_string(),
            payload: serde_json::json!({"k": key}),
            created_at: now,
            expires_at: now + chrono::Duration::seconds(60),
            hit_count,
        }
    }

    #[test]
    fn cache_key_includes_param_hash_only_when_present() {
        assert_eq!(cache_key("reviews", "app1", None), "reviews:app1");
        let with_params = cache_key("reviews", "app1", Some(r#"{"country":"us"}"#));
        assert!(with_params.starts_with("reviews:app1:"));
        assert_eq!(with_params.len(), "reviews:app1:".len() + 8);
    }

    #[test]
    fn memory_tier_evicts_lowest_hit_count_over_capacity() {
        let mut tier = MemoryTier::new(2);
        tier.insert(entry("a", 5));
        tier.insert(entry("b", 1));
        tier.insert(entry("c", 10));
        assert_eq!(tier.len(), 2);
        assert!(!tier.entries.contains_key("b"));
    }

    #[test]
    fn memory_tier_get_increments_hit_count() {
        let mut tier = MemoryTier::new(10);
        tier.insert(entry("a", 0));
        let got = tier.get("a").unwrap();
        assert_eq!(got.hit_count, 1);
    }

    #[test]
    fn memory_tier_expired_entry_reads_as_miss_and_is_evicted() {
        let mut tier = MemoryTier::new(10);
        let mut e = entry("a", 3);
        e.expires_at = Utc::now() - chrono::Duration::seconds(1);
        tier.insert(e);
        assert!(tier.get("a").is_none());
        assert_eq!(tier.len(), 0);
    }

    #[tokio::test]
    async fn durable_tier_round_trips_through_temp_file_rename() {
        let dir = tempfile::tempdir().unwrap();
        let durable = DurableTier::new(dir.path()).unwrap();
        let e = entry("round-trip", 0);
        durable.put(&e).await.unwrap();
        let got = durable.get("round-trip").await.unwrap();
        assert_eq!(got.payload, e.payload);
    }

    #[tokio::test]
    async fn durable_tier_get_increments_and_persists_hit_count() {
        let dir = tempfile::tempdir().unwrap();
        let durable = DurableTier::new(dir.path()).unwrap();
        let e = entry("k", 0);
        durable.put(&e).await.unwrap();

        let first = durable.get("k").await.unwrap();
        assert_eq!(first.hit_count, 1);
        let second = durable.get("k").await.unwrap();
        assert_eq!(second.hit_count, 2);
    }

    #[tokio::test]
    async fn durable_tier_expired_entry_is_deleted_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let durable = DurableTier::new(dir.path()).unwrap();
        let mut e = entry("stale", 0);
        e.expires_at = Utc::now() - chrono::Duration::seconds(1);
        durable.put(&e).await.unwrap();
        assert!(durable.get("stale").await.is_none());
        assert!(durable.get("stale").await.is_none());
    }

    #[tokio::test]
    async fn facade_promotes_durable_hit_into_memory() {
        let dir = tempfile::tempdir().unwrap();
        let durable = DurableTier::new(dir.path()).unwrap();
        let cache = Cache::new(10, Some(durable));
        cache
            .put("k", serde_json::json!({"v": 1}), Duration::from_secs(60))
            .await;

        // A fresh cache pointed at the same directory starts with an empty
        // memory tier but should promote from disk on first read.
        let durable2 = DurableTier::new(dir.path()).unwrap();
        let cache2 = Cache::new(10, Some(durable2));
        assert_eq!(cache2.memory_len(), 0);
        let got = cache2.get("k").await;
        assert!(got.is_some());
        assert_eq!(cache2.memory_len(), 1);
    }
}
