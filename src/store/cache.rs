//! Reply cache keyed by prompt hash

use super::json_file::JsonFile;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// SHA-256 hex digest of the full prompt
pub fn cache_key(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}

/// A cached reply and when it was stored (unix seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub v: String,
    pub t: f64,
}

type CacheDoc = BTreeMap<String, CacheEntry>;

/// Reply cache; entries older than the TTL are ignored, never removed
#[derive(Debug)]
pub struct ResponseCache {
    file: JsonFile,
    ttl: Duration,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

impl ResponseCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            file: JsonFile::new(path),
            ttl,
        }
    }

    /// Fresh cached reply for `key`, if any
    pub async fn get(&self, key: &str) -> Option<String> {
        let doc: CacheDoc = self.file.read().await;
        let entry = doc.get(key)?;
        let age = now_secs() - entry.t;
        (age < self.ttl.as_secs_f64()).then(|| entry.v.clone())
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let entry = CacheEntry {
            v: value.to_string(),
            t: now_secs(),
        };
        self.file
            .update(|doc: &mut CacheDoc| {
                doc.insert(key.to_string(), entry);
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_key_is_sha256_hex() {
        let key = cache_key("abc");
        assert_eq!(
            key,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(cache_key("abc "), key);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path().join("ai_cache.json"), Duration::from_secs(3600));

        assert_eq!(cache.get("k").await, None);
        cache.set("k", "Palpitations are often benign.").await.unwrap();
        assert_eq!(
            cache.get("k").await.as_deref(),
            Some("Palpitations are often benign.")
        );
    }

    #[tokio::test]
    async fn test_stale_entries_are_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ai_cache.json");
        std::fs::write(
            &path,
            serde_json::json!({"old": {"v": "stale", "t": now_secs() - 7200.0}}).to_string(),
        )
        .unwrap();

        let cache = ResponseCache::new(&path, Duration::from_secs(3600));
        assert_eq!(cache.get("old").await, None);

        // Nothing is evicted
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("stale"));
    }
}
