use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Cached response entry
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub value: serde_json::Value,
    pub etag: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn is_fresh(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// In-memory response cache with TTL, owned by the serving layer and injected
/// into handlers. Entries carry an etag so conditional requests can 304.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CachedResponse>>,
    ttl_ms: i64,
}

impl ResponseCache {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl_ms: ttl_ms as i64,
        }
    }

    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.is_fresh() => Some(entry.clone()),
            Some(_) => {
                debug!("response cache stale: {}", key);
                None
            }
            None => None,
        }
    }

    pub async fn set(&self, key: &str, value: serde_json::Value) -> CachedResponse {
        let entry = CachedResponse {
            value,
            etag: format!("W/\"{}\"", Uuid::new_v4().simple()),
            expires_at: Utc::now() + Duration::milliseconds(self.ttl_ms),
        };
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry.clone());
        entry
    }

    pub async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(key);
    }

    pub async fn size(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }

    /// Drop expired entries
    pub async fn cleanup_expired(&self) {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_round_trip() {
        let cache = ResponseCache::new(5_000);

        cache.set("orders:1", serde_json::json!({"id": "1"})).await;
        let hit = cache.get("orders:1").await;
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().value["id"], "1");

        assert!(cache.get("orders:2").await.is_none());
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test]
    async fn test_expiry() {
        let cache = ResponseCache::new(50);

        cache.set("k", serde_json::json!(1)).await;
        assert!(cache.get("k").await.is_some());

        tokio::time::sleep(tokio::time::Duration::from_millis(80)).await;
        assert!(cache.get("k").await.is_none());

        cache.cleanup_expired().await;
        assert_eq!(cache.size().await, 0);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = ResponseCache::new(5_000);
        cache.set("k", serde_json::json!(1)).await;
        cache.invalidate("k").await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_etag_changes_per_set() {
        let cache = ResponseCache::new(5_000);
        let first = cache.set("k", serde_json::json!(1)).await;
        let second = cache.set("k", serde_json::json!(2)).await;
        assert_ne!(first.etag, second.etag);
    }
}
