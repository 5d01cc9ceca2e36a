//! Named cache buckets
//!
//! Each bucket maps a request URL to the stored response. Buckets are the
//! unit of versioning: one per asset generation plus the runtime bucket.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

/// A response held in a bucket
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(status: u16, content_type: Option<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
            stored_at: Utc::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

type Bucket = BTreeMap<String, CachedResponse>;

/// All buckets, keyed by name
#[derive(Debug, Default)]
pub struct CacheStorage {
    buckets: RwLock<BTreeMap<String, Bucket>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the bucket if missing
    pub async fn open(&self, name: &str) {
        self.buckets
            .write()
            .await
            .entry(name.to_string())
            .or_default();
    }

    pub async fn has(&self, name: &str) -> bool {
        self.buckets.read().await.contains_key(name)
    }

    pub async fn names(&self) -> Vec<String> {
        self.buckets.read().await.keys().cloned().collect()
    }

    /// Store an entry, creating the bucket on first use
    pub async fn put(&self, bucket: &str, key: &str, response: CachedResponse) {
        debug!(bucket, key, status = response.status, "Cache put");
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), response);
    }

    /// Store an entry, then evict the oldest entries of the bucket until at
    /// most `max_entries` remain
    ///
    /// Returns the evicted keys.
    pub async fn put_bounded(
        &self,
        bucket: &str,
        key: &str,
        response: CachedResponse,
        max_entries: usize,
    ) -> Vec<String> {
        let mut buckets = self.buckets.write().await;
        let target = buckets.entry(bucket.to_string()).or_default();
        target.insert(key.to_string(), response);

        let excess = target.len().saturating_sub(max_entries);
        if excess == 0 {
            return Vec::new();
        }

        let mut by_age: Vec<(DateTime<Utc>, String)> = target
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| (v.stored_at, k.clone()))
            .collect();
        by_age.sort();

        let evicted: Vec<String> = by_age.into_iter().take(excess).map(|(_, k)| k).collect();
        for k in &evicted {
            target.remove(k);
        }
        debug!(bucket, evicted = evicted.len(), "Cache evicted oldest entries");
        evicted
    }

    /// Store a batch atomically: all entries become visible together
    pub async fn put_all(&self, bucket: &str, entries: Vec<(String, CachedResponse)>) {
        let mut buckets = self.buckets.write().await;
        let target = buckets.entry(bucket.to_string()).or_default();
        target.extend(entries);
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Option<CachedResponse> {
        self.buckets
            .read()
            .await
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
    }

    /// First match across `buckets`, in the order given, with the name of
    /// the bucket it was found in
    pub async fn lookup(&self, buckets: &[&str], key: &str) -> Option<(String, CachedResponse)> {
        let all = self.buckets.read().await;
        buckets.iter().find_map(|name| {
            all.get(*name)
                .and_then(|b| b.get(key))
                .map(|hit| (name.to_string(), hit.clone()))
        })
    }

    pub async fn delete(&self, name: &str) -> bool {
        self.buckets.write().await.remove(name).is_some()
    }

    /// Delete every bucket not in `keep`; returns the deleted names
    pub async fn retain(&self, keep: &[&str]) -> Vec<String> {
        let mut buckets = self.buckets.write().await;
        let stale: Vec<String> = buckets
            .keys()
            .filter(|name| !keep.contains(&name.as_str()))
            .cloned()
            .collect();
        for name in &stale {
            buckets.remove(name);
        }
        stale
    }

    pub async fn clear(&self) -> usize {
        let mut buckets = self.buckets.write().await;
        let count = buckets.len();
        buckets.clear();
        count
    }

    pub async fn entry_count(&self, name: &str) -> usize {
        self.buckets
            .read()
            .await
            .get(name)
            .map(|b| b.len())
            .unwrap_or(0)
    }
}
