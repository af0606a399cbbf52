use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{Result, StoreError};

/// Shared key-value store used for cross-process coordination: dedup keys,
/// rate-limit counters, download-key mappings and status markers.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set `key`, replacing any previous value and TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Set `key` only if it is absent. Returns whether the value was written.
    async fn set_nx(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool>;

    /// Returns whether a key was removed.
    async fn del(&self, key: &str) -> Result<bool>;

    /// Atomically add `delta`, treating an absent key as 0. The TTL of an
    /// existing key is kept.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    async fn incr(&self, key: &str) -> Result<i64> { self.incr_by(key, 1).await }

    /// Returns whether the key existed.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct Entry {
    value:      String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool { self.expires_at.is_none_or(|at| at > now) }
}

/// Process-local [`KvStore`]. Expired keys are dropped lazily on access.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKvStore {
    pub fn new() -> Self { Self::default() }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock();
        Ok(Self::live(&mut entries, key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), Entry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        let mut entries = self.entries.lock();
        if Self::live(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(key.to_string(), Entry::new(value.to_string(), ttl));
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock();
        Ok(Self::live(&mut entries, key).is_some() && entries.remove(key).is_some())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut entries = self.entries.lock();
        match Self::live(&mut entries, key) {
            Some(entry) => {
                let current: i64 = entry.value.parse().map_err(|_| StoreError::NotAnInteger {
                    key: key.to_string(),
                })?;
                let next = current.saturating_add(delta);
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                entries.insert(key.to_string(), Entry::new(delta.to_string(), None));
                Ok(delta)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock();
        match Self::live(&mut entries, key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_nx_only_once() {
        let kv = MemoryKvStore::new();
        assert!(kv.set_nx("lock", "1", None).await.unwrap());
        assert!(!kv.set_nx("lock", "2", None).await.unwrap());
        assert_eq!(kv.get("lock").await.unwrap().as_deref(), Some("1"));
        assert!(kv.del("lock").await.unwrap());
        assert!(!kv.del("lock").await.unwrap());
        assert!(kv.set_nx("lock", "3", None).await.unwrap());
    }

    #[tokio::test]
    async fn ttl_expires_keys() {
        let kv = MemoryKvStore::new();
        kv.set("short", "v", Some(Duration::from_millis(20))).await.unwrap();
        kv.set("long", "v", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(kv.get("short").await.unwrap(), None);
        assert!(kv.set_nx("short", "again", None).await.unwrap());
        assert_eq!(kv.len(), 2);
    }

    #[tokio::test]
    async fn incr_keeps_ttl_and_rejects_text() {
        let kv = MemoryKvStore::new();
        assert_eq!(kv.incr("hits").await.unwrap(), 1);
        assert!(kv.expire("hits", Duration::from_millis(20)).await.unwrap());
        assert_eq!(kv.incr_by("hits", 4).await.unwrap(), 5);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(kv.incr("hits").await.unwrap(), 1);

        kv.set("name", "abc", None).await.unwrap();
        assert!(matches!(
            kv.incr("name").await,
            Err(StoreError::NotAnInteger { .. })
        ));
        assert!(!kv.expire("missing", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn purge_drops_expired() {
        let kv = MemoryKvStore::new();
        kv.set("a", "1", Some(Duration::from_millis(1))).await.unwrap();
        kv.set("b", "1", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(kv.purge_expired(), 1);
        assert!(!kv.is_empty());
    }
}
