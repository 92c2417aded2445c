use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::{self, Instant};

use super::TtlStore;

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process TTL store.
///
/// Expiry is evaluated lazily on every read, the same way Redis treats an
/// expired key as absent. `evict_expired()` reclaims memory for keys that
/// are never read again. Uses tokio's clock, so tests can drive expiry with
/// `tokio::time::advance`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self, key: &str) -> Option<Entry> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.clone());
            }
            // expired; drop the ref before removing
            drop(entry);
            self.entries.remove_if(key, |_, e| e.is_expired(now));
        }
        None
    }

    /// Remove all expired entries. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TtlStore for MemoryStore {
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        let expires_at = ttl_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live(key).map(|entry| entry.value))
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>> {
        let Some(expires_at) = self.live(key).and_then(|entry| entry.expires_at) else {
            return Ok(None);
        };
        let remaining = expires_at.saturating_duration_since(Instant::now());
        Ok(Some(remaining.as_secs() as i64))
    }

    async fn set_keep_ttl(&self, key: &str, value: &str) -> Result<Option<i64>> {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: String::new(),
            expires_at: None,
        });
        if entry.is_expired(now) {
            entry.expires_at = None;
        }
        // The deadline itself is kept, not a re-derived TTL.
        entry.value = value.to_string();
        Ok(entry
            .expires_at
            .map(|at| at.saturating_duration_since(now).as_secs() as i64))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Spawn a background task that sweeps expired entries every `every`.
pub fn spawn_sweeper(store: MemoryStore, every: Duration) {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        loop {
            interval.tick().await;
            let evicted = store.evict_expired();
            if evicted > 0 {
                tracing::debug!(evicted, remaining = store.len(), "swept expired keys");
            }
        }
    });
}
