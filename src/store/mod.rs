//! TTL key-value stores.
//!
//! Barcodes live entirely in a store with native per-key expiry. The
//! lifecycle code only needs three primitives (`set`, `get`, `ttl`); the two
//! composite operations have default implementations built from those and
//! may be overridden by stores that can perform them atomically.
//!
//! ## Stores
//!
//! - **redis** - production store, one `ConnectionManager` shared by all requests
//! - **memory** - in-process store for tests and `serve --memory`

mod memory;
mod redis;

pub use self::memory::{spawn_sweeper, MemoryStore};
pub use self::redis::RedisStore;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Write `value` under `key`. `None` means the key never expires.
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remaining lifetime in whole seconds, rounded down.
    /// `None` when the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<i64>>;

    /// Readiness probe.
    async fn ping(&self) -> Result<()>;

    /// Write several keys sharing one TTL.
    ///
    /// The default issues one `set` per entry; a failure part-way leaves the
    /// earlier entries written.
    async fn set_many(&self, entries: &[(String, String)], ttl_secs: u64) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value, Some(ttl_secs)).await?;
        }
        Ok(())
    }

    /// Overwrite the value of `key`, keeping whatever TTL it had. The
    /// expiry must never move later. Keys that are absent or have no
    /// remaining TTL are written without expiry. Returns the whole seconds
    /// left on the kept TTL, or `None` when the value was written without one.
    ///
    /// The default is a read followed by a write: the key can expire, or be
    /// rewritten by another caller, in between. It only sees whole seconds,
    /// so a key with less than a second left is written without expiry.
    async fn set_keep_ttl(&self, key: &str, value: &str) -> Result<Option<i64>> {
        match self.ttl(key).await? {
            Some(secs) if secs > 0 => {
                self.set(key, value, Some(secs as u64)).await?;
                Ok(Some(secs))
            }
            _ => {
                self.set(key, value, None).await?;
                Ok(None)
            }
        }
    }
}
