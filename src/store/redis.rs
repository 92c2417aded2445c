use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::TtlStore;

/// Rewrites a key's value server-side while keeping its TTL, so a
/// concurrent expiry cannot slip between the read and the write.
/// KEYS[1] = key, ARGV[1] = new value. Returns the PTTL seen before the write.
const SET_KEEP_TTL_SCRIPT: &str = r#"
    local ttl = redis.call("PTTL", KEYS[1])
    if ttl > 0 then
        redis.call("SET", KEYS[1], ARGV[1], "PX", ttl)
    else
        redis.call("SET", KEYS[1], ARGV[1])
    end
    return ttl
"#;

/// Redis-backed store. Cloning is cheap; all clones share one
/// auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisStore {
    redis: ConnectionManager,
}

impl RedisStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid REDIS_URL")?;
        let redis = ConnectionManager::new(client)
            .await
            .context("failed to connect to Redis")?;
        Ok(Self::new(redis))
    }
}

#[async_trait]
impl TtlStore for RedisStore {
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        let mut conn = self.redis.clone();
        match ttl_secs {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.redis.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.redis.clone();
        // -2: no such key, -1: no expiry
        let millis: i64 = conn.pttl(key).await?;
        Ok((millis >= 0).then(|| millis / 1000))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    async fn set_many(&self, entries: &[(String, String)], ttl_secs: u64) -> Result<()> {
        let mut conn = self.redis.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.set_ex(key, value, ttl_secs).ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn set_keep_ttl(&self, key: &str, value: &str) -> Result<Option<i64>> {
        let mut conn = self.redis.clone();
        let script = redis::Script::new(SET_KEEP_TTL_SCRIPT);
        let pttl: i64 = script.key(key).arg(value).invoke_async(&mut conn).await?;
        // Any positive PTTL is kept, including under a second; the default
        // trait path writes those without expiry instead.
        Ok((pttl > 0).then(|| pttl / 1000))
    }
}
