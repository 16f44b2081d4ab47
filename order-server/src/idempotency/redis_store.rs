//! Redis-backed marker store, shared across instances

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{BoxError, IdempotencyStore};

const KEY_PREFIX: &str = "webhook:event:";

#[derive(Clone)]
pub struct RedisIdempotencyStore {
    conn: ConnectionManager,
}

impl RedisIdempotencyStore {
    pub async fn connect(url: &str) -> Result<Self, BoxError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn key(event_id: &str) -> String {
        format!("{KEY_PREFIX}{event_id}")
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn seen(&self, key: &str) -> Result<bool, BoxError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(Self::key(key)).await?;
        Ok(exists)
    }

    async fn mark(&self, key: &str, ttl: Duration) -> Result<(), BoxError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(Self::key(key), 1, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn try_mark(&self, key: &str, ttl: Duration) -> Result<bool, BoxError> {
        let mut conn = self.conn.clone();
        // SET NX EX replies OK when set, nil when the key already exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(Self::key(key))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn release(&self, key: &str) -> Result<(), BoxError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::key(key)).await?;
        Ok(())
    }
}
