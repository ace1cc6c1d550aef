//! Redis-protocol cache client (Redis, Dragonfly, Valkey, KeyDB).

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tokio::sync::RwLock;
use tracing::debug;

use super::store::{CacheError, KvCache};

pub struct RedisCache {
    /// `None` once `close` has released the connection.
    connection: RwLock<Option<ConnectionManager>>,
}

impl RedisCache {
    /// Open a managed connection to the server at `url` (`redis://host:port/db`).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(CacheError::backend)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(CacheError::unreachable)?;
        Ok(Self {
            connection: RwLock::new(Some(connection)),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        checkout(self.connection.read().await.as_ref())
    }
}

fn checkout(slot: Option<&ConnectionManager>) -> Result<ConnectionManager, CacheError> {
    slot.cloned()
        .ok_or_else(|| CacheError::unreachable("cache client is closed"))
}

#[async_trait]
impl KvCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(CacheError::backend)?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        // SETEX rejects zero; sub-second TTLs round up to one second.
        let seconds = ttl.as_secs().max(1);
        let () = conn
            .set_ex(key, value.as_ref(), seconds)
            .await
            .map_err(CacheError::backend)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::unreachable)?;
        if pong.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(CacheError::unreachable(format!(
                "unexpected PING reply `{pong}`"
            )))
        }
    }

    async fn close(&self) {
        if self.connection.write().await.take().is_some() {
            debug!("released cache connection");
        }
    }
}
