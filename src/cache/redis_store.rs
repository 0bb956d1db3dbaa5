//! Shared cache on a Redis server.
//!
//! Each [`CacheStore::connect`] opens its own multiplexed connection, which
//! is dropped again on close.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};

use super::{CacheConnection, CacheError, CacheStore};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    /// Parses `url` without touching the network.
    pub fn open(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(connection_error)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn connect(&self) -> Result<Box<dyn CacheConnection>, CacheError> {
        let conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::Connection("timed out connecting to redis".to_string()))?
        .map_err(connection_error)?;
        Ok(Box::new(RedisConnection { conn }))
    }
}

struct RedisConnection {
    conn: MultiplexedConnection,
}

#[async_trait]
impl CacheConnection for RedisConnection {
    async fn get(&mut self, key: &str) -> Result<Option<String>, CacheError> {
        self.conn
            .get::<_, Option<String>>(key)
            .await
            .map_err(command_error)
    }

    async fn set_ex(&mut self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let secs = ttl.as_secs();
        if secs == 0 {
            return Err(CacheError::Command("ttl must be at least one second".to_string()));
        }
        self.conn
            .set_ex::<_, _, ()>(key, value, secs)
            .await
            .map_err(command_error)
    }

    async fn close(self: Box<Self>) -> Result<(), CacheError> {
        Ok(())
    }
}

fn connection_error(err: RedisError) -> CacheError {
    CacheError::Connection(err.to_string())
}

fn command_error(err: RedisError) -> CacheError {
    CacheError::Command(err.to_string())
}
