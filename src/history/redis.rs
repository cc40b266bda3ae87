use async_trait::async_trait;
use crate::history::{ BlobStore, PersistenceError };
use log::debug;
use redis::{ AsyncCommands, Client };
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Keeps the serialized log under a single Redis string key.
pub struct RedisBlobStore {
    client: Client,
}

impl RedisBlobStore {
    pub fn new(url: &str) -> Result<Self, PersistenceError> {
        Ok(Self {
            client: Client::open(url)?,
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, PersistenceError> {
        match tokio::time::timeout(CONNECT_TIMEOUT, self.client.get_multiplexed_async_connection()).await {
            Ok(conn) => Ok(conn?),
            Err(_) => Err(PersistenceError::Timeout(CONNECT_TIMEOUT)),
        }
    }
}

#[async_trait]
impl BlobStore for RedisBlobStore {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut conn = self.get_connection().await?;
        conn.set::<_, _, ()>(key, value).await?;
        debug!("Stored {} bytes under redis key '{}'", value.len(), key);
        Ok(())
    }
}
