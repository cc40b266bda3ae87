mod file;
mod memory;
mod redis;

pub use self::file::FileBlobStore;
pub use self::memory::MemoryBlobStore;
pub use self::redis::RedisBlobStore;

use async_trait::async_trait;
use crate::cli::Args;
use log::{ error, info };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("history file IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("history redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("history JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("history backend did not answer within {0:?}")]
    Timeout(Duration),
    #[error("history store lock poisoned")]
    Poisoned,
}

/// Durable key/value blob storage backing the conversation log.
///
/// Callers hold the store's write lock across `write` so a save never
/// interleaves with another append.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

fn unsupported_history_type(history_type: &str) -> Box<dyn Error + Send + Sync> {
    Box::new(
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Unsupported history store type: {}", history_type)
        )
    )
}

pub fn create_blob_store(
    args: &Args
) -> Result<Arc<dyn BlobStore>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "file" => {
            let store = FileBlobStore::new(&args.history_path)?;
            Ok(Arc::new(store))
        }
        "redis" => {
            let store = RedisBlobStore::new(&args.history_host)?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryBlobStore::new())),
        _ => Err(unsupported_history_type(&args.history_type)),
    }
}

/// Opens the configured backend. An unknown backend type is a configuration
/// error; a known backend that cannot be opened degrades to in-memory history.
pub fn initialize_blob_store(
    args: &Args
) -> Result<Arc<dyn BlobStore>, Box<dyn Error + Send + Sync>> {
    let location = match args.history_type.to_lowercase().as_str() {
        "file" => args.history_path.as_str(),
        "redis" => args.history_host.as_str(),
        "memory" => "process memory",
        _ => {
            return Err(unsupported_history_type(&args.history_type));
        }
    };
    info!(
        "Chat history will be stored in: {} at {} (key '{}')",
        args.history_type,
        location,
        args.history_key
    );

    match create_blob_store(args) {
        Ok(store) => Ok(store),
        Err(e) => {
            error!(
                "Failed to open {} history store at {}: {}. Falling back to in-memory history.",
                args.history_type,
                location,
                e
            );
            Ok(Arc::new(MemoryBlobStore::new()))
        }
    }
}
