use async_trait::async_trait;
use crate::history::{ BlobStore, PersistenceError };
use std::collections::HashMap;
use std::sync::{ Arc, Mutex };

/// Process-local blob store. Clones share the same map, which lets a test
/// reopen a store over the same "disk".
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let blobs = self.blobs.lock().map_err(|_| PersistenceError::Poisoned)?;
        Ok(blobs.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut blobs = self.blobs.lock().map_err(|_| PersistenceError::Poisoned)?;
        blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
