use async_trait::async_trait;
use crate::history::{ BlobStore, PersistenceError };
use log::debug;
use std::io::ErrorKind;
use std::path::{ Path, PathBuf };
use tokio::fs;

/// Stores each key as `<dir>/<key>.json`.
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Creates the directory up front; runs once at startup.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();
        assert!(store.read("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path().join("nested")).unwrap();
        store.write("history", "[]").await.unwrap();
        store.write("history", "[1]").await.unwrap();
        assert_eq!(store.read("history").await.unwrap().as_deref(), Some("[1]"));
        assert!(dir.path().join("nested").join("history.json").exists());
    }

    #[test]
    fn unusable_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        assert!(FileBlobStore::new(blocker.join("sub")).is_err());
    }
}
