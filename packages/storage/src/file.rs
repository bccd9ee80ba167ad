//! [`KeyValueStore`] that keeps one JSON file per key in a directory.
//!
//! Writes go to a uniquely named temporary sibling file first and are then
//! renamed over the target, so a crash mid-write never leaves a truncated
//! record and concurrent writers to one key never share a temp file.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::{KeyValueStore, StorageError, paths, validate_key};

const EXTENSION: &str = "json";

/// A directory of `<key>.json` files.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        paths::ensure_dir(&dir).await?;
        log::debug!("Opened file store at {}", dir.display());
        Ok(Self { dir })
    }

    /// The directory records are stored in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{EXTENSION}")))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let dir = self.dir.clone();
        let value = value.to_string();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::Builder::new()
                .prefix(".")
                .suffix(".tmp")
                .tempfile_in(&dir)?;
            tmp.write_all(value.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut keys = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with('.') || !stem.starts_with(prefix) {
                continue;
            }
            keys.push(stem.to_string());
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();

        let store = FileStore::open(tmp.path()).await.unwrap();
        store.set("geofence_zones", "[1,2,3]").await.unwrap();
        drop(store);

        let reopened = FileStore::open(tmp.path()).await.unwrap();
        assert_eq!(
            reopened.get("geofence_zones").await.unwrap().as_deref(),
            Some("[1,2,3]")
        );
    }

    #[tokio::test]
    async fn missing_key_is_none_and_remove_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();

        assert!(store.get("absent").await.unwrap().is_none());
        store.remove("absent").await.unwrap();
    }

    #[tokio::test]
    async fn creates_nested_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let store = FileStore::open(&nested).await.unwrap();
        store.set("k", "v").await.unwrap();
        assert!(nested.join("k.json").exists());
    }

    #[tokio::test]
    async fn lists_keys_by_prefix_ignoring_other_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();
        store.set("offline_map_utrecht", "{}").await.unwrap();
        store.set("offline_map_amsterdam", "{}").await.unwrap();
        store.set("geofence_zones", "[]").await.unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let keys = store.keys("offline_map_").await.unwrap();
        assert_eq!(keys, vec!["offline_map_amsterdam", "offline_map_utrecht"]);
    }

    #[tokio::test]
    async fn concurrent_writes_to_one_key_all_succeed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.set("geofence_zones", &format!("[{i}]")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let written: Vec<_> = (0..16).map(|i| format!("[{i}]")).collect();
        let value = store.get("geofence_zones").await.unwrap().unwrap();
        assert!(written.contains(&value));

        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name != "geofence_zones.json")
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();
        let err = store.set("../escape", "x").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));
    }
}
