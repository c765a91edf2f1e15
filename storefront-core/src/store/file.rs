//! JSON file-backed storage tier.
//!
//! The default persisted tier. Values live in a single JSON document:
//!
//! ```json
//! { "version": 1, "entries": { "refresh_token": "eyJ..." } }
//! ```
//!
//! The file is rewritten on every mutation. On Unix it is created with
//! mode `0600`.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{KeyValueStore, Secret, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileStoreData {
    version: u32,
    entries: BTreeMap<String, Secret>,
}

impl Default for FileStoreData {
    fn default() -> Self {
        Self {
            version: 1,
            entries: BTreeMap::new(),
        }
    }
}

/// Disk-backed store holding remembered credentials across restarts.
pub struct FileStore {
    path: PathBuf,
    data: RwLock<FileStoreData>,
}

impl FileStore {
    /// Default location: `credentials.json` in the platform data directory.
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let dirs = directories::ProjectDirs::from("com", "storefront", "storefront").ok_or_else(
            || StoreError::BackendError {
                message: "no home directory available for credential storage".to_string(),
            },
        )?;
        Ok(dirs.data_dir().join("credentials.json"))
    }

    /// Open the store at `path`, creating parent directories as needed.
    ///
    /// An unreadable or corrupt document is logged and replaced by an empty
    /// one on the next write; it never prevents the store from opening.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            match serde_json::from_str(&contents) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt credential file {:?}: {}", path, e);
                    FileStoreData::default()
                }
            }
        } else {
            FileStoreData::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, data: &FileStoreData) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(data)?;
        write_private(&self.path, contents.as_bytes())?;
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("keys_count", &self.data.read().entries.len())
            .finish()
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.data.read().entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Secret) -> Result<(), StoreError> {
        let mut data = self.data.write();
        data.entries.insert(key.to_string(), value.clone());
        self.save(&data)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self.data.write();
        if data.entries.remove(key).is_none() {
            return Ok(());
        }
        self.save(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (FileStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("nested").join("credentials.json")).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let (store, _dir) = temp_store();
        store.set("refresh_token", &Secret::new("r1")).await.unwrap();

        let reopened = FileStore::open(store.path().to_path_buf()).unwrap();
        let value = reopened.get("refresh_token").await.unwrap();
        assert_eq!(value.unwrap().expose(), "r1");
    }

    #[tokio::test]
    async fn test_file_store_delete_persists() {
        let (store, _dir) = temp_store();
        store.set("access_token", &Secret::new("a1")).await.unwrap();
        store.delete("access_token").await.unwrap();
        store.delete("access_token").await.unwrap();

        let reopened = FileStore::open(store.path().to_path_buf()).unwrap();
        assert!(reopened.get("access_token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.get("access_token").await.unwrap().is_none());

        store.set("access_token", &Secret::new("a2")).await.unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("access_token").await.unwrap().unwrap().expose(), "a2");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (store, _dir) = temp_store();
        store.set("access_token", &Secret::new("a1")).await.unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
