//! Durable key-value storage primitive with a finite quota.
//!
//! Usage is measured as the sum of key and value lengths in bytes, the same
//! accounting browsers apply to local storage.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::StoreError;

/// Default quota: 5 MiB.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageQuota {
    pub max_bytes: usize,
}

impl Default for StorageQuota {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

impl StorageQuota {
    pub fn bytes(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Fail with `QuotaExceeded` when writing `value` under `key` would push
    /// usage past the limit. `used` excludes any existing entry for `key`.
    fn check(&self, key: &str, value: &str, used: usize) -> Result<(), StoreError> {
        let needed = key.len() + value.len();
        let available = self.max_bytes.saturating_sub(used);
        if needed > available {
            warn!(key, needed, available, "storage quota exceeded");
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                needed,
                available,
            });
        }
        Ok(())
    }
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value`, replacing any previous value. Fails with
    /// [`StoreError::QuotaExceeded`] and leaves the previous value intact when
    /// the write does not fit.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Returns whether a value was present.
    async fn remove(&self, key: &str) -> Result<bool, StoreError>;

    /// All keys, sorted.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Bytes currently in use.
    async fn usage(&self) -> Result<usize, StoreError>;

    fn quota(&self) -> StorageQuota;
}

// ── In-memory ──

/// Process-local storage, mainly for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
    quota: StorageQuota,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: StorageQuota) -> Self {
        Self {
            entries: Mutex::default(),
            quota,
        }
    }
}

fn usage_of(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let existing = entries.get(key).map_or(0, |v| key.len() + v.len());
        self.quota.check(key, value, usage_of(&entries) - existing)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }

    async fn usage(&self) -> Result<usize, StoreError> {
        Ok(usage_of(&*self.entries.lock().await))
    }

    fn quota(&self) -> StorageQuota {
        self.quota
    }
}

// ── File-backed ──

/// One file per key under a state directory. File names are the hex-encoded
/// key, so arbitrary keys (slashes, colons) map to safe names.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    quota: StorageQuota,
    // Serializes read-modify-write of the quota accounting.
    write_lock: Mutex<()>,
}

const ENTRY_EXT: &str = "entry";

impl FileStorage {
    /// Open (creating if needed) a storage directory.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_quota(dir, StorageQuota::default()).await
    }

    pub async fn open_with_quota(
        dir: impl AsRef<Path>,
        quota: StorageQuota,
    ) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "opened file storage");
        Ok(Self {
            dir,
            quota,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{ENTRY_EXT}", hex::encode(key)))
    }

    /// `(key, value length)` for every entry on disk.
    async fn entries(&self) -> Result<Vec<(String, usize)>, StoreError> {
        let mut out = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| hex::decode(s).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok())
            else {
                warn!(path = %path.display(), "skipping undecodable storage entry");
                continue;
            };
            let len = entry.metadata().await?.len() as usize;
            out.push((key, len));
        }
        out.sort();
        Ok(out)
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.entry_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let used: usize = self
            .entries()
            .await?
            .iter()
            .filter(|(k, _)| k != key)
            .map(|(k, len)| k.len() + len)
            .sum();
        self.quota.check(key, value, used)?;

        let path = self.entry_path(key);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries().await?.into_iter().map(|(k, _)| k).collect())
    }

    async fn usage(&self) -> Result<usize, StoreError> {
        Ok(self
            .entries()
            .await?
            .iter()
            .map(|(k, len)| k.len() + len)
            .sum())
    }

    fn quota(&self) -> StorageQuota {
        self.quota
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_get_set_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("a").await.unwrap(), None);
        storage.set("a", "1").await.unwrap();
        storage.set("b", "22").await.unwrap();
        assert_eq!(storage.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(storage.keys().await.unwrap(), vec!["a", "b"]);
        assert_eq!(storage.usage().await.unwrap(), 5);
        assert!(storage.remove("a").await.unwrap());
        assert!(!storage.remove("a").await.unwrap());
    }

    #[tokio::test]
    async fn memory_quota_rejects_without_clobbering() {
        let storage = MemoryStorage::with_quota(StorageQuota::bytes(10));
        storage.set("k", "12345").await.unwrap();
        let err = storage.set("k", "1234567890").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::QuotaExceeded { needed: 11, available: 10, .. }
        ));
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("12345"));
        // Replacing an entry only counts the new value.
        storage.set("k", "123456789").await.unwrap();
    }

    #[tokio::test]
    async fn file_storage_persists_across_opens() {
        let tmp = tempfile::TempDir::new().unwrap();
        let key = "smartdak-staging:who/anc:main";
        {
            let storage = FileStorage::open(tmp.path()).await.unwrap();
            storage.set(key, "{\"files\":{}}").await.unwrap();
        }
        let storage = FileStorage::open(tmp.path()).await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec![key]);
        assert_eq!(
            storage.get(key).await.unwrap().as_deref(),
            Some("{\"files\":{}}")
        );
        assert!(storage.remove(key).await.unwrap());
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_storage_enforces_quota() {
        let tmp = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::open_with_quota(tmp.path(), StorageQuota::bytes(8))
            .await
            .unwrap();
        storage.set("a", "1234").await.unwrap();
        assert!(storage.set("b", "12345").await.unwrap_err().is_quota_exceeded());
        assert_eq!(storage.get("b").await.unwrap(), None);
        assert_eq!(storage.usage().await.unwrap(), 5);
    }
}
