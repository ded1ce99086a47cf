//! Directory of JSON cache entries.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::Builder;
use tracing::{debug, warn};
use zotrag_core::{CacheError, CacheKey};

const EXTENSION: &str = "json";

/// A directory of serialized values addressed by [`CacheKey`].
///
/// Entries live at `<dir>/<key><suffix>.json`.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    suffix: String,
}

impl DiskCache {
    /// Cache with entries named `<key>.json`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_suffix(dir, "")
    }

    /// Cache with entries named `<key><suffix>.json`.
    pub fn with_suffix(dir: impl Into<PathBuf>, suffix: &str) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.to_string(),
        }
    }

    /// Cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the entry for `key`.
    #[must_use]
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir
            .join(format!("{}{}.{EXTENSION}", key.as_str(), self.suffix))
    }

    /// Read the entry for `key`.
    ///
    /// A missing entry is a miss. An entry that fails to deserialize is
    /// deleted and reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read cache entry {:?}: {}", path, e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!("Cache hit {:?}", path);
                Some(value)
            }
            Err(e) => {
                let err = CacheError::Corrupt {
                    path: path.clone(),
                    message: e.to_string(),
                };
                warn!("Discarding {}", err);
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    if e.kind() != io::ErrorKind::NotFound {
                        warn!("Failed to delete corrupt cache entry {:?}: {}", path, e);
                    }
                }
                None
            }
        }
    }

    /// Write the entry for `key`.
    ///
    /// The value is written to a temporary file in the cache directory and
    /// renamed into place, so readers never see a partial entry.
    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Serialize(e.to_string()))?;
        let dir = self.dir.clone();
        let path = self.path_for(key);

        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &bytes))
            .await
            .map_err(|e| CacheError::Io(io::Error::other(e.to_string())))??;

        debug!("Cached {}", key);
        Ok(())
    }

    /// Remove the entry for `key`. Returns whether an entry existed.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<bool, CacheError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether an entry exists for `key`. Does not check that it parses.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        tokio::fs::try_exists(self.path_for(key))
            .await
            .unwrap_or(false)
    }

    /// Number of entries in the directory.
    pub async fn len(&self) -> Result<usize, CacheError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let ending = format!("{}.{EXTENSION}", self.suffix);
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().ends_with(&ending) {
                count += 1;
            }
        }
        Ok(count)
    }

    pub async fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len().await? == 0)
    }
}

/// Write `bytes` to `path` through a temp file in `dir`.
pub(crate) fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = Builder::new().prefix(".tmp-").tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CacheError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;
    use zotrag_core::{Creator, Document, ProcessedDocument};

    fn sample_doc(title: &str) -> ProcessedDocument {
        ProcessedDocument {
            document: Document::default(),
            zotero_key: "REC1".to_string(),
            attachment_key: "ATT1".to_string(),
            title: title.to_string(),
            creators: vec![Creator::author("Ada", "Lovelace")],
            date: Some("1843".to_string()),
            item_type: "journalArticle".to_string(),
            pdf_size: 2048,
            processed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_miss_on_empty_cache() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("cache"));
        let key = CacheKey::derive("REC1", "ATT1");

        let got: Option<ProcessedDocument> = cache.get(&key).await;
        assert!(got.is_none());
        assert!(!cache.contains(&key).await);
    }

    #[tokio::test]
    async fn test_put_then_get_returns_equal_value() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("cache"));
        let key = CacheKey::derive("REC1", "ATT1");
        let doc = sample_doc("Notes");

        cache.put(&key, &doc).await.unwrap();

        let first: ProcessedDocument = cache.get(&key).await.unwrap();
        let second: ProcessedDocument = cache.get(&key).await.unwrap();
        assert_eq!(first, doc);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_put_creates_directories() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join("nested").join("cache");
        let cache = DiskCache::new(&cache_dir);
        let key = CacheKey::for_id("REC1");

        cache.put(&key, &vec![1u32, 2, 3]).await.unwrap();

        assert!(cache_dir.is_dir());
        assert!(cache.path_for(&key).is_file());
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_entry() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = CacheKey::for_id("REC1");

        cache.put(&key, &sample_doc("Old")).await.unwrap();
        cache.put(&key, &sample_doc("New")).await.unwrap();

        let got: ProcessedDocument = cache.get(&key).await.unwrap();
        assert_eq!(got.title, "New");
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_deleted_and_missed() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = CacheKey::derive("REC1", "ATT1");
        let path = cache.path_for(&key);
        std::fs::write(&path, b"\x00\x01garbage{{").unwrap();

        let got: Option<ProcessedDocument> = cache.get(&key).await;

        assert!(got.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_truncated_entry_is_deleted_and_missed() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = CacheKey::derive("REC1", "ATT1");
        cache.put(&key, &sample_doc("Full")).await.unwrap();

        let path = cache.path_for(&key);
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let got: Option<ProcessedDocument> = cache.get(&key).await;
        assert!(got.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_format_mismatch_is_treated_as_corrupt() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = CacheKey::for_id("REC1");
        cache.put(&key, &"just a string").await.unwrap();

        let got: Option<ProcessedDocument> = cache.get(&key).await;
        assert!(got.is_none());
        assert!(!cache.contains(&key).await);
    }

    #[tokio::test]
    async fn test_suffix_in_file_name() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::with_suffix(dir.path(), "_chunks");
        let key = CacheKey::for_id("REC1");

        let name = cache.path_for(&key);
        let name = name.file_name().unwrap().to_string_lossy();
        assert_eq!(name, format!("{key}_chunks.json"));
    }

    #[tokio::test]
    async fn test_invalidate() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = CacheKey::for_id("REC1");
        cache.put(&key, &1u8).await.unwrap();

        assert!(cache.invalidate(&key).await.unwrap());
        assert!(!cache.invalidate(&key).await.unwrap());
        assert!(cache.get::<u8>(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_len_ignores_temp_files() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        cache.put(&CacheKey::for_id("A"), &1u8).await.unwrap();
        cache.put(&CacheKey::for_id("B"), &2u8).await.unwrap();
        std::fs::write(dir.path().join(".tmp-abc"), b"partial").unwrap();

        assert_eq!(cache.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_len_of_missing_dir_is_zero() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("absent"));
        assert!(cache.is_empty().await.unwrap());
    }
}
