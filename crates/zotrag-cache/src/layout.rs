//! On-disk layout of the data directory.

use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use zotrag_core::{Error, Result};

use crate::disk::{write_atomic, DiskCache};

/// Paths under the data root (`data/` by default).
///
/// ```text
/// data/
///   cache/<key>.json                 one ProcessedDocument per record + attachment
///   chunks_cache/<key>_chunks.json   passages of one document
///   zotero_docs.json                 all extracted documents
///   zotero_chunks.json               all passages
///   lancedb/                         vector store
/// ```
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Per-document extraction cache.
    #[must_use]
    pub fn document_cache(&self) -> DiskCache {
        DiskCache::new(self.root.join("cache"))
    }

    /// Per-document passage cache.
    #[must_use]
    pub fn chunk_cache(&self) -> DiskCache {
        DiskCache::with_suffix(self.root.join("chunks_cache"), "_chunks")
    }

    #[must_use]
    pub fn documents_file(&self) -> PathBuf {
        self.root.join("zotero_docs.json")
    }

    #[must_use]
    pub fn chunks_file(&self) -> PathBuf {
        self.root.join("zotero_chunks.json")
    }

    #[must_use]
    pub fn vector_dir(&self) -> PathBuf {
        self.root.join("lancedb")
    }
}

/// Atomically write a stage artifact as JSON.
pub async fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    let dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &bytes))
        .await
        .map_err(|e| Error::Other(format!("artifact writer panicked: {e}")))??;
    Ok(())
}

/// Read a stage artifact. `Ok(None)` when the file does not exist.
pub async fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_paths() {
        let layout = DataLayout::new("data");
        assert_eq!(layout.document_cache().dir(), Path::new("data/cache"));
        assert_eq!(layout.chunk_cache().dir(), Path::new("data/chunks_cache"));
        assert_eq!(layout.documents_file(), PathBuf::from("data/zotero_docs.json"));
        assert_eq!(layout.chunks_file(), PathBuf::from("data/zotero_chunks.json"));
        assert_eq!(layout.vector_dir(), PathBuf::from("data/lancedb"));
    }

    #[tokio::test]
    async fn test_artifact_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("zotero_docs.json");

        write_artifact(&path, &vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        let back: Option<Vec<String>> = read_artifact(&path).await.unwrap();

        assert_eq!(back, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_none() {
        let dir = tempdir().unwrap();
        let back: Option<Vec<String>> = read_artifact(&dir.path().join("absent.json"))
            .await
            .unwrap();
        assert!(back.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zotero_chunks.json");
        std::fs::write(&path, b"[1, 2").unwrap();

        let result: Result<Option<Vec<u32>>> = read_artifact(&path).await;
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
