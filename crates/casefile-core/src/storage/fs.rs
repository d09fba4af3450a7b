use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{DocumentRecord, DocumentStore};
use crate::error::StoreError;

const RECORD_EXTENSION: &str = "json";

/// Directory-backed store: one JSON file per key.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a half-written record.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    dir: PathBuf,
}

impl FsDocumentStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        tracing::debug!("Document store opened at {:?}", dir);
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        // Keys become file names, so refuse anything that could escape the directory
        if key.is_empty()
            || key.starts_with('.')
            || key.contains(['/', '\\'])
            || key.contains("..")
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", key, RECORD_EXTENSION)))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(StoreError::List)?;

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(StoreError::List)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let path = self.path_for(key)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Read {
                    key: key.to_string(),
                    source,
                })
            }
        };

        let record = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(record))
    }

    async fn set(&self, key: &str, record: &DocumentRecord) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let write_err = |message: String| StoreError::Write {
            key: key.to_string(),
            message,
        };

        let bytes = serde_json::to_vec_pretty(record).map_err(|e| write_err(e.to_string()))?;

        let tmp_path = self
            .dir
            .join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| write_err(e.to_string()))?;

        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_err(e.to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, text: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            name: format!("{}.pdf", id),
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::open(temp_dir.path()).unwrap();

        store.set("doc-1", &record("doc-1", "body")).await.unwrap();

        let loaded = store.get("doc-1").await.unwrap().unwrap();
        assert_eq!(loaded.text, "body");
        assert_eq!(loaded.name, "doc-1.pdf");
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::open(temp_dir.path()).unwrap();

        assert!(store.get("doc-missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_keys_sorted_and_ignores_other_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::open(temp_dir.path()).unwrap();

        store.set("doc-b", &record("doc-b", "")).await.unwrap();
        store.set("doc-a", &record("doc-a", "")).await.unwrap();
        store.set("settings", &record("settings", "")).await.unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "ignore me").unwrap();

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, vec!["doc-a", "doc-b", "settings"]);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::open(temp_dir.path()).unwrap();
        std::fs::write(temp_dir.path().join("doc-bad.json"), b"{not json").unwrap();

        let err = store.get("doc-bad").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }), "got {err}");
    }

    #[tokio::test]
    async fn test_set_overwrites_without_leaving_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::open(temp_dir.path()).unwrap();

        store.set("doc-1", &record("doc-1", "first")).await.unwrap();
        store.set("doc-1", &record("doc-1", "second")).await.unwrap();

        assert_eq!(store.get("doc-1").await.unwrap().unwrap().text, "second");
        let files: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::open(temp_dir.path()).unwrap();

        let err = store.get("../escape").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
        assert!(store.set("a/b", &record("a/b", "")).await.is_err());
    }
}
