//! Artifact blob storage
//!
//! Key-value persistence of named blobs under a run id. Writes are idempotent
//! and atomic: a concurrent reader sees either the previous blob or the new
//! one, never a partial write.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// No blob stored under this (run_id, name)
    #[error("artifact not found: {run_id}/{name}")]
    NotFound { run_id: String, name: String },
    /// Underlying I/O failure
    #[error("artifact store I/O: {0}")]
    Io(#[from] io::Error),
}

/// Key-value blob store scoped by run id
///
/// Blobs under one run id are never visible under another. Concurrent `put`
/// calls to different keys do not interfere.
pub trait ArtifactStore: Send + Sync {
    /// Store a blob, overwriting any previous blob under the same key
    fn put(&self, run_id: &str, name: &str, blob: &[u8]) -> Result<(), StoreError>;

    /// Fetch a blob
    fn get(&self, run_id: &str, name: &str) -> Result<Vec<u8>, StoreError>;

    /// Whether a blob exists under this key
    fn exists(&self, run_id: &str, name: &str) -> Result<bool, StoreError>;
}

/// In-memory store for tests and throwaway runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryStore {
    fn put(&self, run_id: &str, name: &str, blob: &[u8]) -> Result<(), StoreError> {
        let mut blobs = self.blobs.lock().expect("store lock poisoned");
        blobs.insert((run_id.to_string(), name.to_string()), blob.to_vec());
        Ok(())
    }

    fn get(&self, run_id: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        let blobs = self.blobs.lock().expect("store lock poisoned");
        blobs
            .get(&(run_id.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                run_id: run_id.to_string(),
                name: name.to_string(),
            })
    }

    fn exists(&self, run_id: &str, name: &str) -> Result<bool, StoreError> {
        let blobs = self.blobs.lock().expect("store lock poisoned");
        Ok(blobs.contains_key(&(run_id.to_string(), name.to_string())))
    }
}

/// Filesystem-backed store
///
/// Blobs live at `<root>/<run_id>/<name>`. Writes go to a uniquely named
/// temporary file in the target directory and are renamed into place.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, run_id: &str, name: &str) -> PathBuf {
        self.root.join(run_id).join(name)
    }
}

impl ArtifactStore for FileStore {
    fn put(&self, run_id: &str, name: &str, blob: &[u8]) -> Result<(), StoreError> {
        let path = self.blob_path(run_id, name);
        let dir = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(dir)?;

        // Unique temp name so concurrent writers to sibling keys never clash
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));
        std::fs::write(&tmp, blob)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, run_id: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        match std::fs::read(self.blob_path(run_id, name)) {
            Ok(blob) => Ok(blob),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                run_id: run_id.to_string(),
                name: name.to_string(),
            }),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn exists(&self, run_id: &str, name: &str) -> Result<bool, StoreError> {
        Ok(self.blob_path(run_id, name).is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stores() -> (MemoryStore, FileStore, TempDir) {
        let dir = TempDir::new().unwrap();
        (MemoryStore::new(), FileStore::new(dir.path()), dir)
    }

    #[test]
    fn test_put_get_round_trip() {
        let (memory, file, _dir) = stores();
        for store in [&memory as &dyn ArtifactStore, &file] {
            store.put("run-1", "pred.json", b"payload").unwrap();
            assert_eq!(store.get("run-1", "pred.json").unwrap(), b"payload");
        }
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let (memory, file, _dir) = stores();
        for store in [&memory as &dyn ArtifactStore, &file] {
            let result = store.get("run-1", "pred.json");
            assert!(matches!(result, Err(StoreError::NotFound { .. })));
        }
    }

    #[test]
    fn test_put_overwrites() {
        let (memory, file, _dir) = stores();
        for store in [&memory as &dyn ArtifactStore, &file] {
            store.put("run-1", "pred.json", b"v1").unwrap();
            store.put("run-1", "pred.json", b"v2").unwrap();
            assert_eq!(store.get("run-1", "pred.json").unwrap(), b"v2");
        }
    }

    #[test]
    fn test_runs_are_isolated() {
        let (memory, file, _dir) = stores();
        for store in [&memory as &dyn ArtifactStore, &file] {
            store.put("run-1", "pred.json", b"one").unwrap();
            assert!(!store.exists("run-2", "pred.json").unwrap());
            assert!(matches!(
                store.get("run-2", "pred.json"),
                Err(StoreError::NotFound { .. })
            ));
        }
    }

    #[test]
    fn test_exists() {
        let (memory, file, _dir) = stores();
        for store in [&memory as &dyn ArtifactStore, &file] {
            assert!(!store.exists("run-1", "ic.json").unwrap());
            store.put("run-1", "ic.json", b"series").unwrap();
            assert!(store.exists("run-1", "ic.json").unwrap());
        }
    }

    #[test]
    fn test_file_store_nested_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store
            .put("run-1", "signal_analysis/ic.json", b"series")
            .unwrap();
        assert_eq!(
            store.get("run-1", "signal_analysis/ic.json").unwrap(),
            b"series"
        );
        assert!(dir
            .path()
            .join("run-1")
            .join("signal_analysis")
            .join("ic.json")
            .is_file());
    }

    #[test]
    fn test_file_store_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.put("run-1", "pred.json", b"payload").unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("run-1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["pred.json"]);
    }
}
