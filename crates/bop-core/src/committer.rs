//! Brew task to committer attribution.
//!
//! Scratch builds are issued under the CI machine account, so Brew records
//! that account as the build owner. The mapping kept here lets later stages
//! address notifications to the person who pushed the commit.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::error::{BopError, Result};

#[async_trait]
pub trait CommitterStore: Send + Sync {
    async fn record(&self, task_id: &str, committer: &str) -> Result<()>;

    async fn lookup(&self, task_id: &str) -> Result<Option<String>>;
}

/// In-memory store for a single process.
#[derive(Debug, Default)]
pub struct MemoryCommitterStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCommitterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| BopError::Store("committer map lock poisoned".to_string()))
    }
}

#[async_trait]
impl CommitterStore for MemoryCommitterStore {
    async fn record(&self, task_id: &str, committer: &str) -> Result<()> {
        self.lock()?.insert(task_id.to_string(), committer.to_string());
        Ok(())
    }

    async fn lookup(&self, task_id: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(task_id).cloned())
    }
}

/// Filesystem store: one `<root>/<task_id>.mapping` file per task.
pub struct FsCommitterStore {
    root: PathBuf,
}

impl FsCommitterStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn mapping_path(&self, task_id: &str) -> Result<PathBuf> {
        if task_id.is_empty() || !task_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(BopError::Store(format!("invalid task id: {task_id:?}")));
        }
        Ok(self.root.join(format!("{task_id}.mapping")))
    }
}

#[async_trait]
impl CommitterStore for FsCommitterStore {
    async fn record(&self, task_id: &str, committer: &str) -> Result<()> {
        let path = self.mapping_path(task_id)?;

        // Write to a temp file in the same directory, then rename.
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(committer.as_bytes())?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    async fn lookup(&self, task_id: &str) -> Result<Option<String>> {
        let path = self.mapping_path(task_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(committer) => Ok(Some(committer)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryCommitterStore::new();
        assert_eq!(store.lookup("1").await.unwrap(), None);
        store.record("1", "jdoe@example.com").await.unwrap();
        assert_eq!(store.lookup("1").await.unwrap().as_deref(), Some("jdoe@example.com"));
    }

    #[tokio::test]
    async fn test_fs_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        FsCommitterStore::new(dir.path())
            .unwrap()
            .record("12345", "jdoe@example.com")
            .await
            .unwrap();

        let store = FsCommitterStore::new(dir.path()).unwrap();
        assert_eq!(store.lookup("12345").await.unwrap().as_deref(), Some("jdoe@example.com"));
        assert!(dir.path().join("12345.mapping").is_file());
        assert_eq!(store.lookup("999").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fs_store_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let store = FsCommitterStore::new(dir.path()).unwrap();
        let err = store.record("../escape", "x").await.unwrap_err();
        assert!(matches!(err, BopError::Store(_)));
    }
}
