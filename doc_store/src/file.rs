//! JSON-file-backed document store for the admin CLI.

use crate::{
    CorruptSnafu, DocumentStore, Filter, LoadSnafu, MemStore, PersistSnafu, Result, SerializeSnafu,
    SortKey,
};
use async_trait::async_trait;
use observability_deps::tracing::debug;
use serde_json::Value;
use snafu::ResultExt;
use std::path::{Path, PathBuf};

/// A [`DocumentStore`] persisted as one JSON file.
///
/// The whole store is loaded at open and rewritten after every mutation;
/// collections live in memory in between. Suited to the admin CLI's
/// single-writer sessions, not to anything with real write volume.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    mem: MemStore,
}

impl FileStore {
    /// Open the store at `path`, creating an empty one if the file does not
    /// exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mem = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot = serde_json::from_slice(&bytes).context(CorruptSnafu {
                    path: path.display().to_string(),
                })?;
                MemStore::load(snapshot)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "starting empty document store");
                MemStore::new()
            }
            Err(e) => {
                return Err(e).context(LoadSnafu {
                    path: path.display().to_string(),
                })
            }
        };

        Ok(Self { path, mem })
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = self.mem.snapshot();
        let bytes = serde_json::to_vec_pretty(&snapshot).context(SerializeSnafu)?;
        tokio::fs::write(&self.path, bytes)
            .await
            .context(PersistSnafu {
                path: self.path.display().to_string(),
            })
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn insert(&self, collection: &str, document: Value) -> Result<()> {
        self.mem.insert(collection, document).await?;
        self.persist().await
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&SortKey>,
    ) -> Result<Vec<Value>> {
        self.mem.query(collection, filter, sort).await
    }

    async fn update(&self, collection: &str, filter: &Filter, document: Value) -> Result<u64> {
        let replaced = self.mem.update(collection, filter, document).await?;
        if replaced > 0 {
            self.persist().await?;
        }
        Ok(replaced)
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let deleted = self.mem.delete(collection, filter).await?;
        if deleted > 0 {
            self.persist().await?;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = FileStore::open(&path).await.unwrap();
            store
                .insert("log", json!({"uid": "l1"}))
                .await
                .unwrap();
        }

        let store = FileStore::open(&path).await.unwrap();
        let docs = store.query("log", &Filter::All, None).await.unwrap();
        assert_eq!(docs, vec![json!({"uid": "l1"})]);
    }

    #[tokio::test]
    async fn corrupt_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = FileStore::open(&path).await.unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }
}
