//! In-memory document store.

use crate::{DocumentStore, Filter, Result, SortKey};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// An in-memory [`DocumentStore`] backed by a hashmap of collections
/// protected with a read-write mutex.
///
/// The unit-test backend, and the substrate of [`FileStore`](crate::FileStore).
#[derive(Debug, Default)]
pub struct MemStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn load(snapshot: HashMap<String, Vec<Value>>) -> Self {
        Self {
            collections: RwLock::new(snapshot),
        }
    }

    pub(crate) fn snapshot(&self) -> HashMap<String, Vec<Value>> {
        self.collections.read().clone()
    }
}

#[async_trait]
impl DocumentStore for MemStore {
    async fn insert(&self, collection: &str, document: Value) -> Result<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(document);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&SortKey>,
    ) -> Result<Vec<Value>> {
        let collections = self.collections.read();
        let mut matches: Vec<Value> = collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|d| filter.matches(d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(key) = sort {
            matches.sort_by(|a, b| key.compare(a, b));
        }
        Ok(matches)
    }

    async fn update(&self, collection: &str, filter: &Filter, document: Value) -> Result<u64> {
        let mut collections = self.collections.write();
        let mut replaced = 0;
        if let Some(documents) = collections.get_mut(collection) {
            for existing in documents.iter_mut() {
                if filter.matches(existing) {
                    *existing = document.clone();
                    replaced += 1;
                }
            }
        }
        Ok(replaced)
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let mut collections = self.collections.write();
        let mut deleted = 0;
        if let Some(documents) = collections.get_mut(collection) {
            let before = documents.len();
            documents.retain(|d| !filter.matches(d));
            deleted = (before - documents.len()) as u64;
        }
        Ok(deleted)
    }
}
