//! Explicit transaction handles with attach-then-save discipline.

use crate::{DocumentStore, Filter, Result, SerializeSnafu};
use chrono::Utc;
use observability_deps::tracing::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::sync::Arc;
use uuid::Uuid;

/// Collection holding rollback records of in-flight transactions.
pub const TRANSACTION_COLLECTION: &str = "dbTransaction";

/// Kind of a store mutation, recorded for rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbAction {
    /// Document inserted.
    Add,
    /// Document replaced.
    Update,
    /// Document(s) deleted.
    Delete,
}

/// One rollback record, persisted before the mutation it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Id of the owning transaction.
    pub transaction_id: String,
    /// Collection the mutation targets.
    pub collection: String,
    /// Kind of mutation.
    pub action: DbAction,
    /// URI of the affected object.
    pub uri: String,
    /// Document uid, when the mutation targets a single document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
}

/// A transaction over one logical engine operation.
///
/// Mutations are attached before they are applied; [`Transaction::save`]
/// persists the attached records after each batch so a crash leaves enough
/// behind to drive rollback. [`Transaction::commit`] removes them once the
/// operation has fully succeeded. Aborting is simply not committing.
#[derive(Debug)]
pub struct Transaction {
    id: String,
    store: Arc<dyn DocumentStore>,
    pending: Mutex<Vec<TransactionRecord>>,
}

impl Transaction {
    /// Start a transaction against `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            store,
            pending: Mutex::new(vec![]),
        }
    }

    /// The transaction id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Record an intended mutation. Call before applying it to the store.
    pub fn attach(&self, action: DbAction, collection: &str, uri: &str, uid: Option<String>) {
        self.pending.lock().push(TransactionRecord {
            transaction_id: self.id.clone(),
            collection: collection.to_string(),
            action,
            uri: uri.to_string(),
            uid,
            created_at: Utc::now().to_rfc3339(),
        });
    }

    /// Persist all attached records that have not been saved yet.
    pub async fn save(&self) -> Result<()> {
        let pending: Vec<TransactionRecord> = std::mem::take(&mut *self.pending.lock());
        if pending.is_empty() {
            return Ok(());
        }

        debug!(
            transaction_id = %self.id,
            records = pending.len(),
            "saving transaction records",
        );
        for record in pending {
            let doc = serde_json::to_value(&record).context(SerializeSnafu)?;
            self.store.insert(TRANSACTION_COLLECTION, doc).await?;
        }
        Ok(())
    }

    /// Remove this transaction's rollback records after a successful
    /// operation.
    pub async fn commit(self) -> Result<()> {
        self.store
            .delete(
                TRANSACTION_COLLECTION,
                &Filter::eq("transactionId", self.id.as_str()),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemStore;

    #[tokio::test]
    async fn save_persists_and_commit_clears() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemStore::new());
        let tx = Transaction::new(Arc::clone(&store));

        tx.attach(DbAction::Add, "channelDataChunk", "eml://log(l1)", Some("c-1".into()));
        tx.attach(DbAction::Update, "log", "eml://log(l1)", None);
        tx.save().await.unwrap();

        let records = store
            .query(TRANSACTION_COLLECTION, &Filter::All, None)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["action"], "add");
        assert_eq!(records[1]["collection"], "log");

        // Saving again without new attachments is a no-op.
        tx.save().await.unwrap();
        assert_eq!(
            store
                .query(TRANSACTION_COLLECTION, &Filter::All, None)
                .await
                .unwrap()
                .len(),
            2
        );

        tx.commit().await.unwrap();
        assert!(store
            .query(TRANSACTION_COLLECTION, &Filter::All, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn abandoned_transactions_leave_records_for_recovery() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemStore::new());
        let tx = Transaction::new(Arc::clone(&store));
        tx.attach(DbAction::Delete, "channelDataChunk", "eml://log(l1)", None);
        tx.save().await.unwrap();
        drop(tx);

        let records = store
            .query(TRANSACTION_COLLECTION, &Filter::All, None)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }
}
