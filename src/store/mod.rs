//! Document store contract
//!
//! The hosted backend is modeled as a schemaless document store addressed by
//! collection + id, with filtered queries, live queries and atomic batches.
//! Services hold it as `Arc<dyn DocumentStore>` so the same code runs against
//! the in-process `MemoryStore` and the SQLite-backed `SqliteStore`.

pub mod memory;
pub mod migrations;
pub mod models;
pub mod rules;
pub mod sqlite;
pub mod watch;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::PortalResult;

pub use memory::MemoryStore;
pub use models::{
    fields, to_fields, ChangeKind, Direction, Document, DocumentChange, Fields, FilterOp, Query,
    Snapshot, WriteBatch, WriteOp,
};
pub use rules::{AccessPolicy, AllowAll, PortalRules};
pub use sqlite::SqliteStore;
pub use watch::{Subscription, WatchRegistry};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document; `Ok(None)` when it does not exist
    async fn get(&self, collection: &str, id: &str) -> PortalResult<Option<Document>>;

    /// Create or overwrite a document; with `merge` only the given top-level
    /// fields are replaced
    async fn set(&self, collection: &str, id: &str, data: Fields, merge: bool) -> PortalResult<()>;

    /// Merge fields into an existing document; `NotFound` if it is missing
    async fn update(&self, collection: &str, id: &str, data: Fields) -> PortalResult<()>;

    /// Insert a document under a generated id and return the id
    async fn add(&self, collection: &str, data: Fields) -> PortalResult<String>;

    /// Remove a document; deleting a missing document is not an error
    async fn delete(&self, collection: &str, id: &str) -> PortalResult<()>;

    async fn query(&self, query: &Query) -> PortalResult<Vec<Document>>;

    /// Subscribe to a live query
    async fn watch(&self, query: Query) -> PortalResult<Subscription>;

    /// Commit a batch atomically
    async fn commit(&self, batch: WriteBatch) -> PortalResult<()>;
}

/// Typed helpers over any document store
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    async fn get_as<T: DeserializeOwned + Send>(
        &self,
        collection: &str,
        id: &str,
    ) -> PortalResult<Option<T>> {
        match self.get(collection, id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    async fn set_as<T: Serialize + Sync>(
        &self,
        collection: &str,
        id: &str,
        value: &T,
        merge: bool,
    ) -> PortalResult<()> {
        let data = to_fields(value)?;
        self.set(collection, id, data, merge).await
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}
