//! Document store the index is written to
//!
//! Documents are grouped by [`TypeCollection`] and keyed by their repository
//! path. Handlers never merge: they either create a whole document or patch
//! named fields of an existing one.

mod http;
mod sqlite;

pub use http::{delete_by_prefix_body, update_body, HttpStore};
pub use sqlite::SqliteStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::document::{Document, FieldPatch, TypeCollection};
use serde_json::Value;
use std::sync::Arc;

pub trait DocumentStore: Send + Sync {
    /// Insert a new document. Fails with `DuplicateDocument` if `id` is taken.
    fn create(&self, kind: TypeCollection, id: &str, body: &Value) -> crate::Result<()>;

    fn exists(&self, kind: TypeCollection, id: &str) -> crate::Result<bool>;

    /// Assign the patch's fields on an existing document. Fails with
    /// `DocumentNotFound` when there is nothing to patch.
    fn patch(&self, kind: TypeCollection, id: &str, patch: &FieldPatch) -> crate::Result<()>;

    /// Delete one document. Returns false if it was not there.
    fn remove(&self, kind: TypeCollection, id: &str) -> crate::Result<bool>;

    /// Delete `prefix` and every document under `prefix/`, in both type
    /// collections. Returns the number of documents removed.
    fn remove_by_prefix(&self, prefix: &str) -> crate::Result<u64>;

    fn get(&self, kind: TypeCollection, id: &str) -> crate::Result<Option<Value>>;

    fn count(&self, kind: TypeCollection) -> crate::Result<u64>;
}

/// Create `doc` in its type collection
pub fn create_document(store: &dyn DocumentStore, doc: &Document) -> crate::Result<()> {
    store.create(doc.kind(), doc.id(), &doc.to_json()?)
}

/// Open the backend named in `config`
pub fn open_store(config: &StoreConfig) -> crate::Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.backend {
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(&config.path)?),
        StoreBackend::Http => Arc::new(HttpStore::new(config)?),
    };
    tracing::debug!(backend = ?config.backend, "document store opened");
    Ok(store)
}
