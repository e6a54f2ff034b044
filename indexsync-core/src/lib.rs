//! Indexsync Core - Keep a search index in step with a hierarchical repository
//!
//! This library consumes repository change events (collection and data object
//! creation, removal, rename, metadata and permission edits) and translates
//! each one into document operations against a search index.

pub mod builder;
pub mod config;
pub mod crawler;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod event;
pub mod handlers;
pub mod path;
pub mod repository;
pub mod store;

pub use config::Config;
pub use dispatch::{Dispatcher, Outcome, Route};
pub use document::{
    AclEntry, CollectionDocument, DataObjectDocument, Document, FieldPatch, MetadataTriple,
    Permission, TypeCollection, UserRef,
};
pub use error::{ErrorEnvelope, SyncError};
pub use event::{
    ChangeEvent, EventKind, EventRecord, PermissionChange, PermissionPayload,
};
pub use handlers::Handler;
pub use repository::{
    CatalogRepository, Entry, EntryKind, MemoryRepository, RawAcl, RepositoryReader,
    SessionFactory,
};
pub use store::{open_store, DocumentStore, HttpStore, SqliteStore};

/// Result type alias for indexsync operations
pub type Result<T> = std::result::Result<T, SyncError>;
