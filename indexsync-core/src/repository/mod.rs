//! Read access to the repository being mirrored
//!
//! Handlers only see the repository through [`RepositoryReader`]. A fresh
//! session is opened for each event through a [`SessionFactory`] and dropped
//! when the handler returns, whether it succeeded or not.

mod catalog;
mod memory;

pub use catalog::{init_catalog, CatalogRepository, CatalogSession, CATALOG_SCHEMA};
pub use memory::{MemoryRepository, MemorySession};

use crate::config::RepositoryConfig;
use crate::document::MetadataTriple;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    Collection,
    DataObject,
}

/// Snapshot of one repository entity, as returned by listings and `stat`.
///
/// `size` and `file_type` are only meaningful for data objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: String,
    pub kind: EntryKind,
    pub creator: String,
    pub size: u64,
    pub file_type: String,
}

impl Entry {
    pub fn collection(path: impl Into<String>, creator: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Collection,
            creator: creator.into(),
            size: 0,
            file_type: String::new(),
        }
    }

    pub fn data_object(
        path: impl Into<String>,
        creator: impl Into<String>,
        size: u64,
        file_type: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::DataObject,
            creator: creator.into(),
            size,
            file_type: file_type.into(),
        }
    }
}

/// One access grant exactly as the repository reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAcl {
    pub user: String,
    pub zone: String,
    pub access: String,
}

impl RawAcl {
    pub fn new(user: impl Into<String>, zone: impl Into<String>, access: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            zone: zone.into(),
            access: access.into(),
        }
    }
}

/// Queries handlers run against an open repository session.
///
/// Timestamps are epoch milliseconds rendered as decimal strings, the way
/// the repository stores them.
pub trait RepositoryReader {
    fn exists(&self, path: &str) -> crate::Result<bool>;

    /// Snapshot of a single entity. Fails with `EntityNotFound` when absent.
    fn stat(&self, path: &str) -> crate::Result<Entry>;

    fn acl_of(&self, path: &str) -> crate::Result<Vec<RawAcl>>;

    fn created_date(&self, path: &str) -> crate::Result<String>;

    fn modified_date(&self, path: &str) -> crate::Result<String>;

    fn metadata_of(&self, path: &str) -> crate::Result<Vec<MetadataTriple>>;

    /// Direct child collections of `path`
    fn child_collections(&self, path: &str) -> crate::Result<Vec<Entry>>;

    /// Direct child data objects of `path`
    fn child_data_objects(&self, path: &str) -> crate::Result<Vec<Entry>>;
}

/// Opens repository sessions. Shared by every worker, so it must be `Sync`.
pub trait SessionFactory: Send + Sync {
    type Session: RepositoryReader;

    fn open(&self, config: &RepositoryConfig) -> crate::Result<Self::Session>;
}

/// Run `f` inside a freshly opened session. The session is dropped (and its
/// connection released) before this returns, on success and on error alike.
pub fn with_session<F, T>(
    factory: &F,
    config: &RepositoryConfig,
    f: impl FnOnce(&F::Session) -> crate::Result<T>,
) -> crate::Result<T>
where
    F: SessionFactory + ?Sized,
{
    let session = factory.open(config)?;
    let result = f(&session);
    drop(session);
    tracing::trace!("repository session released");
    result
}
