//! In-process repository tree, used for tests and local replays.

use super::{Entry, EntryKind, RawAcl, RepositoryReader, SessionFactory};
use crate::config::RepositoryConfig;
use crate::document::MetadataTriple;
use crate::error::SyncError;
use crate::path::{canonicalize, is_within, parent, rebase};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct Node {
    entry: Entry,
    created_ms: u64,
    modified_ms: u64,
    acl: Vec<RawAcl>,
    metadata: Vec<MetadataTriple>,
}

type Tree = BTreeMap<String, Node>;

/// Mutable repository tree shared by every session it opens.
///
/// Cloning is cheap and clones observe the same tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    tree: Arc<RwLock<Tree>>,
    sessions_opened: Arc<AtomicUsize>,
    sessions_active: Arc<AtomicUsize>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tree> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tree> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of sessions opened so far
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::Relaxed)
    }

    /// Sessions opened and not yet dropped
    pub fn sessions_active(&self) -> usize {
        self.sessions_active.load(Ordering::Relaxed)
    }

    pub fn add_collection(&self, path: &str, creator: &str, timestamp_ms: u64) -> &Self {
        let path = canonicalize(path);
        self.insert(Entry::collection(path, creator), timestamp_ms);
        self
    }

    pub fn add_data_object(
        &self,
        path: &str,
        creator: &str,
        size: u64,
        file_type: &str,
        timestamp_ms: u64,
    ) -> &Self {
        let path = canonicalize(path);
        self.insert(
            Entry::data_object(path, creator, size, file_type),
            timestamp_ms,
        );
        self
    }

    fn insert(&self, entry: Entry, timestamp_ms: u64) {
        let acl = vec![RawAcl::new(entry.creator.clone(), "", "own")];
        self.write().insert(
            entry.path.clone(),
            Node {
                entry,
                created_ms: timestamp_ms,
                modified_ms: timestamp_ms,
                acl,
                metadata: Vec::new(),
            },
        );
    }

    /// Grant (or replace) `user`'s access on `path`
    pub fn grant(&self, path: &str, user: &str, zone: &str, access: &str) -> &Self {
        if let Some(node) = self.write().get_mut(&canonicalize(path)) {
            node.acl.retain(|a| a.user != user);
            node.acl.push(RawAcl::new(user, zone, access));
        }
        self
    }

    pub fn add_metadata(&self, path: &str, triple: MetadataTriple) -> &Self {
        if let Some(node) = self.write().get_mut(&canonicalize(path)) {
            node.metadata.push(triple);
        }
        self
    }

    pub fn set_modified(&self, path: &str, timestamp_ms: u64) -> &Self {
        if let Some(node) = self.write().get_mut(&canonicalize(path)) {
            node.modified_ms = timestamp_ms;
        }
        self
    }

    pub fn set_size(&self, path: &str, size: u64, file_type: &str) -> &Self {
        if let Some(node) = self.write().get_mut(&canonicalize(path)) {
            node.entry.size = size;
            node.entry.file_type = file_type.to_string();
        }
        self
    }

    /// Move `from` and everything beneath it to `to`
    pub fn rename(&self, from: &str, to: &str) -> &Self {
        let mut tree = self.write();
        let moved: Vec<String> = tree
            .keys()
            .filter(|p| is_within(from, p))
            .cloned()
            .collect();
        for old in moved {
            if let (Some(mut node), Some(new)) = (tree.remove(&old), rebase(&old, from, to)) {
                node.entry.path = new.clone();
                tree.insert(new, node);
            }
        }
        self
    }

    /// Remove `path` and everything beneath it
    pub fn remove(&self, path: &str) -> &Self {
        self.write().retain(|p, _| !is_within(path, p));
        self
    }
}

impl SessionFactory for MemoryRepository {
    type Session = MemorySession;

    fn open(&self, config: &RepositoryConfig) -> crate::Result<MemorySession> {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
        Ok(MemorySession {
            repo: self.clone(),
            zone: config.zone.clone(),
        })
    }
}

/// Session over a [`MemoryRepository`]; reads the live tree.
#[derive(Debug)]
pub struct MemorySession {
    repo: MemoryRepository,
    zone: String,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.repo.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }
}

impl MemorySession {
    fn with_node<T>(&self, path: &str, f: impl FnOnce(&Node) -> T) -> crate::Result<T> {
        let path = canonicalize(path);
        let tree = self.repo.read();
        tree.get(&path)
            .map(f)
            .ok_or(SyncError::EntityNotFound(path))
    }

    fn children(&self, path: &str, kind: EntryKind) -> crate::Result<Vec<Entry>> {
        let path = canonicalize(path);
        let tree = self.repo.read();
        Ok(tree
            .values()
            .filter(|n| {
                n.entry.kind == kind && parent(&n.entry.path).as_deref() == Some(path.as_str())
            })
            .map(|n| n.entry.clone())
            .collect())
    }
}

impl RepositoryReader for MemorySession {
    fn exists(&self, path: &str) -> crate::Result<bool> {
        Ok(self.repo.read().contains_key(&canonicalize(path)))
    }

    fn stat(&self, path: &str) -> crate::Result<Entry> {
        self.with_node(path, |n| n.entry.clone())
    }

    fn acl_of(&self, path: &str) -> crate::Result<Vec<RawAcl>> {
        self.with_node(path, |n| {
            n.acl
                .iter()
                .map(|a| RawAcl {
                    zone: if a.zone.is_empty() {
                        self.zone.clone()
                    } else {
                        a.zone.clone()
                    },
                    ..a.clone()
                })
                .collect()
        })
    }

    fn created_date(&self, path: &str) -> crate::Result<String> {
        self.with_node(path, |n| n.created_ms.to_string())
    }

    fn modified_date(&self, path: &str) -> crate::Result<String> {
        self.with_node(path, |n| n.modified_ms.to_string())
    }

    fn metadata_of(&self, path: &str) -> crate::Result<Vec<MetadataTriple>> {
        self.with_node(path, |n| n.metadata.clone())
    }

    fn child_collections(&self, path: &str) -> crate::Result<Vec<Entry>> {
        self.children(path, EntryKind::Collection)
    }

    fn child_data_objects(&self, path: &str) -> crate::Result<Vec<Entry>> {
        self.children(path, EntryKind::DataObject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryRepository {
        let repo = MemoryRepository::new();
        repo.add_collection("/z", "rods", 1_000)
            .add_collection("/z/home", "rods", 1_000)
            .add_collection("/z/home/a", "alice", 2_000)
            .add_collection("/z/home/a/sub", "alice", 2_500)
            .add_collection("/z/home/ab", "bob", 2_600)
            .add_data_object("/z/home/a/f.txt", "alice", 120, "text", 3_000)
            .add_data_object("/z/home/a/sub/g.csv", "alice", 8, "csv", 3_500);
        repo
    }

    #[test]
    fn test_children_are_direct_only() {
        let repo = sample();
        let session = repo.open(&RepositoryConfig::default()).unwrap();
        let colls = session.child_collections("/z/home/a").unwrap();
        assert_eq!(colls.len(), 1);
        assert_eq!(colls[0].path, "/z/home/a/sub");
        let objs = session.child_data_objects("/z/home/a").unwrap();
        assert_eq!(objs.len(), 1);
        assert_eq!(objs[0].path, "/z/home/a/f.txt");
        assert_eq!(repo.sessions_opened(), 1);
        assert_eq!(repo.sessions_active(), 1);
        drop(session);
        assert_eq!(repo.sessions_active(), 0);
    }

    #[test]
    fn test_rename_moves_subtree_only() {
        let repo = sample();
        repo.rename("/z/home/a", "/z/home/b");
        let session = repo.open(&RepositoryConfig::default()).unwrap();
        assert!(!session.exists("/z/home/a").unwrap());
        assert!(session.exists("/z/home/b/sub/g.csv").unwrap());
        assert!(session.exists("/z/home/ab").unwrap());
        assert_eq!(session.stat("/z/home/b/f.txt").unwrap().size, 120);
        assert_eq!(session.created_date("/z/home/b").unwrap(), "2000");
    }

    #[test]
    fn test_missing_entity_is_an_error() {
        let repo = sample();
        let session = repo.open(&RepositoryConfig::default()).unwrap();
        assert!(matches!(
            session.stat("/z/nope"),
            Err(SyncError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_grant_replaces_existing_user() {
        let repo = sample();
        repo.grant("/z/home/a", "bob", "z", "read object")
            .grant("/z/home/a", "bob", "z", "modify object");
        let session = repo.open(&RepositoryConfig::default()).unwrap();
        let acl = session.acl_of("/z/home/a").unwrap();
        assert_eq!(acl.len(), 2);
        assert!(acl.iter().any(|a| a.user == "bob" && a.access == "modify object"));
        let owner = acl.iter().find(|a| a.user == "alice").unwrap();
        assert_eq!(owner.zone, "tempZone", "empty zone falls back to the session zone");
    }
}
