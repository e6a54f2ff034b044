//! Consistency handlers: one per category of repository change
//!
//! Every handler follows the same shape. If the target document is already
//! indexed, patch the fields the event affects. Otherwise build the whole
//! document from repository state and create it. Nothing is ever merged.

use crate::builder::{build_document, current_acl, modified_stamp};
use crate::crawler::crawl;
use crate::document::{Document, FieldPatch, TypeCollection};
use crate::error::SyncError;
use crate::event::ChangeEvent;
use crate::path::{basename, canonicalize, like_matcher, parent};
use crate::repository::{Entry, EntryKind, RepositoryReader};
use crate::store::{create_document, DocumentStore};
use tracing::debug;

/// Applies one category of change event to the index.
pub trait Handler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn handle(
        &self,
        session: &dyn RepositoryReader,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> crate::Result<()>;
}

/// Which payload field names the entity a handler works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Entity,
    Destination,
}

impl Target {
    fn path(self, event: &ChangeEvent) -> crate::Result<String> {
        match self {
            Self::Entity => event.entity_path(),
            Self::Destination => event.destination_path(),
        }
    }
}

/// Where a parent's new `dateModified` comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentStamp {
    /// Stamp taken from the child, e.g. its `dateCreated`
    Child(String),
    /// The parent's own modification time in the repository
    Repository,
}

/// Build the document for `entry` and write it, patching every field when
/// the id is already indexed.
pub fn index_at(
    session: &dyn RepositoryReader,
    store: &dyn DocumentStore,
    entry: &Entry,
) -> crate::Result<Document> {
    let doc = build_document(session, entry)?;
    if store.exists(doc.kind(), doc.id())? {
        store.patch(doc.kind(), doc.id(), &doc.to_full_patch()?)?;
        debug!(kind = %doc.kind(), id = doc.id(), "reindexed existing document");
    } else {
        create_document(store, &doc)?;
        debug!(kind = %doc.kind(), id = doc.id(), "created document");
    }
    Ok(doc)
}

/// Patch `path` with the fields `patch` produces, or build and create the
/// whole document from repository state if it is not indexed yet.
pub fn patch_or_create(
    session: &dyn RepositoryReader,
    store: &dyn DocumentStore,
    kind: TypeCollection,
    path: &str,
    patch: impl FnOnce() -> crate::Result<FieldPatch>,
) -> crate::Result<()> {
    if store.exists(kind, path)? {
        store.patch(kind, path, &patch()?)?;
        debug!(kind = %kind, id = path, "patched document");
    } else {
        let entry = session.stat(path)?;
        create_document(store, &build_document(session, &entry)?)?;
        debug!(kind = %kind, id = path, "document was not indexed, created it");
    }
    Ok(())
}

/// Stamp the parent collection of `child` with a new `dateModified`.
///
/// No-op for the root and for parents the repository no longer has. A
/// parent that exists but is not indexed is created first.
pub fn update_parent_modify_time(
    session: &dyn RepositoryReader,
    store: &dyn DocumentStore,
    child: &str,
    stamp: ParentStamp,
) -> crate::Result<()> {
    let Some(parent) = parent(child) else {
        return Ok(());
    };
    if !session.exists(&parent)? {
        debug!(parent = %parent, "parent not in repository, skipping touch");
        return Ok(());
    }

    if !store.exists(TypeCollection::Folder, &parent)? {
        let entry = session.stat(&parent)?;
        create_document(store, &build_document(session, &entry)?)?;
    }

    let stamp = match stamp {
        ParentStamp::Child(stamp) => stamp,
        ParentStamp::Repository => modified_stamp(session, &parent)?,
    };
    store.patch(
        TypeCollection::Folder,
        &parent,
        &FieldPatch::new().date_modified(&stamp),
    )?;
    debug!(parent = %parent, stamp = %stamp, "touched parent");
    Ok(())
}

/// Entry for an add event. Creator, size and type come from the payload;
/// the repository is only asked when the payload lacks them.
fn entry_from_event(
    session: &dyn RepositoryReader,
    event: &ChangeEvent,
    path: String,
    kind: EntryKind,
) -> crate::Result<Entry> {
    let complete = event.creator.is_some()
        && (kind == EntryKind::Collection
            || (event.size.is_some() && event.file_type.is_some()));
    let mut entry = if complete {
        Entry {
            path,
            kind,
            creator: String::new(),
            size: 0,
            file_type: String::new(),
        }
    } else {
        session.stat(&path)?
    };

    if let Some(creator) = &event.creator {
        entry.creator = creator.clone();
    }
    if kind == EntryKind::DataObject {
        if let Some(size) = event.size {
            entry.size = size;
        }
        if let Some(file_type) = &event.file_type {
            entry.file_type = file_type.clone();
        }
    }
    Ok(entry)
}

fn add_entity(
    session: &dyn RepositoryReader,
    store: &dyn DocumentStore,
    event: &ChangeEvent,
    path: String,
    kind: EntryKind,
) -> crate::Result<()> {
    let entry = entry_from_event(session, event, path, kind)?;
    let doc = index_at(session, store, &entry)?;
    let created = doc.base().date_created.clone();
    update_parent_modify_time(session, store, doc.id(), ParentStamp::Child(created))
}

/// `collection.add`
pub struct AddCollection;

impl Handler for AddCollection {
    fn name(&self) -> &'static str {
        "add-collection"
    }

    fn handle(
        &self,
        session: &dyn RepositoryReader,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> crate::Result<()> {
        add_entity(session, store, event, event.entity_path()?, EntryKind::Collection)
    }
}

/// `data-object.add` (entity) and `data-object.cp` (destination)
pub struct AddDataObject {
    pub target: Target,
}

impl Handler for AddDataObject {
    fn name(&self) -> &'static str {
        match self.target {
            Target::Entity => "add-data-object",
            Target::Destination => "copy-data-object",
        }
    }

    fn handle(
        &self,
        session: &dyn RepositoryReader,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> crate::Result<()> {
        let path = self.target.path(event)?;
        add_entity(session, store, event, path, EntryKind::DataObject)
    }
}

/// `collection.rm` and `data-object.rm`. Only the entity's own document
/// is deleted; descendants of a removed collection are left in place.
pub struct Remove {
    pub kind: TypeCollection,
}

impl Handler for Remove {
    fn name(&self) -> &'static str {
        match self.kind {
            TypeCollection::Folder => "remove-collection",
            TypeCollection::File => "remove-data-object",
        }
    }

    fn handle(
        &self,
        session: &dyn RepositoryReader,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> crate::Result<()> {
        let path = event.entity_path()?;
        let removed = store.remove(self.kind, &path)?;
        debug!(kind = %self.kind, id = %path, removed, "removed document");
        update_parent_modify_time(session, store, &path, ParentStamp::Repository)
    }
}

/// Touch the old parent, and the new one when the move changed it
fn touch_after_move(
    session: &dyn RepositoryReader,
    store: &dyn DocumentStore,
    old: &str,
    new: &str,
) -> crate::Result<()> {
    update_parent_modify_time(session, store, old, ParentStamp::Repository)?;
    if parent(old) != parent(new) {
        update_parent_modify_time(session, store, new, ParentStamp::Repository)?;
    }
    Ok(())
}

/// `collection.mv`: drop the old subtree, reindex the new one
pub struct RenameCollection;

impl Handler for RenameCollection {
    fn name(&self) -> &'static str {
        "rename-collection"
    }

    fn handle(
        &self,
        session: &dyn RepositoryReader,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> crate::Result<()> {
        let old = event.entity_path()?;
        let new = event.new_path()?;

        let removed = store.remove_by_prefix(&old)?;
        debug!(from = %old, removed, "removed documents under old path");

        index_at(session, store, &session.stat(&new)?)?;
        crawl(
            session,
            &new,
            |collection| index_at(session, store, collection).map(drop),
            |object| index_at(session, store, object).map(drop),
        )?;

        touch_after_move(session, store, &old, &new)
    }
}

/// `data-object.mv`
pub struct RenameDataObject;

impl Handler for RenameDataObject {
    fn name(&self) -> &'static str {
        "rename-data-object"
    }

    fn handle(
        &self,
        session: &dyn RepositoryReader,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> crate::Result<()> {
        let old = event.entity_path()?;
        let new = event.new_path()?;

        store.remove(TypeCollection::File, &old)?;
        index_at(session, store, &session.stat(&new)?)?;
        touch_after_move(session, store, &old, &new)
    }
}

fn refresh_metadata(
    session: &dyn RepositoryReader,
    store: &dyn DocumentStore,
    kind: TypeCollection,
    path: &str,
) -> crate::Result<()> {
    patch_or_create(session, store, kind, path, || {
        FieldPatch::new().metadata(&session.metadata_of(path)?)
    })
}

/// `*.metadata.{add,adda,mod,rm,rmw,set}` on `entity`, `*.metadata.cp` on
/// `destination`
pub struct MetadataChange {
    pub kind: TypeCollection,
    pub target: Target,
}

impl Handler for MetadataChange {
    fn name(&self) -> &'static str {
        match (self.kind, self.target) {
            (TypeCollection::Folder, Target::Entity) => "collection-metadata",
            (TypeCollection::Folder, Target::Destination) => "collection-metadata-copy",
            (TypeCollection::File, Target::Entity) => "data-object-metadata",
            (TypeCollection::File, Target::Destination) => "data-object-metadata-copy",
        }
    }

    fn handle(
        &self,
        session: &dyn RepositoryReader,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> crate::Result<()> {
        let path = self.target.path(event)?;
        refresh_metadata(session, store, self.kind, &path)
    }
}

/// `data-object.metadata.addw`: refresh metadata on every data object in
/// the pattern's collection whose name matches its last segment
pub struct MetadataGlob;

impl Handler for MetadataGlob {
    fn name(&self) -> &'static str {
        "data-object-metadata-glob"
    }

    fn handle(
        &self,
        session: &dyn RepositoryReader,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> crate::Result<()> {
        let pattern = canonicalize(event.pattern()?);
        let collection = parent(&pattern)
            .ok_or_else(|| SyncError::InvalidPattern(format!("{}: no collection", pattern)))?;
        let matcher = like_matcher(&basename(&pattern))?;

        let mut matched = 0usize;
        for object in session.child_data_objects(&collection)? {
            if matcher.is_match(&basename(&object.path)) {
                refresh_metadata(session, store, TypeCollection::File, &object.path)?;
                matched += 1;
            }
        }
        debug!(pattern = %pattern, matched, "applied metadata to matching objects");
        Ok(())
    }
}

fn refresh_acl(
    session: &dyn RepositoryReader,
    store: &dyn DocumentStore,
    kind: TypeCollection,
    path: &str,
) -> crate::Result<()> {
    patch_or_create(session, store, kind, path, || {
        FieldPatch::new().user_permissions(&current_acl(session, path)?)
    })
}

/// `data-object.acl.mod`
pub struct DataObjectAcl;

impl Handler for DataObjectAcl {
    fn name(&self) -> &'static str {
        "data-object-acl"
    }

    fn handle(
        &self,
        session: &dyn RepositoryReader,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> crate::Result<()> {
        refresh_acl(session, store, TypeCollection::File, &event.entity_path()?)
    }
}

/// `collection.acl.mod`, optionally applied to the whole subtree
pub struct CollectionAcl;

impl Handler for CollectionAcl {
    fn name(&self) -> &'static str {
        "collection-acl"
    }

    fn handle(
        &self,
        session: &dyn RepositoryReader,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> crate::Result<()> {
        let path = event.entity_path()?;
        if event.permission.is_none() {
            debug!(entity = %path, "acl event without permission, nothing to do");
            return Ok(());
        }

        refresh_acl(session, store, TypeCollection::Folder, &path)?;
        if event.recursive {
            crawl(
                session,
                &path,
                |collection| refresh_acl(session, store, TypeCollection::Folder, &collection.path),
                |object| refresh_acl(session, store, TypeCollection::File, &object.path),
            )?;
        }
        Ok(())
    }
}

/// `data-object.mod` and, with `with_type`, `data-object.sys-metadata.mod`
pub struct SizeChange {
    pub with_type: bool,
}

impl Handler for SizeChange {
    fn name(&self) -> &'static str {
        if self.with_type {
            "data-object-sys-metadata"
        } else {
            "data-object-size"
        }
    }

    fn handle(
        &self,
        session: &dyn RepositoryReader,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> crate::Result<()> {
        let path = event.entity_path()?;

        if !store.exists(TypeCollection::File, &path)? {
            let entry = entry_from_event(session, event, path, EntryKind::DataObject)?;
            create_document(store, &build_document(session, &entry)?)?;
            debug!(id = %entry.path, "data object was not indexed, created it");
            return Ok(());
        }

        let needs_stat = event.size.is_none() || (self.with_type && event.file_type.is_none());
        let current = if needs_stat {
            Some(session.stat(&path)?)
        } else {
            None
        };

        let size = event
            .size
            .or(current.as_ref().map(|e| e.size))
            .unwrap_or_default();
        let mut patch = FieldPatch::new()
            .date_modified(&modified_stamp(session, &path)?)
            .file_size(size);
        if self.with_type {
            let file_type = event
                .file_type
                .clone()
                .or(current.map(|e| e.file_type))
                .unwrap_or_default();
            patch = patch.file_type(&file_type);
        }

        store.patch(TypeCollection::File, &path, &patch)?;
        debug!(id = %path, size, "patched size");
        Ok(())
    }
}

pub static ADD_COLLECTION: AddCollection = AddCollection;
pub static ADD_DATA_OBJECT: AddDataObject = AddDataObject {
    target: Target::Entity,
};
pub static COPY_DATA_OBJECT: AddDataObject = AddDataObject {
    target: Target::Destination,
};
pub static REMOVE_COLLECTION: Remove = Remove {
    kind: TypeCollection::Folder,
};
pub static REMOVE_DATA_OBJECT: Remove = Remove {
    kind: TypeCollection::File,
};
pub static RENAME_COLLECTION: RenameCollection = RenameCollection;
pub static RENAME_DATA_OBJECT: RenameDataObject = RenameDataObject;
pub static COLLECTION_METADATA: MetadataChange = MetadataChange {
    kind: TypeCollection::Folder,
    target: Target::Entity,
};
pub static COLLECTION_METADATA_COPY: MetadataChange = MetadataChange {
    kind: TypeCollection::Folder,
    target: Target::Destination,
};
pub static DATA_OBJECT_METADATA: MetadataChange = MetadataChange {
    kind: TypeCollection::File,
    target: Target::Entity,
};
pub static DATA_OBJECT_METADATA_COPY: MetadataChange = MetadataChange {
    kind: TypeCollection::File,
    target: Target::Destination,
};
pub static DATA_OBJECT_METADATA_GLOB: MetadataGlob = MetadataGlob;
pub static DATA_OBJECT_ACL: DataObjectAcl = DataObjectAcl;
pub static COLLECTION_ACL: CollectionAcl = CollectionAcl;
pub static DATA_OBJECT_SIZE: SizeChange = SizeChange { with_type: false };
pub static DATA_OBJECT_SYS_METADATA: SizeChange = SizeChange { with_type: true };
