//! Build index documents from repository state

use crate::document::{
    AclEntry, CollectionDocument, DataObjectDocument, Document, Permission, UserRef,
};
use crate::error::SyncError;
use crate::path::basename;
use crate::repository::{Entry, EntryKind, RawAcl, RepositoryReader};
use time::macros::format_description;
use time::OffsetDateTime;

/// Render a repository timestamp (epoch milliseconds) as
/// `yyyy-MM-ddTHH:mm:ss.SSS` in UTC.
pub fn format_timestamp(path: &str, epoch_ms: &str) -> crate::Result<String> {
    let invalid = || SyncError::InvalidTimestamp {
        path: path.to_string(),
        value: epoch_ms.to_string(),
    };
    let millis: i64 = epoch_ms.trim().parse().map_err(|_| invalid())?;
    let at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|_| invalid())?;
    at.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]"
    ))
    .map_err(|_| invalid())
}

/// Normalize raw grants, dropping access levels the index does not track.
pub fn acl_entries(raw: Vec<RawAcl>) -> Vec<AclEntry> {
    raw.into_iter()
        .filter_map(|grant| {
            let permission = Permission::from_access_name(&grant.access)?;
            Some(AclEntry {
                permission,
                user: UserRef {
                    username: grant.user,
                    zone: grant.zone,
                },
            })
        })
        .collect()
}

/// Current ACL of `path` in document form
pub fn current_acl(session: &dyn RepositoryReader, path: &str) -> crate::Result<Vec<AclEntry>> {
    Ok(acl_entries(session.acl_of(path)?))
}

/// Formatted repository modification time of `path`
pub fn modified_stamp(session: &dyn RepositoryReader, path: &str) -> crate::Result<String> {
    format_timestamp(path, &session.modified_date(path)?)
}

/// Formatted repository creation time of `path`
pub fn created_stamp(session: &dyn RepositoryReader, path: &str) -> crate::Result<String> {
    format_timestamp(path, &session.created_date(path)?)
}

pub fn build_collection_doc(
    session: &dyn RepositoryReader,
    entry: &Entry,
) -> crate::Result<CollectionDocument> {
    let path = entry.path.as_str();
    Ok(CollectionDocument {
        id: path.to_string(),
        user_permissions: current_acl(session, path)?,
        creator: entry.creator.clone(),
        date_created: created_stamp(session, path)?,
        date_modified: modified_stamp(session, path)?,
        label: basename(path),
        metadata: session.metadata_of(path)?,
    })
}

/// Data object document. Size, type and creator come from `entry`, which
/// for add events is assembled from the event payload.
pub fn build_data_object_doc(
    session: &dyn RepositoryReader,
    entry: &Entry,
) -> crate::Result<DataObjectDocument> {
    Ok(DataObjectDocument {
        base: build_collection_doc(session, entry)?,
        file_size: entry.size,
        file_type: entry.file_type.clone(),
    })
}

pub fn build_document(session: &dyn RepositoryReader, entry: &Entry) -> crate::Result<Document> {
    match entry.kind {
        EntryKind::Collection => Ok(Document::Collection(build_collection_doc(session, entry)?)),
        EntryKind::DataObject => Ok(Document::DataObject(build_data_object_doc(
            session, entry,
        )?)),
    }
}
