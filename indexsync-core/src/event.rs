//! Change events delivered by the repository's event bus

use crate::error::SyncError;
use crate::path::canonicalize;
use serde::{Deserialize, Serialize};

/// Every routing key the repository publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CollectionAdd,
    CollectionRm,
    CollectionMv,
    CollectionAclMod,
    CollectionMetadataAdd,
    CollectionMetadataAddA,
    CollectionMetadataCp,
    CollectionMetadataMod,
    CollectionMetadataRm,
    CollectionMetadataRmW,
    CollectionMetadataSet,
    DataObjectAdd,
    DataObjectCp,
    DataObjectMv,
    DataObjectRm,
    DataObjectMod,
    DataObjectAclMod,
    DataObjectSysMetadataMod,
    DataObjectMetadataAdd,
    DataObjectMetadataAddA,
    DataObjectMetadataAddW,
    DataObjectMetadataCp,
    DataObjectMetadataMod,
    DataObjectMetadataRm,
    DataObjectMetadataRmW,
    DataObjectMetadataSet,
    ZoneMv,
}

impl EventKind {
    pub const ALL: [EventKind; 27] = [
        Self::CollectionAdd,
        Self::CollectionRm,
        Self::CollectionMv,
        Self::CollectionAclMod,
        Self::CollectionMetadataAdd,
        Self::CollectionMetadataAddA,
        Self::CollectionMetadataCp,
        Self::CollectionMetadataMod,
        Self::CollectionMetadataRm,
        Self::CollectionMetadataRmW,
        Self::CollectionMetadataSet,
        Self::DataObjectAdd,
        Self::DataObjectCp,
        Self::DataObjectMv,
        Self::DataObjectRm,
        Self::DataObjectMod,
        Self::DataObjectAclMod,
        Self::DataObjectSysMetadataMod,
        Self::DataObjectMetadataAdd,
        Self::DataObjectMetadataAddA,
        Self::DataObjectMetadataAddW,
        Self::DataObjectMetadataCp,
        Self::DataObjectMetadataMod,
        Self::DataObjectMetadataRm,
        Self::DataObjectMetadataRmW,
        Self::DataObjectMetadataSet,
        Self::ZoneMv,
    ];

    /// Parse a routing key. Returns `None` for keys the repository does not publish.
    pub fn parse(routing_key: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == routing_key)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CollectionAdd => "collection.add",
            Self::CollectionRm => "collection.rm",
            Self::CollectionMv => "collection.mv",
            Self::CollectionAclMod => "collection.acl.mod",
            Self::CollectionMetadataAdd => "collection.metadata.add",
            Self::CollectionMetadataAddA => "collection.metadata.adda",
            Self::CollectionMetadataCp => "collection.metadata.cp",
            Self::CollectionMetadataMod => "collection.metadata.mod",
            Self::CollectionMetadataRm => "collection.metadata.rm",
            Self::CollectionMetadataRmW => "collection.metadata.rmw",
            Self::CollectionMetadataSet => "collection.metadata.set",
            Self::DataObjectAdd => "data-object.add",
            Self::DataObjectCp => "data-object.cp",
            Self::DataObjectMv => "data-object.mv",
            Self::DataObjectRm => "data-object.rm",
            Self::DataObjectMod => "data-object.mod",
            Self::DataObjectAclMod => "data-object.acl.mod",
            Self::DataObjectSysMetadataMod => "data-object.sys-metadata.mod",
            Self::DataObjectMetadataAdd => "data-object.metadata.add",
            Self::DataObjectMetadataAddA => "data-object.metadata.adda",
            Self::DataObjectMetadataAddW => "data-object.metadata.addw",
            Self::DataObjectMetadataCp => "data-object.metadata.cp",
            Self::DataObjectMetadataMod => "data-object.metadata.mod",
            Self::DataObjectMetadataRm => "data-object.metadata.rm",
            Self::DataObjectMetadataRmW => "data-object.metadata.rmw",
            Self::DataObjectMetadataSet => "data-object.metadata.set",
            Self::ZoneMv => "zone.mv",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ACL change carried by `*.acl.mod` events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionChange {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub permission: String,
}

/// The `permission` field as publishers send it. Only its presence matters
/// to the handlers, so any JSON shape is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionPayload {
    Change(PermissionChange),
    Level(String),
    Other(serde_json::Value),
}

impl From<PermissionChange> for PermissionPayload {
    fn from(change: PermissionChange) -> Self {
        Self::Change(change)
    }
}

/// Payload of a repository change event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: Option<String>,
    pub destination: Option<String>,
    #[serde(rename = "newPath", alias = "new_path", alias = "new-path")]
    pub new_path: Option<String>,
    pub creator: Option<String>,
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    pub permission: Option<PermissionPayload>,
    #[serde(default)]
    pub recursive: bool,
    pub pattern: Option<String>,
}

impl ChangeEvent {
    /// Event about a single entity
    pub fn for_entity(entity: impl Into<String>) -> Self {
        Self {
            entity: Some(entity.into()),
            ..Self::default()
        }
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = Some(file_type.into());
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_new_path(mut self, new_path: impl Into<String>) -> Self {
        self.new_path = Some(new_path.into());
        self
    }

    pub fn with_permission(
        mut self,
        change: impl Into<PermissionPayload>,
        recursive: bool,
    ) -> Self {
        self.permission = Some(change.into());
        self.recursive = recursive;
        self
    }

    /// Canonical path of the event's subject
    pub fn entity_path(&self) -> crate::Result<String> {
        required(&self.entity, "entity")
    }

    /// Canonical copy target
    pub fn destination_path(&self) -> crate::Result<String> {
        required(&self.destination, "destination")
    }

    /// Canonical rename target. Falls back to `destination` for publishers
    /// that reuse it for moves.
    pub fn new_path(&self) -> crate::Result<String> {
        match (&self.new_path, &self.destination) {
            (Some(path), _) | (None, Some(path)) => Ok(canonicalize(path)),
            (None, None) => Err(SyncError::MissingField("newPath")),
        }
    }

    pub fn pattern(&self) -> crate::Result<&str> {
        self.pattern
            .as_deref()
            .ok_or(SyncError::MissingField("pattern"))
    }
}

fn required(field: &Option<String>, name: &'static str) -> crate::Result<String> {
    field
        .as_deref()
        .map(canonicalize)
        .ok_or(SyncError::MissingField(name))
}

/// Routing key plus payload, the shape events arrive in over HTTP and in replay logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub routing_key: String,
    #[serde(alias = "payload")]
    pub event: ChangeEvent,
}
