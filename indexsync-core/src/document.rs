//! Index document model for collections and data objects

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Store-level grouping a document lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCollection {
    Folder,
    File,
}

impl TypeCollection {
    pub const ALL: [TypeCollection; 2] = [TypeCollection::Folder, TypeCollection::File];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "folder" => Some(Self::Folder),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

impl std::fmt::Display for TypeCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access level recorded in an ACL entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Own,
    Write,
    Read,
}

impl Permission {
    /// Map a repository access name onto a permission. Unknown names
    /// (including the repository's `null` access) yield `None`.
    pub fn from_access_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "own" => Some(Self::Own),
            "write" | "modify object" | "modify_object" => Some(Self::Write),
            "read" | "read object" | "read_object" => Some(Self::Read),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub username: String,
    pub zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub permission: Permission,
    pub user: UserRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataTriple {
    pub attribute: String,
    pub value: String,
    pub unit: String,
}

impl MetadataTriple {
    pub fn new(
        attribute: impl Into<String>,
        value: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
            unit: unit.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDocument {
    pub id: String,
    pub user_permissions: Vec<AclEntry>,
    pub creator: String,
    pub date_created: String,
    pub date_modified: String,
    pub label: String,
    pub metadata: Vec<MetadataTriple>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataObjectDocument {
    #[serde(flatten)]
    pub base: CollectionDocument,
    pub file_size: u64,
    pub file_type: String,
}

/// A document ready to be written to the store
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Collection(CollectionDocument),
    DataObject(DataObjectDocument),
}

impl Document {
    pub fn kind(&self) -> TypeCollection {
        match self {
            Self::Collection(_) => TypeCollection::Folder,
            Self::DataObject(_) => TypeCollection::File,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn base(&self) -> &CollectionDocument {
        match self {
            Self::Collection(doc) => doc,
            Self::DataObject(doc) => &doc.base,
        }
    }

    pub fn to_json(&self) -> crate::Result<Value> {
        let value = match self {
            Self::Collection(doc) => serde_json::to_value(doc)?,
            Self::DataObject(doc) => serde_json::to_value(doc)?,
        };
        Ok(value)
    }

    /// Patch that rewrites every field except `id` to this document's values.
    pub fn to_full_patch(&self) -> crate::Result<FieldPatch> {
        let mut patch = FieldPatch::new();
        if let Value::Object(fields) = self.to_json()? {
            for (name, value) in fields {
                if name != "id" {
                    patch.fields.insert(name, value);
                }
            }
        }
        Ok(patch)
    }
}

/// Field assignments applied to an existing document, in script style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    fields: Map<String, Value>,
}

impl FieldPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn date_modified(self, stamp: &str) -> Self {
        self.set("dateModified", stamp)
    }

    pub fn file_size(self, size: u64) -> Self {
        self.set("fileSize", size)
    }

    pub fn file_type(self, file_type: &str) -> Self {
        self.set("fileType", file_type)
    }

    pub fn metadata(self, metadata: &[MetadataTriple]) -> crate::Result<Self> {
        let value = serde_json::to_value(metadata)?;
        Ok(self.set("metadata", value))
    }

    pub fn user_permissions(self, acl: &[AclEntry]) -> crate::Result<Self> {
        let value = serde_json::to_value(acl)?;
        Ok(self.set("userPermissions", value))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Apply the assignments onto a JSON document body.
    pub fn apply_to(&self, body: &mut Value) {
        if let Value::Object(map) = body {
            for (name, value) in &self.fields {
                map.insert(name.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_collection() -> CollectionDocument {
        CollectionDocument {
            id: "/z/home/a".to_string(),
            user_permissions: vec![AclEntry {
                permission: Permission::Own,
                user: UserRef {
                    username: "alice".to_string(),
                    zone: "z".to_string(),
                },
            }],
            creator: "alice".to_string(),
            date_created: "2024-01-01T00:00:00.000".to_string(),
            date_modified: "2024-01-01T00:00:00.000".to_string(),
            label: "a".to_string(),
            metadata: vec![MetadataTriple::new("project", "x", "")],
        }
    }

    #[test]
    fn test_access_name_mapping() {
        assert_eq!(Permission::from_access_name("own"), Some(Permission::Own));
        assert_eq!(
            Permission::from_access_name("modify object"),
            Some(Permission::Write)
        );
        assert_eq!(
            Permission::from_access_name("read object"),
            Some(Permission::Read)
        );
        assert_eq!(Permission::from_access_name("null"), None);
        assert_eq!(Permission::from_access_name("delete object"), None);
    }

    #[test]
    fn test_collection_serializes_camel_case() {
        let json = Document::Collection(sample_collection()).to_json().unwrap();
        assert_eq!(json["id"], "/z/home/a");
        assert_eq!(json["label"], "a");
        assert_eq!(json["userPermissions"][0]["permission"], "own");
        assert_eq!(json["userPermissions"][0]["user"]["username"], "alice");
        assert_eq!(json["dateCreated"], "2024-01-01T00:00:00.000");
        assert!(json.get("fileSize").is_none());
    }

    #[test]
    fn test_data_object_flattens_base_fields() {
        let mut base = sample_collection();
        base.id = "/z/home/a/f.txt".to_string();
        base.label = "f.txt".to_string();
        let doc = Document::DataObject(DataObjectDocument {
            base,
            file_size: 120,
            file_type: "text".to_string(),
        });
        let json = doc.to_json().unwrap();
        assert_eq!(json["id"], "/z/home/a/f.txt");
        assert_eq!(json["fileSize"], 120);
        assert_eq!(json["fileType"], "text");
        assert_eq!(doc.kind(), TypeCollection::File);
    }

    #[test]
    fn test_full_patch_excludes_id() {
        let patch = Document::Collection(sample_collection())
            .to_full_patch()
            .unwrap();
        let names: Vec<&str> = patch.fields().map(|(k, _)| k).collect();
        assert!(!names.contains(&"id"));
        assert!(names.contains(&"metadata"));
        assert!(names.contains(&"dateModified"));
    }

    #[test]
    fn test_patch_apply_only_touches_named_fields() {
        let mut body = Document::Collection(sample_collection()).to_json().unwrap();
        FieldPatch::new()
            .date_modified("2024-02-02T00:00:00.000")
            .apply_to(&mut body);
        assert_eq!(body["dateModified"], "2024-02-02T00:00:00.000");
        assert_eq!(body["dateCreated"], "2024-01-01T00:00:00.000");
        assert_eq!(body["label"], "a");
    }
}
