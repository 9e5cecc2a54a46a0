//! Source export model
//!
//! Mirrors the JSON layout of an Enpass export. Flags are stored as the
//! 0/1 integers the export uses; the accessor methods turn them into bools.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::transliterate::normalize;

/// Complete export file: folder table plus items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportData {
    #[serde(default)]
    pub folders: Vec<SourceFolder>,

    #[serde(default)]
    pub items: Vec<SourceItem>,
}

impl ExportData {
    /// Build the folder lookup table for this export
    pub fn folders_map(&self) -> FoldersMap {
        FoldersMap::from_folders(&self.folders)
    }
}

/// Folder definition from the export's folder table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFolder {
    #[serde(default)]
    pub uuid: String,

    #[serde(default)]
    pub title: String,
}

/// One exported record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    #[serde(default)]
    pub trashed: u8,

    #[serde(default)]
    pub archived: u8,

    #[serde(default)]
    pub favorite: u8,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub subtitle: String,

    #[serde(default)]
    pub note: String,

    #[serde(default)]
    pub fields: Vec<SourceField>,

    /// Folder uuids, resolved through [`FoldersMap`]
    #[serde(default)]
    pub folders: Vec<String>,

    #[serde(default)]
    pub attachments: Vec<SourceAttachment>,
}

impl SourceItem {
    pub fn is_trashed(&self) -> bool {
        self.trashed == 1
    }

    pub fn is_archived(&self) -> bool {
        self.archived == 1
    }

    pub fn is_favorite(&self) -> bool {
        self.favorite == 1
    }

    /// Normalized category segment
    pub fn category_segment(&self) -> String {
        normalize(&self.category)
    }

    /// Normalized title segment
    pub fn title_segment(&self) -> String {
        normalize(&self.title)
    }
}

/// Labeled field inside an item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceField {
    #[serde(default)]
    pub deleted: u8,

    #[serde(default, rename = "type")]
    pub field_type: String,

    #[serde(default)]
    pub sensitive: u8,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub value: String,
}

impl SourceField {
    /// Field types that never carry secret data
    pub const IGNORED_TYPES: &'static [&'static str] = &["section", ".Android#"];

    pub fn is_deleted(&self) -> bool {
        self.deleted == 1
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive == 1
    }

    pub fn is_multiline(&self) -> bool {
        self.field_type == "multiline"
    }

    pub fn is_ignored(&self) -> bool {
        Self::IGNORED_TYPES.contains(&self.field_type.as_str())
    }

    /// Normalized label used as the field key
    pub fn label_key(&self) -> String {
        normalize(&self.label)
    }
}

/// File attached to an item, payload base64 encoded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttachment {
    #[serde(default)]
    pub data: String,

    /// MIME hint from the export, may be empty
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub name: String,
}

/// Folder uuid to normalized folder name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldersMap {
    names: HashMap<String, String>,
}

impl FoldersMap {
    /// Build the map from the export's folder table, normalizing every title
    pub fn from_folders(folders: &[SourceFolder]) -> Self {
        let names = folders
            .iter()
            .map(|f| (f.uuid.clone(), normalize(&f.title)))
            .collect();
        Self { names }
    }

    /// Normalized name for a folder uuid
    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(|s| s.as_str())
    }

    /// Resolve a list of uuids, dropping unknown ids and empty names
    pub fn resolve(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.get(id))
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
            .collect()
    }

    /// Name of the first folder of the list, if it resolves
    pub fn first(&self, ids: &[String]) -> Option<String> {
        ids.first()
            .and_then(|id| self.get(id))
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_flags_from_json() {
        let json = r#"{"trashed": 1, "archived": 0, "favorite": 1, "title": "Bank"}"#;
        let item: SourceItem = serde_json::from_str(json).unwrap();

        assert!(item.is_trashed());
        assert!(!item.is_archived());
        assert!(item.is_favorite());
        assert!(item.fields.is_empty());
        assert!(item.attachments.is_empty());
    }

    #[test]
    fn test_field_type_rename() {
        let json = r#"{"deleted": 0, "type": "password", "sensitive": 1, "label": "Password", "value": "x"}"#;
        let field: SourceField = serde_json::from_str(json).unwrap();

        assert_eq!(field.field_type, "password");
        assert!(field.is_sensitive());
        assert!(!field.is_ignored());
        assert_eq!(field.label_key(), "password");
    }

    #[test]
    fn test_folders_map_resolution() {
        let folders = vec![
            SourceFolder {
                uuid: "a".to_string(),
                title: "Work Stuff".to_string(),
            },
            SourceFolder {
                uuid: "b".to_string(),
                title: "!!!".to_string(),
            },
        ];
        let map = FoldersMap::from_folders(&folders);

        assert_eq!(map.get("a"), Some("work_stuff"));
        assert_eq!(
            map.resolve(&["a".to_string(), "missing".to_string(), "b".to_string()]),
            vec!["work_stuff".to_string()]
        );
        assert_eq!(map.first(&["missing".to_string()]), None);
        assert_eq!(map.first(&["a".to_string()]), Some("work_stuff".to_string()));
    }
}
