//! KeePass-style entry encoding
//!
//! Canonical fields land in the standard entry slots where one exists and
//! is still free, otherwise in custom string fields. Multiline text is
//! appended to `Notes` and attachments become entry binaries.

use base64::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EncodeError;
use crate::models::{CanonicalField, FieldKind};

pub const TITLE: &str = "Title";
pub const USERNAME: &str = "UserName";
pub const PASSWORD: &str = "Password";
pub const URL: &str = "URL";
pub const TAGS: &str = "Tags";
pub const NOTES: &str = "Notes";

/// Standard slot for a field kind, if the kind has one
fn standard_slot(kind: FieldKind) -> Option<&'static str> {
    match kind {
        FieldKind::Title => Some(TITLE),
        FieldKind::Username => Some(USERNAME),
        FieldKind::Password => Some(PASSWORD),
        FieldKind::Url => Some(URL),
        FieldKind::Tags => Some(TAGS),
        _ => None,
    }
}

/// String value of an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryValue {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub protected: bool,
}

/// Binary attached to an entry; serialized as base64
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryBinary {
    pub name: String,
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub data: Vec<u8>,
}

fn to_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64_STANDARD.encode(data))
}

fn from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    BASE64_STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

/// One database entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepassEntry {
    #[serde(default)]
    pub values: Vec<EntryValue>,

    #[serde(default)]
    pub binaries: Vec<EntryBinary>,
}

impl KeepassEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.key == key)
            .map(|v| v.value.as_str())
    }

    pub fn is_protected(&self, key: &str) -> bool {
        self.values.iter().any(|v| v.key == key && v.protected)
    }

    /// Set a value, replacing any existing value under the same key
    pub fn set(&mut self, key: &str, value: &str, protected: bool) {
        if key.is_empty() || value.is_empty() {
            return;
        }

        match self.values.iter_mut().find(|v| v.key == key) {
            Some(existing) => {
                existing.value = value.to_string();
                existing.protected = protected;
            }
            None => self.values.push(EntryValue {
                key: key.to_string(),
                value: value.to_string(),
                protected,
            }),
        }
    }

    /// Set `key` when it is still empty, otherwise `alt_key`
    pub fn set_or_alt(&mut self, key: &str, alt_key: &str, value: &str, protected: bool) {
        if self.get(key).map_or(true, str::is_empty) {
            self.set(key, value, protected);
        } else {
            self.set(alt_key, value, protected);
        }
    }

    /// Append a `key\n\nvalue\n` block to the notes
    pub fn append_note(&mut self, key: &str, value: &str) {
        let mut notes = self.get(NOTES).unwrap_or_default().to_string();
        notes.push_str(&format!("{}\n\n{}\n", key, value));
        self.set(NOTES, &notes, false);
    }

    pub fn title(&self) -> Option<&str> {
        self.get(TITLE)
    }

    pub fn binary(&self, name: &str) -> Option<&[u8]> {
        self.binaries
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.data.as_slice())
    }

    /// Attach a binary, replacing one with the same name
    pub fn add_binary(&mut self, name: &str, data: &[u8]) {
        match self.binaries.iter_mut().find(|b| b.name == name) {
            Some(existing) => existing.data = data.to_vec(),
            None => self.binaries.push(EntryBinary {
                name: name.to_string(),
                data: data.to_vec(),
            }),
        }
    }
}

/// Encoder for KeePass-style databases
pub struct KeepassEncoder;

impl KeepassEncoder {
    pub fn encode(fields: &[CanonicalField]) -> Result<KeepassEntry, EncodeError> {
        let mut entry = KeepassEntry::new();

        for field in fields {
            if field.is_empty() {
                continue;
            }

            if field.kind == FieldKind::Attachment {
                if field.multiline {
                    return Err(EncodeError::InvalidFieldKind {
                        key: field.key.clone(),
                        kind: "multiline attachment".to_string(),
                    });
                }
                entry.add_binary(&field.key, &field.value);
                continue;
            }

            let value = field.value_str();
            if field.is_multiline() {
                entry.append_note(&field.key, &value);
                continue;
            }

            match standard_slot(field.kind) {
                Some(slot) => {
                    let protected = field.sensitive || field.kind == FieldKind::Password;
                    entry.set_or_alt(slot, &field.key, &value, protected);
                }
                None => entry.set(&field.key, &value, field.sensitive),
            }
        }

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_standard_slots() {
        let fields = vec![
            CanonicalField::title("Bank"),
            CanonicalField::username("subtitle", "alice"),
            CanonicalField::password("password", "secret"),
            CanonicalField::url("website", "https://bank.example", false),
            CanonicalField::tags(&["work"]),
        ];
        let entry = KeepassEncoder::encode(&fields).unwrap();

        assert_eq!(entry.title(), Some("Bank"));
        assert_eq!(entry.get(USERNAME), Some("alice"));
        assert_eq!(entry.get(PASSWORD), Some("secret"));
        assert!(entry.is_protected(PASSWORD));
        assert_eq!(entry.get(URL), Some("https://bank.example"));
        assert_eq!(entry.get(TAGS), Some("[work]"));
    }

    #[test]
    fn test_taken_slot_falls_back_to_own_key() {
        let fields = vec![
            CanonicalField::password("password", "first"),
            CanonicalField::password("pin", "1234"),
            CanonicalField::url("url", "https://a", false),
            CanonicalField::url("backup_site", "https://b", false),
        ];
        let entry = KeepassEncoder::encode(&fields).unwrap();

        assert_eq!(entry.get(PASSWORD), Some("first"));
        assert_eq!(entry.get("pin"), Some("1234"));
        assert!(entry.is_protected("pin"));
        assert_eq!(entry.get("backup_site"), Some("https://b"));
    }

    #[test]
    fn test_notes_and_custom_fields() {
        let fields = vec![
            CanonicalField::multiline("note", "hello", false),
            CanonicalField::multiline("attachment - a.txt", "file text", false),
            CanonicalField::simple("category", "finance", false),
            CanonicalField::simple("cvv", "123", true),
        ];
        let entry = KeepassEncoder::encode(&fields).unwrap();

        assert_eq!(
            entry.get(NOTES),
            Some("note\n\nhello\nattachment - a.txt\n\nfile text\n")
        );
        assert_eq!(entry.get("category"), Some("finance"));
        assert!(!entry.is_protected("category"));
        assert!(entry.is_protected("cvv"));
    }

    #[test]
    fn test_binaries() {
        let fields = vec![CanonicalField::attachment("id.png", vec![1, 2, 3])];
        let entry = KeepassEncoder::encode(&fields).unwrap();

        assert_eq!(entry.binary("id.png"), Some(&[1u8, 2, 3][..]));
        assert!(entry.values.is_empty());
    }

    #[test]
    fn test_multiline_attachment_rejected() {
        let mut field = CanonicalField::attachment("scan.pdf", vec![1]);
        field.multiline = true;

        assert_matches!(
            KeepassEncoder::encode(&[field]),
            Err(EncodeError::InvalidFieldKind { .. })
        );
    }

    #[test]
    fn test_binary_serializes_as_base64() {
        let binary = EntryBinary {
            name: "a.bin".to_string(),
            data: vec![0, 1, 2],
        };
        let json = serde_json::to_string(&binary).unwrap();
        assert_eq!(json, r#"{"name":"a.bin","data":"AAEC"}"#);

        let back: EntryBinary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, binary);
    }
}
