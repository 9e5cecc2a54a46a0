//! Shared data models for passferry
//!
//! This module contains the canonical field model every destination encoder
//! consumes, and the source export model it is built from.

pub mod field;
pub mod source;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use field::*;
pub use source::*;

/// One piece of secret data, independent of any destination encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalField {
    /// Field name as it should appear in the destination
    pub key: String,

    /// Raw value; attachments carry arbitrary bytes
    pub value: Vec<u8>,

    /// Semantic kind, decides how encoders render the field
    pub kind: FieldKind,

    /// Whether the value spans several lines
    pub multiline: bool,

    /// Whether the value must be protected or masked
    pub sensitive: bool,
}

/// Kinds of canonical fields
///
/// Encoders that have no special rendering for a kind treat it as `Simple`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Display title of the secret
    Title,

    /// Login or account name
    Username,

    /// Password (always sensitive)
    Password,

    /// URL/website
    Url,

    /// Folder tags rendered as `[a, b]`
    Tags,

    /// Plain single-line key/value
    Simple,

    /// Free text, rendered in a trailing notes section
    Multiline,

    /// Binary payload stored beside the primary secret
    Attachment,
}

impl FieldKind {
    /// Stable lowercase name used in logs and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Title => "title",
            FieldKind::Username => "username",
            FieldKind::Password => "password",
            FieldKind::Url => "url",
            FieldKind::Tags => "tags",
            FieldKind::Simple => "simple",
            FieldKind::Multiline => "multiline",
            FieldKind::Attachment => "attachment",
        }
    }

    /// Default key for kinds that have one
    pub fn default_key(&self) -> Option<&'static str> {
        match self {
            FieldKind::Title => Some("title"),
            FieldKind::Username => Some("username"),
            FieldKind::Password => Some("password"),
            FieldKind::Url => Some("url"),
            FieldKind::Tags => Some("tags"),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl CanonicalField {
    /// Create a field, falling back to the kind's default key when `key` is empty
    pub fn new<K: Into<String>, V: Into<Vec<u8>>>(
        key: K,
        value: V,
        kind: FieldKind,
        multiline: bool,
        sensitive: bool,
    ) -> Self {
        let mut key = key.into();
        if key.is_empty() {
            if let Some(default) = kind.default_key() {
                key = default.to_string();
            }
        }

        Self {
            key,
            value: value.into(),
            kind,
            multiline,
            sensitive,
        }
    }

    /// Value as text, replacing invalid UTF-8 sequences
    pub fn value_str(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    /// Whether encoders should route this field into the notes section
    pub fn is_multiline(&self) -> bool {
        self.multiline || self.kind == FieldKind::Multiline
    }

    /// Whether the field carries nothing worth emitting
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() || self.value.is_empty()
    }
}
