//! Field constructors and helpers for canonical fields
//!
//! The mapper builds fields through these helpers so that kind, sensitivity
//! and default keys stay consistent across the crate.

use super::{CanonicalField, FieldKind};

impl CanonicalField {
    /// Title field keyed `title`
    pub fn title<V: Into<Vec<u8>>>(value: V) -> Self {
        Self::new("", value, FieldKind::Title, false, false)
    }

    /// Username field with an explicit key
    pub fn username<K: Into<String>, V: Into<Vec<u8>>>(key: K, value: V) -> Self {
        Self::new(key, value, FieldKind::Username, false, false)
    }

    /// Password field; always sensitive
    pub fn password<K: Into<String>, V: Into<Vec<u8>>>(key: K, value: V) -> Self {
        Self::new(key, value, FieldKind::Password, false, true)
    }

    /// URL field
    pub fn url<K: Into<String>, V: Into<Vec<u8>>>(key: K, value: V, sensitive: bool) -> Self {
        Self::new(key, value, FieldKind::Url, false, sensitive)
    }

    /// Tags field rendered as `[a, b, c]`
    pub fn tags<S: AsRef<str>>(names: &[S]) -> Self {
        let joined = names
            .iter()
            .map(|n| n.as_ref())
            .collect::<Vec<_>>()
            .join(", ");
        Self::new("", format!("[{}]", joined), FieldKind::Tags, false, false)
    }

    /// Plain single-line field
    pub fn simple<K: Into<String>, V: Into<Vec<u8>>>(key: K, value: V, sensitive: bool) -> Self {
        Self::new(key, value, FieldKind::Simple, false, sensitive)
    }

    /// Free text field routed into the notes section
    pub fn multiline<K: Into<String>, V: Into<Vec<u8>>>(key: K, value: V, sensitive: bool) -> Self {
        Self::new(key, value, FieldKind::Multiline, true, sensitive)
    }

    /// Binary attachment keyed by its file name
    pub fn attachment<K: Into<String>, V: Into<Vec<u8>>>(name: K, data: V) -> Self {
        Self::new(name, data, FieldKind::Attachment, false, false)
    }
}

/// Helpers over field lists
pub struct FieldUtils;

impl FieldUtils {
    /// Whether any field in the list is sensitive
    pub fn any_sensitive(fields: &[CanonicalField]) -> bool {
        fields.iter().any(|f| f.sensitive)
    }
}
