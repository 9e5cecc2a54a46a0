//! Key-value store encoding
//!
//! A [`Bundle`] is the text layout gopass-style stores use for one secret:
//! a password line, `key: value` header lines, then an opaque body. The
//! primary bundle keeps free text in a body section introduced by `---`,
//! and every binary attachment becomes its own bundle.

use tracing::debug;

use crate::error::EncodeError;
use crate::models::{CanonicalField, FieldKind};

/// Marker line opening the free-text section of a primary bundle
pub const SECTION_MARKER: &str = "---";

pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";

/// One secret in password / headers / body layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    password: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle for a binary attachment
    pub fn attachment(filename: &str, data: &[u8]) -> Self {
        let mut bundle = Self::new();
        bundle.set(
            CONTENT_DISPOSITION,
            &format!("attachment; filename=\"{}\"", filename),
        );
        bundle.set(CONTENT_TRANSFER_ENCODING, "Base64");
        bundle.body.extend_from_slice(data);
        bundle
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Fill the password slot; returns false when it is already taken
    pub fn set_password(&mut self, value: &str) -> bool {
        if !self.password.is_empty() {
            return false;
        }
        self.password = value.to_string();
        true
    }

    /// Set a header, replacing an existing one with the same key
    ///
    /// Empty keys or values are ignored.
    pub fn set(&mut self, key: &str, value: &str) {
        if key.is_empty() || value.is_empty() {
            return;
        }

        match self.headers.iter_mut().find(|(k, _)| k == key) {
            Some(existing) => existing.1 = value.to_string(),
            None => self.headers.push((key.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Append a `key\n\nvalue\n` section, opening the section marker once
    pub fn push_section(&mut self, key: &str, value: &[u8]) {
        if key.is_empty() || value.is_empty() {
            return;
        }

        if self.body.is_empty() {
            self.body.extend_from_slice(SECTION_MARKER.as_bytes());
            self.body.push(b'\n');
        }
        self.body.extend_from_slice(key.as_bytes());
        self.body.extend_from_slice(b"\n\n");
        self.body.extend_from_slice(value);
        self.body.push(b'\n');
    }

    /// Serialized form written to the store
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.password.len() + self.body.len() + 64);
        out.extend_from_slice(self.password.as_bytes());
        out.push(b'\n');
        for (key, value) in &self.headers {
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.push(b'\n');
        }
        out.extend_from_slice(&self.body);
        out
    }

    /// Parse stored bytes back into a bundle
    ///
    /// The first line is the password; following `key: value` lines are
    /// headers until the first line that is not one, which starts the body.
    pub fn parse(data: &[u8]) -> Result<Self, EncodeError> {
        let mut bundle = Self::new();
        if data.is_empty() {
            return Ok(bundle);
        }

        let (first, mut rest) = split_line(data);
        bundle.password = std::str::from_utf8(first)
            .map_err(|e| EncodeError::MalformedBundle {
                reason: format!("password line is not UTF-8: {}", e),
            })?
            .to_string();

        while let Some(end) = rest.iter().position(|b| *b == b'\n') {
            let line = &rest[..end];
            let header = std::str::from_utf8(line)
                .ok()
                .and_then(|l| l.split_once(": "))
                .filter(|(k, _)| !k.is_empty() && !k.contains(' '));

            match header {
                Some((key, value)) => {
                    bundle.headers.push((key.to_string(), value.to_string()));
                    rest = &rest[end + 1..];
                }
                None => break,
            }
        }

        bundle.body = rest.to_vec();
        Ok(bundle)
    }

    /// Recover the free-text sections for the given keys, in order
    ///
    /// Each value runs up to the header of the next expected key, so values
    /// may themselves contain blank lines.
    pub fn multiline_sections(&self, keys: &[&str]) -> Result<Vec<(String, String)>, EncodeError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let body = std::str::from_utf8(&self.body).map_err(|e| EncodeError::MalformedBundle {
            reason: format!("free-text section is not UTF-8: {}", e),
        })?;

        let marker = format!("{}\n", SECTION_MARKER);
        let mut rest = body.strip_prefix(marker.as_str()).ok_or_else(|| {
            EncodeError::MalformedBundle {
                reason: "free-text section marker missing".to_string(),
            }
        })?;

        let mut sections = Vec::with_capacity(keys.len());
        for (idx, key) in keys.iter().enumerate() {
            let header = format!("{}\n\n", key);
            rest = rest
                .strip_prefix(header.as_str())
                .ok_or_else(|| EncodeError::MalformedBundle {
                    reason: format!("section '{}' not found", key),
                })?;

            let end = match keys.get(idx + 1) {
                Some(next) => {
                    let next_header = format!("\n{}\n\n", next);
                    rest.find(next_header.as_str())
                        .ok_or_else(|| EncodeError::MalformedBundle {
                            reason: format!("section '{}' not found", next),
                        })?
                }
                None => rest.strip_suffix('\n').map(|s| s.len()).ok_or_else(|| {
                    EncodeError::MalformedBundle {
                        reason: format!("section '{}' is not terminated", key),
                    }
                })?,
            };

            sections.push((key.to_string(), rest[..end].to_string()));
            rest = &rest[end + 1..];
        }

        Ok(sections)
    }
}

fn split_line(data: &[u8]) -> (&[u8], &[u8]) {
    match data.iter().position(|b| *b == b'\n') {
        Some(end) => (&data[..end], &data[end + 1..]),
        None => (data, &[]),
    }
}

/// Primary bundle plus one bundle per binary attachment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedSecret {
    pub primary: Bundle,

    /// Attachment bundles in field order, keyed by filename
    pub attachments: Vec<(String, Bundle)>,
}

/// Encoder for gopass-style key-value stores
pub struct BundleEncoder;

impl BundleEncoder {
    pub fn encode(fields: &[CanonicalField]) -> Result<EncodedSecret, EncodeError> {
        let mut encoded = EncodedSecret::default();

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
                encoded
                    .attachments
                    .push((field.key.clone(), Bundle::attachment(&field.key, &field.value)));
                continue;
            }

            let value = field.value_str();

            // Header values are single lines; anything else goes to the free text
            if field.is_multiline() || value.contains('\n') {
                encoded.primary.push_section(&field.key, &field.value);
                continue;
            }

            if field.kind == FieldKind::Password && encoded.primary.set_password(&value) {
                continue;
            }

            encoded.primary.set(&field.key, &value);
        }

        debug!(
            "Encoded bundle with {} headers and {} attachments",
            encoded.primary.headers().len(),
            encoded.attachments.len()
        );
        Ok(encoded)
    }
}
