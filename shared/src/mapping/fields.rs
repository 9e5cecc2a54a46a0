//! Source item to canonical field list

use base64::prelude::*;
use tracing::debug;

use crate::error::MappingError;
use crate::models::{
    CanonicalField, FieldKind, FoldersMap, SourceAttachment, SourceField, SourceItem,
};
use crate::utils::sniff;

/// Key used for fields of type `totp`, whatever their label
const TOTP_KEY: &str = "totp";

/// Convert one source item into its ordered canonical field list
///
/// Item-level fields come first (title, subtitle, category, note, tags),
/// then the item's own labeled fields, then attachments. Empty values are
/// dropped, except tags. A payload that is not valid base64 aborts the
/// whole item.
pub fn map_item(
    item: &SourceItem,
    folders: &FoldersMap,
) -> Result<Vec<CanonicalField>, MappingError> {
    let mut out = Vec::with_capacity(5 + item.fields.len() + item.attachments.len());

    push_non_empty(&mut out, CanonicalField::title(item.title.as_str()));
    push_non_empty(
        &mut out,
        CanonicalField::username("subtitle", item.subtitle.as_str()),
    );
    push_non_empty(
        &mut out,
        CanonicalField::simple("category", item.category_segment(), false),
    );
    push_non_empty(
        &mut out,
        CanonicalField::multiline("note", item.note.as_str(), false),
    );

    // always present, `[]` for items outside any folder
    out.push(CanonicalField::tags(&folders.resolve(&item.folders)));

    out.extend(item.fields.iter().filter_map(map_field));

    for attachment in &item.attachments {
        out.push(map_attachment(attachment)?);
    }

    debug!(
        "Mapped item {:?} into {} fields",
        item.title,
        out.len()
    );
    Ok(out)
}

fn push_non_empty(out: &mut Vec<CanonicalField>, field: CanonicalField) {
    if !field.is_empty() {
        out.push(field);
    }
}

/// Map one labeled field, `None` when it should be skipped
fn map_field(field: &SourceField) -> Option<CanonicalField> {
    if field.is_deleted() || field.is_ignored() {
        return None;
    }

    let label = field.label_key();
    if label.is_empty() || field.value.is_empty() {
        return None;
    }

    let key = if field.field_type == "totp" {
        TOTP_KEY.to_string()
    } else if label == "e_mail" {
        "email".to_string()
    } else {
        label
    };

    let kind = match field.field_type.as_str() {
        "password" => FieldKind::Password,
        "url" => FieldKind::Url,
        "multiline" => FieldKind::Multiline,
        _ => FieldKind::Simple,
    };
    let sensitive = field.is_sensitive() || kind == FieldKind::Password;

    Some(CanonicalField::new(
        key,
        field.value.as_str(),
        kind,
        field.is_multiline(),
        sensitive,
    ))
}

/// Decode an attachment payload; surrounding and embedded whitespace is ignored
pub fn decode_attachment(attachment: &SourceAttachment) -> Result<Vec<u8>, MappingError> {
    let compact: String = attachment
        .data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    BASE64_STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| MappingError::AttachmentDecode {
            name: attachment.name.clone(),
            reason: e.to_string(),
        })
}

fn map_attachment(attachment: &SourceAttachment) -> Result<CanonicalField, MappingError> {
    let data = decode_attachment(attachment)?;

    if sniff::is_text(&attachment.kind, &data) {
        debug!("Attachment {:?} stored as text", attachment.name);
        return Ok(CanonicalField::multiline(
            format!("attachment - {}", attachment.name),
            data,
            false,
        ));
    }

    debug!(
        "Attachment {:?} stored as binary ({} bytes)",
        attachment.name,
        data.len()
    );
    Ok(CanonicalField::attachment(attachment.name.as_str(), data))
}
