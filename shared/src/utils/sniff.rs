//! Attachment content sniffing
//!
//! Decides whether an attachment payload is plain text. Byte order marks
//! mean text, known magic numbers are left to `infer`, and anything else is
//! scanned for control bytes that never occur in text.

/// Number of leading bytes considered when sniffing
pub const SNIFF_LEN: usize = 512;

pub const TEXT_PLAIN: &str = "text/plain";
pub const OCTET_STREAM: &str = "application/octet-stream";

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

/// Detect a MIME type from the payload bytes
///
/// Returns `text/plain` for payloads that look like text and
/// `application/octet-stream` when nothing else matches.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let head = &data[..data.len().min(SNIFF_LEN)];

    if head.starts_with(&[0xEF, 0xBB, 0xBF])
        || head.starts_with(&[0xFE, 0xFF])
        || head.starts_with(&[0xFF, 0xFE])
    {
        return TEXT_PLAIN;
    }

    if let Some(kind) = infer::get(data) {
        return kind.mime_type();
    }

    if head.iter().any(|b| is_binary_byte(*b)) {
        return OCTET_STREAM;
    }

    TEXT_PLAIN
}

/// Whether an attachment should be treated as text
///
/// The declared kind wins when it says `text/plain`; otherwise the payload
/// is sniffed.
pub fn is_text(declared_kind: &str, data: &[u8]) -> bool {
    let declared = declared_kind.split(';').next().unwrap_or("").trim();
    if declared.eq_ignore_ascii_case(TEXT_PLAIN) {
        return true;
    }
    detect_content_type(data) == TEXT_PLAIN
}
