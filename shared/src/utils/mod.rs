//! Utility modules for passferry
//!
//! Path segment normalization, content hashing and attachment sniffing,
//! plus a few string helpers used when logging secrets.

pub mod hash;
pub mod sniff;
pub mod transliterate;

// Re-export commonly used items for convenience
pub use hash::sha256_hex;
pub use sniff::{detect_content_type, is_text};
pub use transliterate::normalize;

/// Utility functions for working with strings
pub mod string_utils {
    /// Truncate a string to a maximum number of characters with ellipsis
    pub fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else if max_len <= 3 {
            "...".to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{}...", kept)
        }
    }

    /// Join path segments with `/`, skipping empty ones
    pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
        segments
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

}
