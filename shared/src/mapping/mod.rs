//! Source item mapping
//!
//! Turns one exported item into the canonical field list every encoder
//! consumes, and derives the relative path the item is stored under.

pub mod fields;
pub mod path;

pub use fields::{decode_attachment, map_item};
pub use path::{derive_path, state_segment};
