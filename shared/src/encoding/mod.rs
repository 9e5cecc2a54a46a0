//! Destination encoders
//!
//! Each destination kind renders the same canonical field list into its
//! own native record. Encoders are pure; writing is left to the adapters.

pub mod bundle;
pub mod keepass;

pub use bundle::{Bundle, BundleEncoder, EncodedSecret};
pub use keepass::{EntryBinary, EntryValue, KeepassEncoder, KeepassEntry};
