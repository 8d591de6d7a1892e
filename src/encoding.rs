//! Canonical word encoding used for hashing and signing.

mod error;
mod hashing;
mod ser;

pub use error::{Error, Result};
pub use hashing::to_hash;
pub use ser::{to_vec, to_writer, Serializer, Writer, SLOT_SIZE};
