//! Content-derived identifiers.
//!
//! Series, entries and users are keyed by the hex SHA-1 of their title (or
//! username). Passwords are stored as hex SHA-256 digests.

use sha1::{Digest, Sha1};
use sha2::Sha256;

/// Stable id for a title or username.
#[must_use]
pub fn hash_id(value: &str) -> String {
    hex::encode(Sha1::digest(value.as_bytes()))
}

/// Digest stored in place of a plaintext password.
#[must_use]
pub fn hash_password(pass: &str) -> String {
    hex::encode(Sha256::digest(pass.as_bytes()))
}
