//! Order-tag normalization.
//!
//! The venue caps the `tag` field length and restricts its alphabet, so
//! free-form tags are hashed down to a fixed-width hex token. Distinct tags
//! can collide after truncation; the token is for attribution, not identity.

use sha2::{Digest, Sha256};

const TAG_LEN: usize = 16;

/// Hash a free-form tag into a 16-character hex token. Empty input maps to
/// an empty token so untagged orders stay untagged on the wire.
pub fn hash(tag: &str) -> String {
    if tag.is_empty() {
        return String::new();
    }
    let digest = Sha256::digest(tag.as_bytes());
    let mut out = hex::encode(digest);
    out.truncate(TAG_LEN);
    out
}
