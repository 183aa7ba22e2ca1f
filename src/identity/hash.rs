use sha2::{Digest, Sha256};

/// SHA-256 of a document's text with whitespace runs collapsed
///
/// Only whitespace is normalized: dates and numbers inside a document are
/// part of its content.
///
/// # Example
///
/// ```
/// use docket::identity::content_hash;
///
/// assert_eq!(content_hash("a  b\n"), content_hash("a b"));
/// assert_ne!(content_hash("issued 2023"), content_hash("issued 2024"));
/// ```
pub fn content_hash(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}
