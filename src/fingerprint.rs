// src/fingerprint.rs
//! Order-insensitive content digest over a list of tag strings.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;

use crate::normalize::normalize;

/// Joins sorted tokens. A control character, so never present in normalized text.
const SEP: char = '\u{1F}';

/// Fingerprint of a tag list: normalize, drop empties, sort, join, SHA-256 (hex).
/// Duplicates are kept, so the digest reflects the multiset of tokens.
pub fn fingerprint<S: AsRef<str>>(tags: &[S]) -> String {
    let mut toks: Vec<String> = tags
        .iter()
        .map(|t| normalize(t.as_ref()))
        .filter(|t| !t.is_empty())
        .collect();
    toks.sort();

    let mut blob = String::new();
    for (i, t) in toks.iter().enumerate() {
        if i > 0 {
            blob.push(SEP);
        }
        blob.push_str(t);
    }
    hex_digest(blob.as_bytes())
}

/// Lower-case hex SHA-256 of `bytes`.
pub(crate) fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
