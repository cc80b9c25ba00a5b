//! Short, queue-safe identifiers derived from long logical keys.
//!
//! The readable prefix is the key with everything outside `[A-Za-z0-9]`
//! replaced by `_`, clamped to 32 characters. A hash fingerprint of the raw
//! key is appended, so keys that share a long prefix still get distinct ids.

use siphasher::sip128::{Hasher128, SipHasher13};
use std::hash::Hasher;

const MAX_PREFIX_LEN: usize = 32;
const FINGERPRINT_LEN: usize = 8;

/// Upper bound on the length of any derived identifier.
pub const MAX_ID_LEN: usize = MAX_PREFIX_LEN + 1 + FINGERPRINT_LEN;

/// Derive a stable identifier for `long_key`. Same key, same id, every run.
pub fn derive_id(long_key: &str) -> String {
    let mut hasher = SipHasher13::new();
    hasher.write(long_key.as_bytes());
    let fingerprint = hex::encode(hasher.finish128().as_bytes());

    let mut id: String = long_key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(MAX_PREFIX_LEN)
        .collect();
    id.push('-');
    id.push_str(&fingerprint[..FINGERPRINT_LEN]);
    id
}
