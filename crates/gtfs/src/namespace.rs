//! Namespace identifiers and the bookkeeping row each loaded feed gets in
//! the `feeds` table.

use chrono::{DateTime, Utc};
use gtfs_model::FeedSummary;

use crate::archive::ArchiveFingerprint;

const NAMESPACE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const NAMESPACE_LEN: usize = 12;

/// A fresh, opaque namespace id. Not derived from the feed's content or
/// name on purpose — re-loading the same feed gets a different namespace
/// each time, so an old snapshot stays queryable while a new load is in
/// flight (§5's "one worker thread per namespace" model assumes namespaces
/// never collide mid-load).
///
/// `seed` only needs to vary call to call; callers without a better source
/// of randomness can derive one from the archive's own fingerprint bytes,
/// which is what [`generate_namespace_from_fingerprint`] does.
pub fn generate_namespace(seed: u64) -> String {
    let mut state = seed ^ 0x9E3779B97F4A7C15;
    let mut out = String::with_capacity(NAMESPACE_LEN);
    for _ in 0..NAMESPACE_LEN {
        // xorshift64*, good enough for a non-cryptographic opaque id
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let index = (state as usize) % NAMESPACE_ALPHABET.len();
        out.push(NAMESPACE_ALPHABET[index] as char);
    }
    out
}

pub fn generate_namespace_from_fingerprint(fingerprint: &ArchiveFingerprint, attempt: u32) -> String {
    let mut seed = fingerprint.crc_xor as u64;
    seed = seed.wrapping_mul(0x100000001b3).wrapping_add(attempt as u64);
    for byte in fingerprint.md5.bytes() {
        seed = seed.wrapping_mul(31).wrapping_add(byte as u64);
    }
    generate_namespace(seed)
}

pub fn ensure_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn build_feed_summary(
    namespace: String,
    fingerprint: &ArchiveFingerprint,
    loaded_date: DateTime<Utc>,
    snapshot_of: Option<String>,
) -> FeedSummary {
    FeedSummary {
        namespace,
        md5: fingerprint.md5.clone(),
        sha1: fingerprint.sha1.clone(),
        crc_xor: fingerprint.crc_xor,
        loaded_date,
        snapshot_of,
        deleted: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_is_url_safe_and_fixed_length() {
        let ns = generate_namespace(42);
        assert_eq!(ns.len(), NAMESPACE_LEN);
        assert!(ensure_valid_namespace(&ns));
    }

    #[test]
    fn rejects_namespaces_with_whitespace_or_punctuation() {
        assert!(!ensure_valid_namespace("has space"));
        assert!(!ensure_valid_namespace("semi;colon"));
        assert!(!ensure_valid_namespace(""));
    }

    #[test]
    fn different_seeds_produce_different_namespaces() {
        assert_ne!(generate_namespace(1), generate_namespace(2));
    }
}
