//! Content fingerprints.
//!
//! Every cache decision in the pipeline is keyed by a SHA-256 hex digest:
//! raw source bytes, rendered output bytes, document ids (for content file
//! names and route suffixes), and the composite render fingerprint.

use sha2::{Digest, Sha256};

/// SHA-256 of arbitrary bytes, returned as a lowercase hex string.
pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> String {
    format!("{:x}", Sha256::digest(bytes.as_ref()))
}

/// Incremental builder for composite fingerprints.
///
/// Parts are joined with `::` before hashing, so the same sequence of parts
/// always yields the same digest and reordering parts changes it.
#[derive(Debug, Default)]
pub struct Fingerprint {
    hasher: Sha256,
    parts: usize,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part(mut self, value: impl AsRef<[u8]>) -> Self {
        if self.parts > 0 {
            self.hasher.update(b"::");
        }
        self.hasher.update(value.as_ref());
        self.parts += 1;
        self
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_bytes_is_sha256_hex() {
        let h = hash_bytes("hello world");
        assert_eq!(h.len(), 64);
        assert_eq!(
            h,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn fingerprint_matches_joined_hash() {
        let fp = Fingerprint::new().part("a").part("b").part("c").finish();
        assert_eq!(fp, hash_bytes("a::b::c"));
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        let ab = Fingerprint::new().part("a").part("b").finish();
        let ba = Fingerprint::new().part("b").part("a").finish();
        assert_ne!(ab, ba);
    }

    #[test]
    fn empty_parts_still_separate() {
        let with_empty = Fingerprint::new().part("a").part("").finish();
        assert_eq!(with_empty, hash_bytes("a::"));
        assert_ne!(with_empty, hash_bytes("a"));
    }
}
