//! Salted digest guarding persisted tile data against hand edits.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

const INTEGRITY_SALT: &str = "TileCollector_v1_";

/// Hex-encoded SHA-256 over the salt, the encoded data, and the tile count.
#[must_use]
pub fn integrity_digest(data: &str, tile_count: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(INTEGRITY_SALT.as_bytes());
    hasher.update(data.as_bytes());
    hasher.update(tile_count.to_string().as_bytes());

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Reports whether `stored` matches the digest recomputed for `data` and `tile_count`.
#[must_use]
pub fn verify_digest(data: &str, stored: &str, tile_count: usize) -> bool {
    integrity_digest(data, tile_count).eq_ignore_ascii_case(stored.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_lowercase_hex_sha256() {
        let digest = integrity_digest("1,2,0", 1);

        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(digest, integrity_digest("1,2,0", 1));
    }

    #[test]
    fn digest_covers_data_and_count() {
        let baseline = integrity_digest("1,2,0;3,4,0", 2);

        assert_ne!(baseline, integrity_digest("1,2,0;3,4,1", 2));
        assert_ne!(baseline, integrity_digest("1,2,0;3,4,0", 3));
        assert!(verify_digest("1,2,0;3,4,0", &baseline, 2));
        assert!(!verify_digest("1,2,0;3,4,0", &baseline, 1));
    }

    #[test]
    fn digest_matches_salted_concatenation() {
        let expected = Sha256::digest(b"TileCollector_v1_7,8,09")
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>();

        assert_eq!(integrity_digest("7,8,0", 9), expected);
    }
}
