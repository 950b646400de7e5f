//! Hash functions for fingerprinting job inputs.

use sha1::{Digest, Sha1};

/// Computes the hex-encoded SHA-1 digest of `input`.
pub fn sha1_hex(input: &[u8]) -> String {
    hex::encode(Sha1::digest(input))
}

/// Fingerprints a list of strings.
///
/// The strings are joined with `_` and hashed with SHA-1, so the
/// result depends on both the contents and the order of the list.
pub fn hash_strings<S: AsRef<str>>(strings: &[S]) -> String {
    let mut hasher = Sha1::new();
    for (i, s) in strings.iter().enumerate() {
        if i > 0 {
            hasher.update(b"_");
        }
        hasher.update(s.as_ref().as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Implementation of the [DJB2] hash function.
///
/// [DJB2]: https://theartincode.stanis.me/008-djb2/
#[inline(always)]
pub fn djb2(input: &[u8]) -> u32 {
    input
        .iter()
        .copied()
        .fold(5381, |acc: u32, b| acc.wrapping_mul(33).wrapping_add(b as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_known_values() {
        assert_eq!(sha1_hex(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn strings_are_joined() {
        assert_eq!(hash_strings(&["a", "b", "c"]), sha1_hex(b"a_b_c"));
        assert_eq!(hash_strings::<&str>(&[]), sha1_hex(b""));
        assert_ne!(hash_strings(&["ab", "c"]), hash_strings(&["a", "bc"]));
    }

    #[test]
    fn djb2_known_values() {
        assert_eq!(djb2(b""), 5381);
        assert_eq!(djb2(b"a"), 177_670);
        assert_eq!(djb2(b"ab"), 5_863_208);
    }
}
