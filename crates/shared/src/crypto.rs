//! Cryptographic utilities for invite codes.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Alphabet for invite codes. Excludes glyphs that are easy to confuse: 0, o, 1, l, i.
const CODE_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";

/// Length of a generated invite code.
pub const INVITE_CODE_LEN: usize = 12;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates an unpredictable, lowercase invite code using the thread-local CSPRNG.
pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Short, non-reversible identifier of a code, safe to put in logs.
pub fn code_fingerprint(code: &str) -> String {
    sha256_hex(code)[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_generate_invite_code_format() {
        let code = generate_invite_code();
        assert_eq!(code.len(), INVITE_CODE_LEN);
        for c in code.chars() {
            assert!(c.is_ascii_lowercase() || c.is_ascii_digit(), "Invalid char: {}", c);
            assert!(!matches!(c, '0' | 'o' | '1' | 'l' | 'i'), "Ambiguous char: {}", c);
        }
    }

    #[test]
    fn test_generate_invite_code_uniqueness() {
        let codes: std::collections::HashSet<String> =
            (0..1000).map(|_| generate_invite_code()).collect();
        assert_eq!(codes.len(), 1000);
    }

    #[test]
    fn test_code_fingerprint_is_stable_and_short() {
        let fp = code_fingerprint("abcdefghjkmn");
        assert_eq!(fp.len(), 12);
        assert_eq!(fp, code_fingerprint("abcdefghjkmn"));
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
