//! Key and nonce derivation.
//!
//! Both are the standard-base64 text of a SHA-256 digest cut to a fixed number
//! of characters; each character is one ASCII byte handed to the cipher. This
//! keeps ciphertexts interchangeable with data already stored in this format.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::error::AeadError;

/// AES-256 key size.
pub const KEY_LEN: usize = 32;
/// Nonce size used by the stored metadata format.
pub const NONCE_LEN: usize = 32;
const SEED_LEN: usize = 24;

fn truncated_digest(input: &str, len: usize) -> String {
    let mut encoded = STANDARD.encode(Sha256::digest(input.as_bytes()));
    encoded.truncate(len);
    encoded
}

/// Deterministic key for `password`.
pub fn derive_key(password: &str) -> Result<[u8; KEY_LEN], AeadError> {
    let material = truncated_digest(password, KEY_LEN);
    material
        .as_bytes()
        .try_into()
        .map_err(|_| AeadError::KeyLength {
            what: "key",
            expected: KEY_LEN,
            actual: material.len(),
        })
}

/// Fresh per-encryption nonce text, seeded from the OS RNG.
pub fn fresh_nonce() -> String {
    let seed: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(SEED_LEN)
        .map(char::from)
        .collect();
    nonce_from_seed(&seed)
}

fn nonce_from_seed(seed: &str) -> String {
    truncated_digest(&hex::encode(Md5::digest(seed.as_bytes())), NONCE_LEN)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn derive_key_is_deterministic_and_sized() {
        let first = derive_key("correct horse").expect("derive");
        let second = derive_key("correct horse").expect("derive");

        assert_eq!(first, second);
        assert_eq!(&first, b"QQTTb42iwlQ0n4WDZ5Pr4CngyVcGOjTJ");
        assert_ne!(first, derive_key("correct horse!").expect("derive"));
    }

    #[test]
    fn derive_key_accepts_empty_and_unicode_passwords() {
        assert_eq!(derive_key("").expect("derive").len(), KEY_LEN);
        assert_eq!(derive_key("pässwörd ✓").expect("derive").len(), KEY_LEN);
    }

    #[test]
    fn nonce_is_derived_from_md5_hex_of_seed() {
        assert_eq!(
            nonce_from_seed("fixed-seed-24-characters"),
            "bMWeUru3MmNetbi1pvlw6/0/Bw8wv4zw"
        );
    }

    #[test]
    fn fresh_nonces_are_sized_and_unique() {
        let nonces: HashSet<String> = (0..1_000).map(|_| fresh_nonce()).collect();

        assert_eq!(nonces.len(), 1_000);
        assert!(nonces.iter().all(|n| n.len() == NONCE_LEN && n.is_ascii()));
    }
}
