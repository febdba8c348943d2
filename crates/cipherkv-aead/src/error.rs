use cipherkv_core::store::StoreError;
use thiserror::Error;

/// Every way an encrypt or decrypt call can fail.
///
/// Messages never include passwords or raw record identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AeadError {
    /// Plaintext was not a string.
    #[error("txt must be a string")]
    InvalidInput,
    /// No password given and no default configured.
    #[error("no password supplied and no default password configured")]
    MissingPassword,
    /// Nonce or tag record is absent (never written, or already deleted).
    #[error("{record} metadata not found for ciphertext")]
    MetadataNotFound { record: &'static str },
    /// Ciphertext or recovered plaintext is malformed.
    #[error("decode error: {reason}")]
    Decode { reason: String },
    /// Derived or stored material has the wrong byte length for the cipher.
    #[error("{what} must be {expected} bytes, got {actual}")]
    KeyLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Tag verification failed: tampered ciphertext or corrupted metadata.
    #[error("authentication failed: ciphertext does not match its tag")]
    Authentication,
    #[error("cipher failure: {reason}")]
    Cipher { reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}
