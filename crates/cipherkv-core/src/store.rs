use async_trait::async_trait;
use thiserror::Error;

use crate::codec::CodecError;

/// Errors produced by metadata store implementations.
///
/// Absent keys are not errors: `get` and `get_buffer` report them as `None`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Stored value exists but could not be decoded.
    #[error("corrupted value for key {key}: {source}")]
    Decode { key: String, source: CodecError },
    /// Value could not be encoded for storage.
    #[error("encode failure: {0}")]
    Encode(#[from] CodecError),
    /// Underlying filesystem or network failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

/// Uniform string/binary key-value contract shared by every metadata backend.
///
/// Implementations address keys through [`crate::codec::address_key`] and store
/// string values through [`crate::codec::compress`]; binary values are stored raw.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Short backend name used for logging.
    fn name(&self) -> &'static str;

    /// Store a string value, returning the encoded text that was written.
    async fn set(&self, key: &str, value: &str) -> Result<String, StoreError>;

    /// Retrieve a string value; `None` when the key was never written or was deleted.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store a binary value uncompressed, returning the bytes written.
    async fn set_buffer(&self, key: &str, value: &[u8]) -> Result<Vec<u8>, StoreError>;

    /// Retrieve a binary value; `None` when absent.
    async fn get_buffer(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Remove zero or more keys, returning how many were actually present.
    async fn del(&self, keys: &[&str]) -> Result<usize, StoreError>;
}

/// Build a [`StoreError::Storage`] from any displayable failure.
pub fn storage_err<E: ToString>(err: E) -> StoreError {
    StoreError::Storage {
        reason: err.to_string(),
    }
}
