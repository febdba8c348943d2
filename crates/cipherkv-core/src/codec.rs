use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Failures while turning values into their stored text form and back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Value could not be rendered to or parsed from JSON.
    #[error("json error: {reason}")]
    Json { reason: String },
    /// Deflate stream could not be produced or inflated.
    #[error("compression error: {reason}")]
    Compression { reason: String },
    /// Stored text is not valid base64.
    #[error("base64 decode error: {reason}")]
    Encoding { reason: String },
}

/// Storage key for a raw identifier: lowercase hex SHA-256.
///
/// Raw identifiers embed ciphertext and password, so only this digest may reach
/// file names or remote key namespaces.
pub fn address_key(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Serialize `value` to JSON, raw-deflate it and return the standard base64 text.
///
/// This is the only string record format readers accept; LZ-based encodings are
/// not recognised.
pub fn compress<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    let json = serde_json::to_vec(value).map_err(|e| CodecError::Json {
        reason: e.to_string(),
    })?;

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).map_err(compression_err)?;
    let deflated = encoder.finish().map_err(compression_err)?;

    Ok(STANDARD.encode(deflated))
}

/// Inverse of [`compress`].
pub fn decompress<T: DeserializeOwned>(value: &str) -> Result<T, CodecError> {
    let deflated = STANDARD
        .decode(value.trim())
        .map_err(|e| CodecError::Encoding {
            reason: e.to_string(),
        })?;

    let mut json = Vec::new();
    DeflateDecoder::new(deflated.as_slice())
        .read_to_end(&mut json)
        .map_err(compression_err)?;

    serde_json::from_slice(&json).map_err(|e| CodecError::Json {
        reason: e.to_string(),
    })
}

fn compression_err(err: std::io::Error) -> CodecError {
    CodecError::Compression {
        reason: err.to_string(),
    }
}
