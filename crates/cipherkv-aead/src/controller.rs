use std::{fmt, str::FromStr};

use aes_gcm::{
    aead::{consts::U32, Aead, KeyInit},
    aes::Aes256,
    AesGcm, Nonce,
};
use cipherkv_core::store::MetadataStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    error::AeadError,
    key::{derive_key, fresh_nonce, KEY_LEN, NONCE_LEN},
};

/// AES-256-GCM with the 32-byte nonces carried in stored metadata.
type MetadataCipher = AesGcm<Aes256, U32>;

/// Authentication tag size.
pub const TAG_LEN: usize = 16;

/// Which metadata backend serves encrypt and decrypt calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Remote,
    File,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Remote => f.write_str("remote"),
            Strategy::File => f.write_str("file"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "remote" => Ok(Strategy::Remote),
            "file" | "file_system" => Ok(Strategy::File),
            other => Err(format!("unknown store strategy: {other}")),
        }
    }
}

/// Storage keys of the two records written per ciphertext.
struct RecordKeys {
    nonce: String,
    tag: String,
}

impl RecordKeys {
    fn new(ciphertext_hex: &str, password: &str) -> Self {
        let id = format!("{ciphertext_hex}-{password}");
        Self {
            nonce: format!("{id}-iv"),
            tag: format!("{id}-tag"),
        }
    }
}

/// Encrypts text under a password and keeps the nonce and tag in the active store.
///
/// Both backends are injected at construction; [`AeadController::set_strategy`]
/// picks which one later calls use. The nonce is stored as a compressed string
/// record, the tag as a raw binary record.
pub struct AeadController<R, F> {
    strategy: Strategy,
    remote: R,
    file: F,
    default_password: Option<String>,
}

impl<R: MetadataStore, F: MetadataStore> AeadController<R, F> {
    pub fn new(remote: R, file: F) -> Self {
        Self {
            strategy: Strategy::default(),
            remote,
            file,
            default_password: None,
        }
    }

    /// Password used when a call does not supply one.
    pub fn with_default_password(mut self, password: impl Into<String>) -> Self {
        self.default_password = Some(password.into());
        self
    }

    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn file(&self) -> &F {
        &self.file
    }

    fn store(&self) -> &dyn MetadataStore {
        match self.strategy {
            Strategy::Remote => &self.remote,
            Strategy::File => &self.file,
        }
    }

    fn resolve_password<'a>(&'a self, password: Option<&'a str>) -> Result<&'a str, AeadError> {
        password
            .or(self.default_password.as_deref())
            .ok_or(AeadError::MissingPassword)
    }

    /// Encrypt `text`, persist its nonce and tag, and return the ciphertext as hex.
    #[instrument(skip_all, fields(strategy = %self.strategy))]
    pub async fn encrypt(&self, text: &str, password: Option<&str>) -> Result<String, AeadError> {
        let password = self.resolve_password(password)?;
        let cipher = build_cipher(&derive_key(password)?)?;
        let nonce = fresh_nonce();

        let mut sealed = cipher
            .encrypt(nonce_from(&nonce)?, text.as_bytes())
            .map_err(|e| AeadError::Cipher {
                reason: e.to_string(),
            })?;
        let tag = sealed.split_off(sealed.len() - TAG_LEN);
        let ciphertext_hex = hex::encode(&sealed);

        let keys = RecordKeys::new(&ciphertext_hex, password);
        let store = self.store();
        store.set(&keys.nonce, &nonce).await?;
        store.set_buffer(&keys.tag, &tag).await?;

        debug!(store = store.name(), len = text.len(), "encrypted payload");
        Ok(ciphertext_hex)
    }

    /// Entry point for dynamically typed input; anything but a JSON string is rejected
    /// before touching storage.
    pub async fn encrypt_value(
        &self,
        value: &Value,
        password: Option<&str>,
    ) -> Result<String, AeadError> {
        match value {
            Value::String(text) => self.encrypt(text, password).await,
            _ => Err(AeadError::InvalidInput),
        }
    }

    /// Load the metadata for `ciphertext_hex` and recover the plaintext.
    ///
    /// With `delete_after`, both records are removed once loaded, whether or not
    /// the decryption itself then succeeds.
    #[instrument(skip_all, fields(strategy = %self.strategy, delete_after))]
    pub async fn decrypt(
        &self,
        ciphertext_hex: &str,
        password: Option<&str>,
        delete_after: bool,
    ) -> Result<String, AeadError> {
        let password = self.resolve_password(password)?;
        let keys = RecordKeys::new(ciphertext_hex, password);
        let store = self.store();

        let nonce = store
            .get(&keys.nonce)
            .await?
            .ok_or(AeadError::MetadataNotFound { record: "nonce" })?;
        let tag = store
            .get_buffer(&keys.tag)
            .await?
            .ok_or(AeadError::MetadataNotFound { record: "tag" })?;

        if delete_after {
            let removed = store
                .del(&[keys.nonce.as_str(), keys.tag.as_str()])
                .await?;
            debug!(store = store.name(), removed, "deleted metadata");
        }

        if tag.len() != TAG_LEN {
            return Err(AeadError::KeyLength {
                what: "tag",
                expected: TAG_LEN,
                actual: tag.len(),
            });
        }

        let mut sealed = hex::decode(ciphertext_hex).map_err(|e| AeadError::Decode {
            reason: e.to_string(),
        })?;
        sealed.extend_from_slice(&tag);

        let plain = build_cipher(&derive_key(password)?)?
            .decrypt(nonce_from(&nonce)?, sealed.as_slice())
            .map_err(|_| AeadError::Authentication)?;

        String::from_utf8(plain).map_err(|e| AeadError::Decode {
            reason: e.to_string(),
        })
    }
}

fn build_cipher(key: &[u8; KEY_LEN]) -> Result<MetadataCipher, AeadError> {
    MetadataCipher::new_from_slice(key).map_err(|e| AeadError::Cipher {
        reason: format!("cipher init failed: {e}"),
    })
}

fn nonce_from(nonce: &str) -> Result<&Nonce<U32>, AeadError> {
    if nonce.len() != NONCE_LEN {
        return Err(AeadError::KeyLength {
            what: "nonce",
            expected: NONCE_LEN,
            actual: nonce.len(),
        });
    }
    Ok(Nonce::<U32>::from_slice(nonce.as_bytes()))
}
