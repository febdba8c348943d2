use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use cipherkv_core::{
    codec::{self, CodecError},
    store::{storage_err, MetadataStore, StoreError},
};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Name of the shared line-oriented file holding string records.
pub const SHARED_FILE: &str = "crypto";
const EXTENSION: &str = "data";

/// File-backed metadata store.
///
/// String records are appended to `<root>/crypto.data` as `hashedKey=compressedValue`
/// lines. Binary records live in `<root>/<hashedKey>.data` as hex text.
/// Writers inside one process are serialized; separate processes sharing a root
/// are not coordinated, so the backend is single-writer.
pub struct FileKvStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileKvStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `<root>/<name>.data`, creating the root on first use.
    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.root).map_err(storage_err)?;
        Ok(self.root.join(format!("{name}.{EXTENSION}")))
    }

    fn shared_path(&self) -> Result<PathBuf, StoreError> {
        self.path_for(SHARED_FILE)
    }

    /// Last value written for `addr`; later appends shadow earlier ones.
    fn find_line(&self, addr: &str) -> Result<Option<String>, StoreError> {
        let Some(contents) = read_optional(&self.shared_path()?)? else {
            return Ok(None);
        };

        Ok(contents
            .lines()
            .filter_map(|line| line.split_once('='))
            .filter(|(key, _)| *key == addr)
            .map(|(_, value)| value.to_string())
            .last())
    }

    /// Rewrite the shared file without any line for `addr`.
    fn remove_lines(&self, addr: &str) -> Result<bool, StoreError> {
        let path = self.shared_path()?;
        let Some(contents) = read_optional(&path)? else {
            return Ok(false);
        };

        let kept: Vec<&str> = contents
            .lines()
            .filter(|line| line.split_once('=').map(|(key, _)| key) != Some(addr))
            .collect();
        if kept.len() == contents.lines().count() {
            return Ok(false);
        }

        let mut body = kept.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        write_atomic(&path, body.as_bytes())?;
        Ok(true)
    }
}

#[async_trait]
impl MetadataStore for FileKvStore {
    fn name(&self) -> &'static str {
        "file"
    }

    #[instrument(skip_all, fields(addr = tracing::field::Empty))]
    async fn set(&self, key: &str, value: &str) -> Result<String, StoreError> {
        let addr = codec::address_key(key);
        tracing::Span::current().record("addr", addr.as_str());
        let compressed = codec::compress(value)?;

        let _guard = self.write_lock.lock().await;
        let path = self.shared_path()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(storage_err)?;
        file.write_all(format!("{addr}={compressed}\n").as_bytes())
            .map_err(storage_err)?;

        Ok(compressed)
    }

    #[instrument(skip_all, fields(addr = tracing::field::Empty))]
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let addr = codec::address_key(key);
        tracing::Span::current().record("addr", addr.as_str());

        let Some(stored) = self.find_line(&addr)? else {
            debug!("string record not found");
            return Ok(None);
        };

        codec::decompress(&stored)
            .map(Some)
            .map_err(|source| StoreError::Decode { key: addr, source })
    }

    #[instrument(skip_all, fields(addr = tracing::field::Empty))]
    async fn set_buffer(&self, key: &str, value: &[u8]) -> Result<Vec<u8>, StoreError> {
        let addr = codec::address_key(key);
        tracing::Span::current().record("addr", addr.as_str());

        let path = self.path_for(&addr)?;
        write_atomic(&path, hex::encode(value).as_bytes())?;
        Ok(value.to_vec())
    }

    #[instrument(skip_all, fields(addr = tracing::field::Empty))]
    async fn get_buffer(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let addr = codec::address_key(key);
        tracing::Span::current().record("addr", addr.as_str());

        let Some(contents) = read_optional(&self.path_for(&addr)?)? else {
            debug!("binary record not found");
            return Ok(None);
        };

        hex::decode(contents.trim())
            .map(Some)
            .map_err(|e| StoreError::Decode {
                key: addr,
                source: CodecError::Encoding {
                    reason: e.to_string(),
                },
            })
    }

    #[instrument(skip_all, fields(requested = keys.len()))]
    async fn del(&self, keys: &[&str]) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut removed = 0;

        for key in keys {
            let addr = codec::address_key(key);
            let buffer_path = self.path_for(&addr)?;

            if buffer_path.exists() {
                fs::remove_file(&buffer_path).map_err(storage_err)?;
                removed += 1;
            } else if self.remove_lines(&addr)? {
                removed += 1;
            }
        }

        debug!(removed, "deleted records");
        Ok(removed)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(storage_err(err)),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| StoreError::Storage {
        reason: "invalid storage path".to_string(),
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
    tmp.write_all(bytes).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn string_round_trip_uses_hashed_keys_and_compressed_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKvStore::new(dir.path().join("data"));

        let written = store
            .set("deadbeef-hunter2-iv", "nonce-value")
            .await
            .expect("set");
        let value = store.get("deadbeef-hunter2-iv").await.expect("get");
        assert_eq!(value.as_deref(), Some("nonce-value"));

        let shared = fs::read_to_string(store.root().join("crypto.data")).expect("read");
        let addr = codec::address_key("deadbeef-hunter2-iv");
        assert_eq!(shared, format!("{addr}={written}\n"));
        assert!(!shared.contains("hunter2"), "raw keys must not reach disk");
        assert!(!shared.contains("nonce-value"));
    }

    #[tokio::test]
    async fn missing_string_key_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKvStore::new(dir.path());

        assert_eq!(store.get("nope").await.expect("get"), None);
        store.set("other", "v").await.expect("set");
        assert_eq!(store.get("nope").await.expect("get"), None);
    }

    #[tokio::test]
    async fn latest_string_write_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKvStore::new(dir.path());

        store.set("k", "first").await.expect("set");
        store.set("k", "second").await.expect("set");
        assert_eq!(store.get("k").await.expect("get").as_deref(), Some("second"));

        assert_eq!(store.del(&["k"]).await.expect("del"), 1);
        assert_eq!(store.get("k").await.expect("get"), None);
    }

    #[tokio::test]
    async fn buffer_lives_in_its_own_hex_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKvStore::new(dir.path());
        let tag = [0u8, 1, 2, 0xfe, 0xff, 0x10, 0x20, 0x30, 9, 8, 7, 6, 5, 4, 3, 2];

        store.set_buffer("c-pw-tag", &tag).await.expect("set_buffer");
        let path = dir
            .path()
            .join(format!("{}.data", codec::address_key("c-pw-tag")));
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "000102feff1020300908070605040302"
        );

        let loaded = store.get_buffer("c-pw-tag").await.expect("get_buffer");
        assert_eq!(loaded.as_deref(), Some(&tag[..]));
        assert_eq!(store.get_buffer("absent").await.expect("get_buffer"), None);
    }

    #[tokio::test]
    async fn del_counts_only_present_keys_across_both_layouts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKvStore::new(dir.path());
        store.set("a-iv", "nonce-a").await.expect("set");
        store.set("b-iv", "nonce-b").await.expect("set");
        store.set_buffer("a-tag", b"tag").await.expect("set_buffer");

        let removed = store.del(&["a-iv", "a-tag", "missing"]).await.expect("del");
        assert_eq!(removed, 2);

        assert_eq!(store.get("a-iv").await.expect("get"), None);
        assert_eq!(store.get_buffer("a-tag").await.expect("get_buffer"), None);
        assert_eq!(
            store.get("b-iv").await.expect("get").as_deref(),
            Some("nonce-b")
        );
        assert_eq!(store.del(&[]).await.expect("del"), 0);
        assert_eq!(store.del(&["a-iv"]).await.expect("del"), 0);
    }

    #[tokio::test]
    async fn corrupted_line_is_a_decode_error_not_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKvStore::new(dir.path());
        let addr = codec::address_key("broken");
        fs::write(dir.path().join("crypto.data"), format!("{addr}=!!!\n")).expect("write");

        let err = store.get("broken").await.expect_err("should not decode");
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[tokio::test]
    async fn root_directory_is_created_lazily() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("nested").join("meta");
        let store = FileKvStore::new(&root);
        assert!(!root.exists());

        store.get("k").await.expect("get");
        assert!(root.is_dir());
    }
}
