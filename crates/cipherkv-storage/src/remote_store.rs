use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use cipherkv_core::{
    codec::{self, CodecError},
    store::{storage_err, MetadataStore, StoreError},
};
use redis::{
    aio::{ConnectionLike, MultiplexedConnection},
    IntoConnectionInfo,
};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

/// Byte-level client for a networked key-value service such as Redis.
///
/// Keys arriving here are already hash-addressed. One call maps to one request;
/// batching, retries and pooling are left to the underlying transport.
#[async_trait]
pub trait KvClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Delete keys, returning how many existed.
    async fn del(&self, keys: &[String]) -> Result<usize, StoreError>;
}

/// Redis connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`.
    pub url: Option<String>,
    /// Overrides any password embedded in the URL.
    pub password: Option<String>,
}

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Source of async Redis connections.
#[async_trait]
pub trait RedisConnector: Send + Sync {
    type Conn: ConnectionLike + Clone + Send + Sync;

    async fn connect(&self) -> Result<Self::Conn, StoreError>;
}

#[async_trait]
impl RedisConnector for redis::Client {
    type Conn = MultiplexedConnection;

    async fn connect(&self) -> Result<Self::Conn, StoreError> {
        self.get_multiplexed_async_connection()
            .await
            .map_err(storage_err)
    }
}

/// Redis-backed client: one `GET`, `SET` or `DEL` command per call.
///
/// The connection is opened on first use and then shared.
pub struct RedisKvClient<K: RedisConnector = redis::Client> {
    connector: K,
    conn: OnceCell<K::Conn>,
}

impl RedisKvClient<redis::Client> {
    /// Parse settings without touching the network.
    pub fn open(cfg: &RedisConfig) -> Result<Self, StoreError> {
        let mut info = cfg
            .url
            .as_deref()
            .unwrap_or(DEFAULT_REDIS_URL)
            .into_connection_info()
            .map_err(storage_err)?;
        if let Some(password) = &cfg.password {
            info.redis.password = Some(password.clone());
        }

        let client = redis::Client::open(info).map_err(storage_err)?;
        Ok(Self::new(client))
    }
}

impl<K: RedisConnector> RedisKvClient<K> {
    pub fn new(connector: K) -> Self {
        Self {
            connector,
            conn: OnceCell::new(),
        }
    }

    async fn connection(&self) -> Result<K::Conn, StoreError> {
        self.conn
            .get_or_try_init(|| self.connector.connect())
            .await
            .cloned()
    }
}

#[async_trait]
impl<K: RedisConnector> KvClient for RedisKvClient<K> {
    #[instrument(skip_all)]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let value: Option<Vec<u8>> = cmd.query_async(&mut conn).await.map_err(storage_err)?;
        Ok(value)
    }

    #[instrument(skip_all)]
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        let _: () = cmd.query_async(&mut conn).await.map_err(storage_err)?;
        Ok(())
    }

    #[instrument(skip_all, fields(requested = keys.len()))]
    async fn del(&self, keys: &[String]) -> Result<usize, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key.as_str());
        }
        let removed: usize = cmd.query_async(&mut conn).await.map_err(storage_err)?;
        Ok(removed)
    }
}

/// Process-local key-value service for tests and offline runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKvClient {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryKvClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn key_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, StoreError> {
        self.inner.lock().map_err(|err| StoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

#[async_trait]
impl KvClient for InMemoryKvClient {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<usize, StoreError> {
        let mut map = self.lock()?;
        Ok(keys.iter().filter(|key| map.remove(*key).is_some()).count())
    }
}

/// Metadata store backed by a networked key-value service.
pub struct RemoteKvStore<C: KvClient> {
    client: C,
}

impl<C: KvClient> RemoteKvStore<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

#[async_trait]
impl<C: KvClient> MetadataStore for RemoteKvStore<C> {
    fn name(&self) -> &'static str {
        "remote"
    }

    #[instrument(skip_all)]
    async fn set(&self, key: &str, value: &str) -> Result<String, StoreError> {
        let compressed = codec::compress(value)?;
        self.client
            .set(&codec::address_key(key), compressed.as_bytes())
            .await?;
        Ok(compressed)
    }

    #[instrument(skip_all)]
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let addr = codec::address_key(key);
        let Some(bytes) = self.client.get(&addr).await? else {
            debug!(%addr, "string record not found");
            return Ok(None);
        };

        let text = String::from_utf8(bytes).map_err(|e| StoreError::Decode {
            key: addr.clone(),
            source: CodecError::Encoding {
                reason: e.to_string(),
            },
        })?;
        codec::decompress(&text)
            .map(Some)
            .map_err(|source| StoreError::Decode { key: addr, source })
    }

    #[instrument(skip_all)]
    async fn set_buffer(&self, key: &str, value: &[u8]) -> Result<Vec<u8>, StoreError> {
        self.client.set(&codec::address_key(key), value).await?;
        Ok(value.to_vec())
    }

    #[instrument(skip_all)]
    async fn get_buffer(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.client.get(&codec::address_key(key)).await
    }

    #[instrument(skip_all, fields(requested = keys.len()))]
    async fn del(&self, keys: &[&str]) -> Result<usize, StoreError> {
        let addrs: Vec<String> = keys.iter().map(|key| codec::address_key(key)).collect();
        self.client.del(&addrs).await
    }
}
