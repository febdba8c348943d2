use std::path::PathBuf;

use cipherkv_aead::AeadController;
use cipherkv_storage::{
    file_store::FileKvStore,
    remote_store::{RedisKvClient, RemoteKvStore},
};
use color_eyre::Result;
use dirs::data_dir;
use tracing::debug;

use crate::config::Config;

pub type CliController = AeadController<RemoteKvStore<RedisKvClient>, FileKvStore>;

/// Resolve the default data directory for the file backend.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("cipherkv"))
}

/// Wire both backends and defaults from config.
pub fn controller_from_config(config: &Config) -> Result<CliController> {
    let root = match &config.data_dir {
        Some(root) => root.clone(),
        None => default_data_dir()?,
    };
    let redis = config.redis.clone().unwrap_or_default();
    debug!(?root, "initializing metadata stores");

    let client =
        RedisKvClient::open(&redis).map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
    let mut controller = AeadController::new(RemoteKvStore::new(client), FileKvStore::new(root));
    if let Some(password) = &config.password {
        controller = controller.with_default_password(password.clone());
    }
    if let Some(strategy) = config.strategy {
        controller.set_strategy(strategy);
    }
    Ok(controller)
}

/// Controller with an in-memory remote service and a file backend rooted at `root`.
#[cfg(test)]
pub fn test_controller(
    root: impl Into<PathBuf>,
) -> AeadController<RemoteKvStore<cipherkv_storage::remote_store::InMemoryKvClient>, FileKvStore> {
    AeadController::new(
        RemoteKvStore::new(cipherkv_storage::remote_store::InMemoryKvClient::new()),
        FileKvStore::new(root),
    )
    .with_default_password("health-check")
}
