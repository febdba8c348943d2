use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use cipherkv_aead::Strategy;
use cipherkv_storage::remote_store::RedisConfig;
use color_eyre::Result;
use serde::{Deserialize, Serialize};

pub const PASSWORD_ENV: &str = "CRYPTO_PASSWORD";
pub const REDIS_URL_ENV: &str = "REDIS_URL";
pub const REDIS_PASSWORD_ENV: &str = "REDIS_PASSWORD";

/// Settings from `<config_dir>/cipherkv/config.toml`, with environment fallbacks.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the file backend's data directory.
    pub data_dir: Option<PathBuf>,
    /// Metadata backend used when no `--store` flag is given.
    pub strategy: Option<Strategy>,
    /// Default password.
    pub password: Option<String>,
    pub redis: Option<RedisConfig>,
}

impl Config {
    /// Location of the user config file.
    pub fn path() -> Result<PathBuf> {
        let base =
            dirs::config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
        Ok(base.join("cipherkv").join("config.toml"))
    }

    /// Parse `path`; a missing or blank file yields defaults.
    pub fn read(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(body) if body.trim().is_empty() => Ok(Self::default()),
            Ok(body) => Ok(toml::from_str(&body)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Fill unset values from the environment; file values take precedence.
    pub fn with_env_fallbacks(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let redis = self.redis.unwrap_or_default();
        Config {
            password: self.password.or_else(|| lookup(PASSWORD_ENV)),
            redis: Some(RedisConfig {
                url: redis.url.or_else(|| lookup(REDIS_URL_ENV)),
                password: redis.password.or_else(|| lookup(REDIS_PASSWORD_ENV)),
            }),
            ..self
        }
    }

    /// Persist to `path` unless something is already there; returns `path` either way.
    pub fn write_if_missing(&self, path: &Path) -> Result<PathBuf> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, toml::to_string_pretty(self)?)?;
        }
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn missing_or_blank_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        assert_eq!(Config::read(&path).expect("missing"), Config::default());

        fs::write(&path, "  \n").expect("write");
        assert_eq!(Config::read(&path).expect("blank"), Config::default());
    }

    #[test]
    fn parses_custom_config() {
        let contents = r#"
            data_dir = "/tmp/cipherkv-data"
            strategy = "file"
            password = "hunter2"
            [redis]
            url = "redis://kv.internal:6379/1"
            password = "r3dis"
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write temp config");

        assert_eq!(
            Config::read(&path).expect("load"),
            Config {
                data_dir: Some(PathBuf::from("/tmp/cipherkv-data")),
                strategy: Some(Strategy::File),
                password: Some("hunter2".into()),
                redis: Some(RedisConfig {
                    url: Some("redis://kv.internal:6379/1".into()),
                    password: Some("r3dis".into()),
                }),
            }
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "strategy = \"s3\"").expect("write");

        assert!(Config::read(&path).is_err());
    }

    #[test]
    fn env_only_fills_gaps() {
        let env: HashMap<&str, &str> = HashMap::from([
            (PASSWORD_ENV, "from-env"),
            (REDIS_URL_ENV, "redis://env:6379"),
            (REDIS_PASSWORD_ENV, "env-secret"),
        ]);
        let lookup = |name: &str| env.get(name).map(|v| v.to_string());

        let empty = Config::default().with_env_fallbacks(lookup);
        assert_eq!(empty.password.as_deref(), Some("from-env"));
        let redis = empty.redis.expect("redis filled");
        assert_eq!(redis.url.as_deref(), Some("redis://env:6379"));
        assert_eq!(redis.password.as_deref(), Some("env-secret"));

        let set = Config {
            password: Some("from-file".into()),
            ..Config::default()
        }
        .with_env_fallbacks(lookup);
        assert_eq!(set.password.as_deref(), Some("from-file"));
    }

    #[test]
    fn write_if_missing_never_clobbers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            data_dir: Some(PathBuf::from("/tmp/cipherkv-data")),
            strategy: Some(Strategy::Remote),
            ..Config::default()
        };

        cfg.write_if_missing(&path).expect("first write");
        let second = Config::default()
            .write_if_missing(&path)
            .expect("second write ok");
        assert_eq!(second, path);
        assert_eq!(Config::read(&path).expect("load"), cfg);
    }
}
