use std::{fs, path::Path, path::PathBuf};

use ipfs_client::prelude::ClientConfig;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "jax-ipfs";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_NODE: &str = "/ip4/127.0.0.1/tcp/5001/http";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory for daily rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    pub client: ClientConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            client: ClientConfig::new(DEFAULT_NODE),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the config file path (custom or default ~/.jax-ipfs/config.toml)
    pub fn config_path(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)).join(CONFIG_FILE_NAME))
    }

    /// Write a new config file. Refuses to overwrite unless `force` is set.
    pub fn init(
        custom_path: Option<PathBuf>,
        config: AppConfig,
        force: bool,
    ) -> Result<Self, StateError> {
        let config_path = Self::config_path(custom_path)?;

        if config_path.exists() && !force {
            return Err(StateError::AlreadyInitialized(config_path));
        }
        config.client.validate()?;

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let config_path = Self::config_path(custom_path)?;
        Self::load_from(&config_path)
    }

    fn load_from(config_path: &Path) -> Result<Self, StateError> {
        if !config_path.exists() {
            return Err(StateError::NotInitialized(config_path.to_path_buf()));
        }

        let config_toml = fs::read_to_string(config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            config_path: config_path.to_path_buf(),
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("no config at {0}. Run 'jax-ipfs init' first")]
    NotInitialized(PathBuf),

    #[error("config already exists at {0} (use --force to overwrite)")]
    AlreadyInitialized(PathBuf),

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("invalid config: {0}")]
    Invalid(#[from] ipfs_client::prelude::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
