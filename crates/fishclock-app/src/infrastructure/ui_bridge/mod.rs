//! Command bridge: the backend configuration service and the commands the
//! views invoke on it.
//!
//! # The backend service
//!
//! [`ConfigService`] owns the durable configuration.  It is created once per
//! process, before any window opens, and every window reaches it through
//! the same two commands:
//!
//! ```js
//! const current = await invoke("get_config");
//! await invoke("update_config", { cfg: edited });
//! ```
//!
//! The service validates every update.  Windows never validate; they only
//! learn about a rejected value from the command's error.
//!
//! # `CommandResult<T>` wrapper
//!
//! Commands return `CommandResult<T>` rather than `Result<T, E>`, so every
//! response has the same JSON shape:
//! `{ success: bool, data: T | null, error: string | null }`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fishclock_core::{Config, ConfigValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::infrastructure::storage::config::{
    config_file_path, load_config_file, save_config_file, StorageError,
};

/// Error type for the backend configuration service.
#[derive(Debug, Error)]
pub enum ConfigServiceError {
    /// Reading or writing the configuration file failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The submitted record failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigValidationError),
}

/// The process-wide owner of the configuration file.
///
/// The in-memory record sits behind an async mutex because commands run
/// concurrently on the tokio runtime and an update holds the lock across
/// the file write.
pub struct ConfigService {
    config: Mutex<Config>,
    path: PathBuf,
}

impl ConfigService {
    /// Opens the service on the file at `path`.
    ///
    /// A missing file is created with the default record.  A file that does
    /// not parse is logged and overwritten with the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigServiceError::Storage`] for I/O failures, including
    /// failure to write the defaults.
    pub fn open(path: impl Into<PathBuf>) -> Result<Arc<Self>, ConfigServiceError> {
        let path = path.into();
        let config = match load_config_file(&path) {
            Ok(Some(config)) => {
                info!(path = %path.display(), "loaded configuration");
                config
            }
            Ok(None) => {
                info!(path = %path.display(), "no configuration file, writing defaults");
                let config = Config::default();
                save_config_file(&path, &config)?;
                config
            }
            Err(StorageError::Parse(e)) => {
                warn!(path = %path.display(), "unreadable configuration, resetting to defaults: {e}");
                let config = Config::default();
                save_config_file(&path, &config)?;
                config
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Arc::new(Self {
            config: Mutex::new(config),
            path,
        }))
    }

    /// Opens the service on the platform config file.
    ///
    /// # Errors
    ///
    /// As [`open`](Self::open), plus [`StorageError::NoPlatformConfigDir`].
    pub fn open_default() -> Result<Arc<Self>, ConfigServiceError> {
        Self::open(config_file_path()?)
    }

    /// The file this service reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of the current record.
    pub async fn get_config(&self) -> Config {
        self.config.lock().await.clone()
    }

    /// Validates `config`, makes it current, and writes it to disk.
    ///
    /// The in-memory record is replaced before the write, so a failed write
    /// still leaves the new value current for this process.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigServiceError::Invalid`] (nothing changes) or
    /// [`ConfigServiceError::Storage`] if the write fails.
    pub async fn update_config(&self, config: Config) -> Result<(), ConfigServiceError> {
        if let Err(e) = config.validate() {
            warn!("rejected configuration update: {e}");
            return Err(e.into());
        }

        let mut current = self.config.lock().await;
        *current = config;
        match save_config_file(&self.path, &current) {
            Ok(()) => {
                info!(path = %self.path.display(), "configuration saved");
                Ok(())
            }
            Err(e) => {
                warn!(path = %self.path.display(), "failed to save configuration: {e}");
                Err(e.into())
            }
        }
    }
}

/// Unified response wrapper used by commands.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Returns the current configuration record.
pub async fn get_config(service: Arc<ConfigService>) -> CommandResult<Config> {
    CommandResult::ok(service.get_config().await)
}

/// Validates, applies and persists a configuration record from a view.
pub async fn update_config(service: Arc<ConfigService>, cfg: Config) -> CommandResult<()> {
    match service.update_config(cfg).await {
        Ok(()) => CommandResult::ok(()),
        Err(e) => CommandResult::err(e.to_string()),
    }
}
