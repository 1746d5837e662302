//! TOML persistence for the Fish Clock configuration record.
//!
//! The record lives in one file in the platform config directory:
//! - Windows:  `%APPDATA%\FishClock\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/fishclock/config.toml` (or `~/.config/fishclock`)
//! - macOS:    `~/Library/Application Support/FishClock/config.toml`
//!
//! Keys use the same camelCase names as the notification envelope:
//!
//! ```toml
//! workStartHour = 9
//! workEndHour = 18
//! monthlySalary = 15000
//! payday = 25
//! opacity = 0.9
//! ```
//!
//! Missing keys take their default values, so a file written by an older
//! build still loads.

use std::path::{Path, PathBuf};

use fishclock_core::Config;
use thiserror::Error;

/// File name inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The record could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`StorageError::NoPlatformConfigDir`] when neither the platform
/// variable nor `HOME` is set.
pub fn config_dir() -> Result<PathBuf, StorageError> {
    platform_config_dir().ok_or(StorageError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`StorageError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, StorageError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Reads the record at `path`.
///
/// Returns `Ok(None)` when the file does not exist yet (first run).
///
/// # Errors
///
/// Returns [`StorageError::Io`] for file-system errors other than "not found",
/// and [`StorageError::Parse`] if the TOML is malformed.
pub fn load_config_file(path: &Path) -> Result<Option<Config>, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(toml::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`StorageError::Io`] for file-system failures or
/// [`StorageError::Serialize`] if serialization fails.
pub fn save_config_file(path: &Path, config: &Config) -> Result<(), StorageError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("FishClock"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("fishclock"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("FishClock")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}
