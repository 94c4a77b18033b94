//! User configuration settings
//!
//! Layered configuration: defaults → config file → environment variables

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};

/// Environment variable prefix (`USBIPD_TUI_AUTO_ATTACH=false`)
pub const ENV_PREFIX: &str = "USBIPD_TUI_";

/// Where users can install usbipd-win by hand
pub const MANUAL_INSTALL_URL: &str = "https://github.com/dorssel/usbipd-win";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// usbipd executable name or path
    pub usbipd_program: String,

    /// Installer executable used when usbipd is missing
    pub installer_program: String,

    /// Arguments for an unattended install
    pub installer_args: Vec<String>,

    /// Timeout for a single usbipd command, in seconds
    pub command_timeout_secs: u64,

    /// Timeout for the installer, in seconds
    pub install_timeout_secs: u64,

    /// Run bind/unbind through a UAC prompt (usbipd needs admin rights for them)
    pub elevate: bool,

    /// Attach to WSL right after a successful bind
    pub auto_attach: bool,

    /// WSL distribution to attach to (default distribution if unset)
    pub wsl_distribution: Option<String>,

    /// UI refresh rate in FPS
    pub ui_refresh_fps: u32,

    /// Enable debug logging
    pub debug: bool,

    /// Log file path used in TUI mode
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            usbipd_program: "usbipd".to_string(),
            installer_program: "winget".to_string(),
            installer_args: [
                "install",
                "--exact",
                "dorssel.usbipd-win",
                "--silent",
                "--accept-package-agreements",
                "--accept-source-agreements",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            command_timeout_secs: 30,
            install_timeout_secs: 120,
            elevate: cfg!(windows),
            auto_attach: true,
            wsl_distribution: None,
            ui_refresh_fps: 10,
            debug: false,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration with `path` as the config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()))
            // Layer config file if it exists
            .merge(Toml::file(path))
            // Layer environment variables (USBIPD_TUI_AUTO_ATTACH, etc.)
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every command fail
    pub fn validate(&self) -> Result<()> {
        if self.usbipd_program.trim().is_empty() {
            return Err(invalid("usbipd_program", "must not be empty"));
        }
        if self.command_timeout_secs == 0 {
            return Err(invalid("command_timeout_secs", "must be at least 1"));
        }
        if self.install_timeout_secs == 0 {
            return Err(invalid("install_timeout_secs", "must be at least 1"));
        }
        if self.ui_refresh_fps == 0 {
            return Err(invalid("ui_refresh_fps", "must be at least 1"));
        }
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Log file for TUI mode: configured path or `<data_dir>/usbipd-tui.log`
    pub fn log_file_path(&self) -> Result<PathBuf> {
        match &self.log_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("usbipd-tui.log")),
        }
    }

    /// Ensure the data directory exists (for the log file)
    pub fn ensure_directories(&self) -> Result<()> {
        let log_path = self.log_file_path()?;
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|_e| {
                Error::Config(ConfigError::DirectoryCreationFailed(parent.to_path_buf()))
            })?;
        }
        Ok(())
    }

    /// Save current configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|_e| {
                Error::Config(ConfigError::DirectoryCreationFailed(parent.to_path_buf()))
            })?;
        }

        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        std::fs::write(path, toml).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "usbipd-tui", "usbipd-tui").ok_or_else(|| {
            Error::Config(ConfigError::LoadFailed(
                "Could not determine home directory".to_string(),
            ))
        })
    }
}

fn invalid(key: &str, reason: &str) -> Error {
    Error::Config(ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    })
}
