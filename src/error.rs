//! Error types for usbipd-tui
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `Display` and `Error` impls.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::session::BusId;

/// Top-level error type for usbipd-tui
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Binding(#[from] BindingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TUI error: {0}")]
    Tui(#[from] TuiError),
}

impl Error {
    /// The binding error underneath, if this is one
    pub fn as_binding(&self) -> Option<&BindingError> {
        match self {
            Error::Binding(e) => Some(e),
            _ => None,
        }
    }
}

/// Failures of the binding session manager and the external tool behind it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("usbipd is not installed or not in PATH")]
    ToolUnavailable,

    #[error("Unexpected usbipd output: {0}")]
    ParseError(String),

    #[error("Device {0} not found (rescan and try again)")]
    DeviceNotFound(BusId),

    #[error("`{command}` failed: {message}")]
    OperationFailed { command: String, message: String },

    #[error("Another device operation is already in progress")]
    OperationInProgress,

    #[error("usbipd did not finish within {0:?}")]
    OperationTimedOut(Duration),
}

impl BindingError {
    /// Whether the caller should rescan and retry
    pub fn is_retryable_after_rescan(&self) -> bool {
        matches!(self, Self::DeviceNotFound(_))
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to create config directory: {0}")]
    DirectoryCreationFailed(PathBuf),
}

/// TUI-related errors
#[derive(Error, Debug)]
pub enum TuiError {
    #[error("Failed to initialize terminal: {0}")]
    InitFailed(String),

    #[error("Failed to restore terminal: {0}")]
    RestoreFailed(String),

    #[error("Render error: {0}")]
    RenderError(String),
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;
