//! Configuration module
//!
//! Handles user configuration (`config.toml` in the platform config dir,
//! overridable with `USBIPD_TUI_*` environment variables)

mod settings;

pub use settings::*;
