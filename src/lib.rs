//! usbipd-tui - A terminal UI for sharing USB devices with WSL
//!
//! Wraps the `usbipd-win` command-line tool: scan devices, bind (share) and
//! attach them to WSL, detach and unbind them, and install usbipd-win when
//! it is missing.
//!
//! # Architecture
//!
//! All calls into usbipd go through a single [`session::BindingManager`],
//! which owns the device snapshot, rejects overlapping mutations and
//! rescans after every change. The TUI and CLI only talk to the manager.
//!
//! # Modules
//!
//! - [`session`] - Device model and the binding session manager
//! - [`usbipd`] - Subprocess executor, output parser and tool seam
//! - [`tui`] - Event-driven terminal UI with ratatui
//! - [`config`] - Layered configuration
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod session;
pub mod tui;
pub mod usbipd;

pub use config::Config;
pub use error::{BindingError, Error, Result};
pub use session::{BindState, BindingManager, BusId, Device, Session};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
