//! Terminal UI module using ratatui
//!
//! Event-driven TUI with:
//! - Device table with live bind state
//! - Background bind/unbind/attach/detach with a status spinner
//! - Modal overlays for confirmation, errors and help

mod app;
mod event;
mod theme;
mod widgets;

pub use app::*;
pub use event::*;
pub use theme::{ColorMode, Theme};
