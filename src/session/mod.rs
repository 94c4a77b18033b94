//! Binding session module
//!
//! - `Device` / `Session` - the in-memory view of host USB devices
//! - `BindingManager` - serializes usbipd calls and reconciles state

mod manager;
mod types;

pub use manager::*;
pub use types::*;
