//! TUI widgets
//!
//! - `DeviceTable` - USB device list with bind state

mod device_table;

pub use device_table::*;
