//! Async usbipd-win integration module
//!
//! - `UsbipdExecutor` - Timed subprocess execution with optional elevation
//! - `parse_device_list` - Parser for `usbipd list` output
//! - `UsbipTool` / `UsbipdCli` - The tool seam used by the binding manager

mod executor;
mod parser;
mod tool;

pub use executor::*;
pub use parser::*;
pub use tool::*;
