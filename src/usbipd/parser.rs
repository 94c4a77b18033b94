//! Parser for `usbipd list` output
//!
//! The text layout is not a stable contract, so parsing is lenient around the table and strict inside it:
//! - everything before the `BUSID` header is ignored
//! - the device section ends at the next section title (`Persisted:`)
//! - lines that do not start with a bus id are skipped
//! - lines that do start with a bus id must parse, or the whole scan fails

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{BindingError, Result};
use crate::session::{BindState, BusId, Device};

/// Column layout: `BUSID  VID:PID  DEVICE  STATE`, columns separated by 2+ spaces.
/// Descriptions may themselves contain double spaces; state labels never do.
static ROW_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<busid>\d+-\d+(?:\.\d+)*)\s+(?P<vidpid>[0-9a-fA-F]{4}:[0-9a-fA-F]{4})\s+(?P<desc>.+)\s{2,}(?P<state>\S+(?: \S+)*)$",
    )
    .unwrap()
});

/// A line that claims to be a device row
static BUSID_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+-\d+(?:\.\d+)*(?:\s|$)").unwrap());

static COLUMN_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// Parse the device table printed by `usbipd list`
///
/// Blank output yields no devices. Duplicate bus ids keep the first row.
pub fn parse_device_list(output: &str) -> Result<Vec<Device>> {
    let mut lines = output.lines();

    let found_header = lines
        .by_ref()
        .any(|line| line.to_ascii_uppercase().contains("BUSID"));

    if !found_header {
        if output.trim().is_empty() {
            return Ok(Vec::new());
        }
        return Err(BindingError::ParseError("missing BUSID header".to_string()).into());
    }

    let mut devices = Vec::new();
    let mut seen = HashSet::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if !BUSID_PREFIX.is_match(line) {
            if line.ends_with(':') {
                debug!("Device section ended at '{}'", line);
                break;
            }
            // Separators, notes and other chatter
            continue;
        }

        let device = parse_row(line)?;
        if seen.insert(device.id.clone()) {
            devices.push(device);
        } else {
            warn!("Duplicate bus id {} in usbipd output, keeping first", device.id);
        }
    }

    Ok(devices)
}

/// Parse a single device row
fn parse_row(line: &str) -> Result<Device> {
    let (busid, vid_pid, description, state) = if let Some(caps) = ROW_PATTERN.captures(line) {
        (
            caps["busid"].to_string(),
            Some(caps["vidpid"].to_ascii_lowercase()),
            caps["desc"].trim().to_string(),
            caps["state"].trim().to_string(),
        )
    } else {
        let parts: Vec<&str> = COLUMN_SPLIT.split(line).collect();
        if parts.len() < 4 {
            return Err(BindingError::ParseError(format!("malformed device row: '{}'", line)).into());
        }
        (
            parts[0].to_string(),
            Some(parts[1].to_ascii_lowercase()),
            parts[2..parts.len() - 1].join("  "),
            parts[parts.len() - 1].to_string(),
        )
    };

    let (bind_state, attached) = parse_state(&state).ok_or_else(|| {
        BindingError::ParseError(format!("unknown state '{}' for device {}", state, busid))
    })?;

    Ok(Device {
        id: BusId::new(busid),
        vid_pid,
        description,
        bind_state,
        attached,
    })
}

/// Map the STATE column to a bind state and attached flag
///
/// Covers both the current (`Not shared` / `Shared` / `Attached`) and the
/// older `usbipd wsl list` (`Not attached` / `Attached - Ubuntu`) wording.
pub fn parse_state(label: &str) -> Option<(BindState, bool)> {
    let label = label.trim().to_ascii_lowercase();

    match label.as_str() {
        "not shared" | "not bound" | "not attached" => Some((BindState::Unbound, false)),
        "shared" | "bound" => Some((BindState::Bound, false)),
        "attached" => Some((BindState::Bound, true)),
        // `Attached - Ubuntu`
        _ if label
            .strip_prefix("attached - ")
            .is_some_and(|distro| !distro.trim().is_empty()) =>
        {
            Some((BindState::Bound, true))
        }
        // `Shared (forced)`
        _ if label.starts_with("shared (") && label.ends_with(')') => {
            Some((BindState::Bound, false))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const CURRENT_FORMAT: &str = "\
Connected:
BUSID  VID:PID    DEVICE                                                        STATE
1-1    046d:c52b  Logitech USB Input Device, USB Input Device                   Not shared
1-4    8087:0029  Intel(R) Wireless Bluetooth(R)                                Shared
2-3    0bda:5634  USB2.0 HD UVC WebCam                                          Attached
3-1.2  0483:374B  STM32 STLink, USB Mass Storage Device                         Shared (forced)

Persisted:
GUID                                  DEVICE
4a8c2f2e-5b7e-4c1c-9c6e-4a2b0e1f6a11  USB Serial Device (COM3)
";

    const LEGACY_FORMAT: &str = "\
BUSID  VID:PID    DEVICE                                                        STATE
1-7    1a86:7523  USB-SERIAL CH340 (COM4)                                       Not attached
1-9    2341:0043  Arduino Uno (COM5)                                            Attached - Ubuntu
";

    fn ids(devices: &[Device]) -> Vec<&str> {
        devices.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_parse_current_format() {
        let devices = parse_device_list(CURRENT_FORMAT).unwrap();
        assert_eq!(ids(&devices), vec!["1-1", "1-4", "2-3", "3-1.2"]);

        assert_eq!(
            devices[0],
            Device::new("1-1", "Logitech USB Input Device, USB Input Device")
                .with_vid_pid("046d:c52b")
        );
        assert_eq!(devices[1].bind_state, BindState::Bound);
        assert!(!devices[1].attached);
        assert_eq!(devices[2].bind_state, BindState::Bound);
        assert!(devices[2].attached);
        assert_eq!(devices[3].vid_pid.as_deref(), Some("0483:374b"));
        assert_eq!(devices[3].bind_state, BindState::Bound);
    }

    #[test]
    fn test_parse_legacy_format() {
        let devices = parse_device_list(LEGACY_FORMAT).unwrap();
        assert_eq!(ids(&devices), vec!["1-7", "1-9"]);
        assert_eq!(devices[0].bind_state, BindState::Unbound);
        assert!(devices[1].attached);
    }

    #[test]
    fn test_blank_output_is_empty() {
        assert!(parse_device_list("").unwrap().is_empty());
        assert!(parse_device_list("\n  \n").unwrap().is_empty());
    }

    #[test]
    fn test_header_only_is_empty() {
        let output = "Connected:\nBUSID  VID:PID    DEVICE    STATE\n\nPersisted:\nGUID  DEVICE\n";
        assert!(parse_device_list(output).unwrap().is_empty());
    }

    #[test]
    fn test_missing_header_is_parse_error() {
        let err = parse_device_list("Unknown command 'list'.\n").unwrap_err();
        assert!(matches!(
            err.as_binding(),
            Some(BindingError::ParseError(_))
        ));
    }

    #[test]
    fn test_malformed_row_is_parse_error() {
        let output = "BUSID  VID:PID    DEVICE    STATE\n1-1 garbage\n";
        let err = parse_device_list(output).unwrap_err();
        match err.as_binding() {
            Some(BindingError::ParseError(msg)) => assert!(msg.contains("1-1 garbage")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_state_is_parse_error() {
        let output = "BUSID  VID:PID    DEVICE          STATE\n1-1    046d:c52b  Mouse           Exploded\n";
        assert!(parse_device_list(output).is_err());
    }

    #[test]
    fn test_chatter_lines_are_ignored() {
        let output = "\
usbipd: warning: Unknown USB filter 'edevmon' may be incompatible with this software.
BUSID  VID:PID    DEVICE          STATE
------------------------------------------
1-1    046d:c52b  Mouse           Not shared
note: some devices are hidden
";
        let devices = parse_device_list(output).unwrap();
        assert_eq!(ids(&devices), vec!["1-1"]);
    }

    #[test]
    fn test_fallback_split_without_vid_pid_pattern() {
        let output = "BUSID  VID:PID    DEVICE          STATE\n1-2    unknown    Hub             Shared\n";
        let devices = parse_device_list(output).unwrap();
        assert_eq!(devices[0].description, "Hub");
        assert_eq!(devices[0].vid_pid.as_deref(), Some("unknown"));
        assert!(devices[0].bind_state.is_bound());
    }

    #[test]
    fn test_duplicates_keep_first() {
        let output = "\
BUSID  VID:PID    DEVICE          STATE
1-1    046d:c52b  Mouse           Not shared
1-1    046d:c52b  Mouse again     Shared
";
        let devices = parse_device_list(output).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].description, "Mouse");
    }

    #[test]
    fn test_parse_state_wording() {
        assert_eq!(parse_state("Not shared"), Some((BindState::Unbound, false)));
        assert_eq!(parse_state("NOT BOUND"), Some((BindState::Unbound, false)));
        assert_eq!(parse_state("Shared"), Some((BindState::Bound, false)));
        assert_eq!(parse_state("Attached - Debian"), Some((BindState::Bound, true)));
        assert_eq!(parse_state("Shared (forced)"), Some((BindState::Bound, false)));
        assert_eq!(parse_state("Attached"), Some((BindState::Bound, true)));

        assert_eq!(parse_state("Pending"), None);
        assert_eq!(parse_state("Not ready"), None);
        assert_eq!(parse_state("Attachedness"), None);
        assert_eq!(parse_state("Attached - "), None);
        assert_eq!(parse_state("Sharedish"), None);
    }

    #[test]
    fn test_description_with_double_spaces() {
        let output = "\
BUSID  VID:PID  DEVICE  STATE
1-1    0781:5567  SanDisk  Cruzer Blade           Not shared
2-2    046d:c52b  Mouse    Shared
3-3    0483:374b  ST  Link  Debug                 Attached - Ubuntu
";
        let devices = parse_device_list(output).unwrap();
        assert_eq!(ids(&devices), vec!["1-1", "2-2", "3-3"]);
        assert_eq!(devices[0].description, "SanDisk  Cruzer Blade");
        assert_eq!(devices[0].bind_state, BindState::Unbound);
        assert_eq!(devices[1].description, "Mouse");
        assert!(devices[1].bind_state.is_bound());
        assert_eq!(devices[2].description, "ST  Link  Debug");
        assert!(devices[2].attached);
    }

    proptest! {
        #[test]
        fn parsed_ids_are_unique(
            rows in proptest::collection::vec((1u8..4, 1u8..4, 0usize..3), 0..20)
        ) {
            let states = ["Not shared", "Shared", "Attached"];
            let mut output = String::from("BUSID  VID:PID    DEVICE          STATE\n");
            for (bus, port, state) in &rows {
                output.push_str(&format!(
                    "{}-{}    046d:c52b  Device {}{}  {}\n",
                    bus, port, bus, port, states[*state]
                ));
            }

            let devices = parse_device_list(&output).unwrap();
            let unique: HashSet<_> = devices.iter().map(|d| d.id.clone()).collect();
            prop_assert_eq!(unique.len(), devices.len());
        }
    }
}
