//! Core device and session types
//!
//! - `Device` is one USB device as reported by usbipd
//! - `Session` is the manager's snapshot of all devices from the last scan

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bus identifier of a USB device (`1-1`, `2-3.1`)
///
/// Unique only within a single scan; a replugged device may come back
/// under another id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(String);

impl BusId {
    /// Create a bus id from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BusId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BusId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a device is shared with the virtualization layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindState {
    /// Device belongs to the host only
    #[default]
    Unbound,
    /// Device is shared through usbipd
    Bound,
    /// A bind/unbind/attach/detach call is in flight for this device
    Pending,
}

impl BindState {
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for BindState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound => write!(f, "unbound"),
            Self::Bound => write!(f, "bound"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

/// A USB device known to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Bus id, unique within one snapshot
    pub id: BusId,
    /// Vendor/product pair (`046d:c52b`) when the tool reports one
    pub vid_pid: Option<String>,
    /// Human-readable label
    pub description: String,
    /// Current bind state
    pub bind_state: BindState,
    /// Attached to a WSL instance (only meaningful while bound)
    #[serde(default)]
    pub attached: bool,
}

impl Device {
    /// Create an unbound device
    pub fn new(id: impl Into<BusId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vid_pid: None,
            description: description.into(),
            bind_state: BindState::Unbound,
            attached: false,
        }
    }

    pub fn with_vid_pid(mut self, vid_pid: impl Into<String>) -> Self {
        self.vid_pid = Some(vid_pid.into());
        self
    }

    pub fn with_state(mut self, bind_state: BindState, attached: bool) -> Self {
        self.bind_state = bind_state;
        self.attached = attached;
        self
    }

    /// Label for the state column
    pub fn state_label(&self) -> &'static str {
        match (self.bind_state, self.attached) {
            (BindState::Pending, _) => "Pending",
            (BindState::Bound, true) => "Attached",
            (BindState::Bound, false) => "Shared",
            (BindState::Unbound, _) => "Not shared",
        }
    }
}

/// Snapshot of all devices from the most recent scan
///
/// Replaced wholesale on every scan; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    devices: Vec<Device>,
    /// Number of scans that produced this lineage of snapshots
    pub generation: u64,
    /// When the snapshot was taken (`None` before the first scan)
    pub scanned_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Empty session, as at startup
    pub fn new() -> Self {
        Self::default()
    }

    /// Devices in the order the tool listed them
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Look up a device by bus id
    pub fn get(&self, id: &BusId) -> Option<&Device> {
        self.devices.iter().find(|d| &d.id == id)
    }

    /// Number of devices currently shared
    pub fn bound_count(&self) -> usize {
        self.devices.iter().filter(|d| d.bind_state.is_bound()).count()
    }

    /// Replace the device list with a fresh scan result
    pub(crate) fn replace(&mut self, devices: Vec<Device>) {
        self.devices = devices;
        self.generation += 1;
        self.scanned_at = Some(Utc::now());
    }

    /// Overwrite the state of one device, returning its previous state
    pub(crate) fn set_state(
        &mut self,
        id: &BusId,
        bind_state: BindState,
        attached: bool,
    ) -> Option<(BindState, bool)> {
        let device = self.devices.iter_mut().find(|d| &d.id == id)?;
        let previous = (device.bind_state, device.attached);
        device.bind_state = bind_state;
        device.attached = attached;
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_id_display() {
        let id = BusId::from("2-3.1");
        assert_eq!(id.to_string(), "2-3.1");
        assert_eq!(id.as_str(), "2-3.1");
    }

    #[test]
    fn test_state_labels() {
        let device = Device::new("1-1", "Keyboard");
        assert_eq!(device.state_label(), "Not shared");

        let device = device.with_state(BindState::Bound, false);
        assert_eq!(device.state_label(), "Shared");

        let device = device.with_state(BindState::Bound, true);
        assert_eq!(device.state_label(), "Attached");

        let device = device.with_state(BindState::Pending, true);
        assert_eq!(device.state_label(), "Pending");
    }

    #[test]
    fn test_session_replace_bumps_generation() {
        let mut session = Session::new();
        assert!(session.is_empty());
        assert!(session.scanned_at.is_none());

        session.replace(vec![Device::new("1-1", "Keyboard")]);
        assert_eq!(session.len(), 1);
        assert_eq!(session.generation, 1);
        assert!(session.scanned_at.is_some());

        session.replace(Vec::new());
        assert!(session.is_empty());
        assert_eq!(session.generation, 2);
    }

    #[test]
    fn test_session_set_state() {
        let mut session = Session::new();
        session.replace(vec![
            Device::new("1-1", "Keyboard"),
            Device::new("1-2", "Mouse").with_state(BindState::Bound, true),
        ]);

        let previous = session.set_state(&BusId::from("1-2"), BindState::Pending, false);
        assert_eq!(previous, Some((BindState::Bound, true)));
        assert!(session.get(&BusId::from("1-2")).unwrap().bind_state.is_pending());
        assert_eq!(session.bound_count(), 0);

        assert!(session.set_state(&BusId::from("9-9"), BindState::Bound, false).is_none());
    }

    #[test]
    fn test_device_serializes_snake_case_state() {
        let device = Device::new("1-1", "Keyboard").with_vid_pid("046d:c52b");
        let json = serde_json::to_string(&device).unwrap();
        assert!(json.contains("\"id\":\"1-1\""));
        assert!(json.contains("\"bind_state\":\"unbound\""));
    }
}
