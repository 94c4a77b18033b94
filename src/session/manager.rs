//! Binding session manager - the single entry point to usbipd
//!
//! Owns the device snapshot and serializes every call into the external
//! tool:
//! - scans share the tool gate and may overlap each other
//! - mutations (bind, unbind, attach, detach, install) take the gate
//!   exclusively, and a second concurrent mutation is rejected outright
//! - every mutation ends with a rescan; local state is never updated
//!   optimistically beyond the transient `Pending` marker

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::{BindingError, Result};
use crate::session::{BindState, BusId, Device, Session};
use crate::usbipd::{parse_device_list, UsbipTool, UsbipdCli};

/// A state-changing request against one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Bind,
    Unbind,
    Attach,
    Detach,
}

/// Coordinates all device operations
pub struct BindingManager {
    /// The external tool
    tool: Arc<dyn UsbipTool>,
    /// Shared for scans, exclusive for mutations
    tool_gate: RwLock<()>,
    /// Held for the whole duration of a mutation
    mutation_slot: Mutex<()>,
    /// Current device snapshot
    session: RwLock<Session>,
}

impl BindingManager {
    /// Create a manager over an arbitrary tool implementation
    pub fn new(tool: Arc<dyn UsbipTool>) -> Self {
        Self {
            tool,
            tool_gate: RwLock::new(()),
            mutation_slot: Mutex::new(()),
            session: RwLock::new(Session::new()),
        }
    }

    /// Create a manager driving the real usbipd CLI
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(UsbipdCli::new(config)))
    }

    /// Copy of the current snapshot
    pub async fn snapshot(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Copy of one device from the current snapshot
    pub async fn device(&self, id: &BusId) -> Option<Device> {
        self.session.read().await.get(id).cloned()
    }

    /// Whether a mutation is currently in flight
    pub fn is_busy(&self) -> bool {
        self.mutation_slot.try_lock().is_err()
    }

    /// List devices and replace the snapshot
    #[instrument(skip(self))]
    pub async fn scan(&self) -> Result<Vec<Device>> {
        let _gate = self.tool_gate.read().await;
        self.rescan().await
    }

    /// Share a device with the virtualization layer
    #[instrument(skip(self))]
    pub async fn bind(&self, id: &BusId) -> Result<Device> {
        self.mutate(id, Mutation::Bind).await
    }

    /// Stop sharing a device, detaching it first if needed
    #[instrument(skip(self))]
    pub async fn unbind(&self, id: &BusId) -> Result<Device> {
        self.mutate(id, Mutation::Unbind).await
    }

    /// Attach a shared device to WSL
    #[instrument(skip(self))]
    pub async fn attach(&self, id: &BusId) -> Result<Device> {
        self.mutate(id, Mutation::Attach).await
    }

    /// Detach a device from WSL, leaving it shared
    #[instrument(skip(self))]
    pub async fn detach(&self, id: &BusId) -> Result<Device> {
        self.mutate(id, Mutation::Detach).await
    }

    /// Make sure usbipd is usable, installing it if it is not
    ///
    /// Returns whether the tool is usable afterwards. Installer failures are
    /// logged and reported as `false`.
    #[instrument(skip(self))]
    pub async fn ensure_tool_installed(&self) -> Result<bool> {
        let _slot = self.claim_mutation_slot()?;
        let _gate = self.tool_gate.write().await;

        if self.tool.is_available().await {
            info!("usbipd is already installed");
            return Ok(true);
        }

        info!("usbipd not found, running installer");
        if let Err(e) = self.tool.install().await {
            warn!("Installer failed: {}", e);
        }

        if !self.tool.is_available().await {
            warn!("usbipd still unavailable after install");
            return Ok(false);
        }

        info!("usbipd installed");
        if let Err(e) = self.rescan().await {
            warn!("Scan after install failed: {}", e);
        }
        Ok(true)
    }

    /// Run one mutation: gate, mark pending, invoke, reconcile
    async fn mutate(&self, id: &BusId, mutation: Mutation) -> Result<Device> {
        let _slot = self.claim_mutation_slot()?;
        let _gate = self.tool_gate.write().await;

        let previous = {
            let mut session = self.session.write().await;
            let attached = session
                .get(id)
                .ok_or_else(|| BindingError::DeviceNotFound(id.clone()))?
                .attached;
            session
                .set_state(id, BindState::Pending, attached)
                .ok_or_else(|| BindingError::DeviceNotFound(id.clone()))?
        };

        info!("{:?} {}", mutation, id);
        let outcome = self.invoke(id, mutation, previous.1).await;

        match self.rescan().await {
            Ok(devices) => {
                outcome?;
                devices
                    .into_iter()
                    .find(|d| &d.id == id)
                    .ok_or_else(|| BindingError::DeviceNotFound(id.clone()).into())
            }
            Err(rescan_err) => {
                warn!("Rescan after {:?} {} failed: {}", mutation, id, rescan_err);
                self.session
                    .write()
                    .await
                    .set_state(id, previous.0, previous.1);
                outcome?;
                Err(rescan_err)
            }
        }
    }

    /// Call the tool for a mutation
    async fn invoke(&self, id: &BusId, mutation: Mutation, attached: bool) -> Result<()> {
        match mutation {
            Mutation::Bind => self.tool.bind(id).await,
            Mutation::Unbind => {
                if attached {
                    self.tool.detach(id).await?;
                }
                self.tool.unbind(id).await
            }
            Mutation::Attach => self.tool.attach(id).await,
            Mutation::Detach => self.tool.detach(id).await,
        }
    }

    /// List and parse without taking the gate; callers hold it
    async fn rescan(&self) -> Result<Vec<Device>> {
        let output = self.tool.list().await?;
        let devices = parse_device_list(&output)?;

        let mut session = self.session.write().await;
        session.replace(devices.clone());
        info!("Scan found {} devices", devices.len());

        Ok(devices)
    }

    fn claim_mutation_slot(&self) -> Result<MutexGuard<'_, ()>> {
        self.mutation_slot
            .try_lock()
            .map_err(|_| BindingError::OperationInProgress.into())
    }
}
