//! The external tool seam
//!
//! `UsbipTool` is everything the binding manager needs from usbipd-win.
//! `UsbipdCli` implements it by shelling out; tests substitute a fake.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::executor::{Elevation, UsbipdExecutor};
use crate::config::Config;
use crate::error::{BindingError, Error, Result};
use crate::session::BusId;

/// Operations the external tool exposes
#[async_trait]
pub trait UsbipTool: Send + Sync {
    /// Raw output of the device listing command
    async fn list(&self) -> Result<String>;

    /// Share a device
    async fn bind(&self, id: &BusId) -> Result<()>;

    /// Stop sharing a device
    async fn unbind(&self, id: &BusId) -> Result<()>;

    /// Attach a shared device to WSL
    async fn attach(&self, id: &BusId) -> Result<()>;

    /// Detach a device from WSL
    async fn detach(&self, id: &BusId) -> Result<()>;

    /// Whether the tool is installed and answers
    async fn is_available(&self) -> bool;

    /// Run the unattended installer
    async fn install(&self) -> Result<()>;
}

/// usbipd-win driven through its command line
#[derive(Debug, Clone)]
pub struct UsbipdCli {
    usbipd: UsbipdExecutor,
    installer: UsbipdExecutor,
    installer_args: Vec<String>,
    wsl_distribution: Option<String>,
}

impl UsbipdCli {
    /// Build from configuration
    pub fn new(config: &Config) -> Self {
        let usbipd = UsbipdExecutor::new(&config.usbipd_program)
            .with_timeout(Duration::from_secs(config.command_timeout_secs))
            .with_elevation(config.elevate);
        let installer = UsbipdExecutor::new(&config.installer_program)
            .with_timeout(Duration::from_secs(config.install_timeout_secs));

        Self {
            usbipd,
            installer,
            installer_args: config.installer_args.clone(),
            wsl_distribution: config.wsl_distribution.clone(),
        }
    }

    fn attach_args<'a>(&'a self, id: &'a BusId) -> Vec<&'a str> {
        let mut args = vec!["attach", "--wsl"];
        if let Some(distro) = self.wsl_distribution.as_deref() {
            args.push(distro);
        }
        args.extend(["--busid", id.as_str()]);
        args
    }
}

#[async_trait]
impl UsbipTool for UsbipdCli {
    async fn list(&self) -> Result<String> {
        let output = self.usbipd.execute(&["list"], Elevation::None).await?;
        Ok(output.stdout)
    }

    #[instrument(skip(self))]
    async fn bind(&self, id: &BusId) -> Result<()> {
        match self
            .usbipd
            .execute(&["bind", "--busid", id.as_str()], Elevation::Admin)
            .await
        {
            Ok(_) => Ok(()),
            Err(Error::Binding(BindingError::OperationFailed { message, .. }))
                if is_already_bound(&message) =>
            {
                debug!("Device {} was already shared", id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn unbind(&self, id: &BusId) -> Result<()> {
        self.usbipd
            .execute(&["unbind", "--busid", id.as_str()], Elevation::Admin)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn attach(&self, id: &BusId) -> Result<()> {
        self.usbipd
            .execute(&self.attach_args(id), Elevation::None)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn detach(&self, id: &BusId) -> Result<()> {
        self.usbipd
            .execute(&["detach", "--busid", id.as_str()], Elevation::None)
            .await?;
        Ok(())
    }

    async fn is_available(&self) -> bool {
        match self.usbipd.execute(&["list"], Elevation::None).await {
            Ok(_) => true,
            Err(e) => {
                debug!("usbipd availability check failed: {}", e);
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn install(&self) -> Result<()> {
        let args: Vec<&str> = self.installer_args.iter().map(String::as_str).collect();
        info!("Installing usbipd-win: {}", self.installer.command_line(&args));
        self.installer.execute(&args, Elevation::None).await?;
        Ok(())
    }
}

/// usbipd reports an error when sharing a device that is already shared
fn is_already_bound(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("already bound") || message.contains("already shared")
}
