//! usbipd-tui - Terminal UI for sharing USB devices with WSL
//!
//! Run with `usbipd-tui` or `usbipd-tui --help` for usage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use usbipd_tui::{
    config::MANUAL_INSTALL_URL, tui::App, BindingManager, BusId, Config, Device, APP_NAME,
    VERSION,
};

#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(version = VERSION)]
#[command(about = "A terminal UI for sharing USB devices with WSL through usbipd-win")]
#[command(long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive TUI (default)
    Tui,

    /// List USB devices and their state
    List {
        /// Print the devices as JSON
        #[arg(long)]
        json: bool,
    },

    /// Bind (share) a device, then attach it to WSL
    Bind {
        /// Bus id, e.g. 1-4
        busid: String,

        /// Only bind, don't attach
        #[arg(long)]
        no_attach: bool,
    },

    /// Unbind a device, detaching it first if attached
    Unbind {
        /// Bus id, e.g. 1-4
        busid: String,
    },

    /// Attach a bound device to WSL
    Attach {
        /// Bus id, e.g. 1-4
        busid: String,
    },

    /// Detach a device from WSL
    Detach {
        /// Bus id, e.g. 1-4
        busid: String,
    },

    /// Install usbipd-win if it is missing
    Install,

    /// Show configuration
    Config {
        /// Initialize config file with defaults
        #[arg(long)]
        init: bool,
    },
}

fn setup_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        // Use info level for our crate, warn for dependencies
        EnvFilter::new("info").add_directive("tokio=warn".parse()?)
    };

    if let Some(path) = log_file {
        // Log to file when running TUI (so logs don't interfere with display)
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(file).with_target(false))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(filter)
            .init();
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Config {
    let loaded = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    loaded.unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config, using defaults: {}", e);
        Config::default()
    })
}

fn print_device(device: &Device) {
    println!(
        "  {:<8} {:<10} {:<40} {}",
        device.id,
        device.vid_pid.as_deref().unwrap_or("-"),
        device.description,
        device.state_label()
    );
}

/// Bus id from the command line; scans first so the manager knows the device
async fn prepare(manager: &BindingManager, busid: &str) -> Result<BusId> {
    manager.scan().await?;
    Ok(BusId::new(busid))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre error hooks
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());
    let debug = cli.debug || config.debug;

    // Ensure the log directory exists
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Failed to create directories: {}", e);
    }

    let manager = Arc::new(BindingManager::from_config(&config));

    match cli.command {
        None | Some(Commands::Tui) => {
            // Setup logging to file for TUI mode
            let log_file = config.log_file_path()?;
            setup_logging(debug, Some(&log_file))?;

            info!("Starting usbipd-tui v{}", VERSION);

            let mut app = App::new(config, manager);
            app.run().await?;

            info!("usbipd-tui exited");
        }

        Some(Commands::List { json }) => {
            setup_logging(debug, None)?;

            let devices = manager.scan().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
                return Ok(());
            }

            if devices.is_empty() {
                println!("No USB devices found.");
                return Ok(());
            }

            println!(
                "  {:<8} {:<10} {:<40} {}",
                "BUSID", "VID:PID", "DEVICE", "STATE"
            );
            for device in &devices {
                print_device(device);
            }
        }

        Some(Commands::Bind { busid, no_attach }) => {
            setup_logging(debug, None)?;

            println!("Binding {}...", busid);
            let device = manager.bind(&prepare(&manager, &busid).await?).await?;
            println!("Device {} is shared.", device.id);

            if no_attach || !config.auto_attach || device.attached {
                return Ok(());
            }

            println!("Attaching {} to WSL...", device.id);
            match manager.attach(&device.id).await {
                Ok(device) => println!("Device {} attached to WSL.", device.id),
                Err(e) => {
                    warn!("Attach after bind failed: {}", e);
                    return Err(eyre!(
                        "Device {} is bound but attaching to WSL failed: {}",
                        device.id,
                        e
                    ));
                }
            }
        }

        Some(Commands::Unbind { busid }) => {
            setup_logging(debug, None)?;

            let device = manager.unbind(&prepare(&manager, &busid).await?).await?;
            println!("Device {} is no longer shared.", device.id);
        }

        Some(Commands::Attach { busid }) => {
            setup_logging(debug, None)?;

            let device = manager.attach(&prepare(&manager, &busid).await?).await?;
            println!("Device {} attached to WSL.", device.id);
        }

        Some(Commands::Detach { busid }) => {
            setup_logging(debug, None)?;

            let device = manager.detach(&prepare(&manager, &busid).await?).await?;
            println!("Device {} detached from WSL.", device.id);
        }

        Some(Commands::Install) => {
            setup_logging(debug, None)?;

            println!("Checking for usbipd-win...");
            if manager.ensure_tool_installed().await? {
                println!("usbipd-win is installed.");
            } else {
                return Err(eyre!(
                    "usbipd-win could not be installed automatically. Install it manually from {}",
                    MANUAL_INSTALL_URL
                ));
            }
        }

        Some(Commands::Config { init }) => {
            setup_logging(debug, None)?;

            let path = match cli.config {
                Some(path) => path,
                None => Config::config_file_path()?,
            };

            if init {
                config.save_to(&path)?;
                println!("Configuration initialized at {:?}", path);
            } else {
                println!("Configuration:");
                println!("{}", toml::to_string_pretty(&config)?);
                println!("\nConfig file: {:?}", path);
                println!("Log file: {:?}", config.log_file_path()?);
            }
        }
    }

    Ok(())
}
