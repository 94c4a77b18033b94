//! Async usbipd command executor
//!
//! Provides non-blocking subprocess execution with:
//! - A timeout per command (the child is killed when it expires)
//! - Optional elevation through PowerShell `Start-Process -Verb RunAs`
//! - Mapping of process outcomes onto `BindingError`

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::error::{BindingError, Result};

/// Default command timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether a command needs administrator rights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elevation {
    /// Run as the current user
    None,
    /// Run through a UAC prompt (output is not captured)
    Admin,
}

/// Captured result of a successful command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Async executor for a single external program
#[derive(Debug, Clone)]
pub struct UsbipdExecutor {
    /// Program to run (`usbipd`, or a full path)
    program: String,
    /// Command timeout
    timeout: Duration,
    /// Honour `Elevation::Admin` requests
    elevate: bool,
}

impl UsbipdExecutor {
    /// Create an executor for `program` with default settings
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_TIMEOUT,
            elevate: false,
        }
    }

    /// Set the command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable elevation for admin commands
    pub fn with_elevation(mut self, elevate: bool) -> Self {
        self.elevate = elevate;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute the program with `args` and return its output
    #[instrument(skip(self), fields(program = %self.program))]
    pub async fn execute(&self, args: &[&str], elevation: Elevation) -> Result<CommandOutput> {
        let command_line = self.command_line(args);

        let mut cmd = if elevation == Elevation::Admin && self.elevate {
            self.elevated_command(args)
        } else {
            let mut cmd = Command::new(&self.program);
            cmd.args(args);
            cmd
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {}", command_line);

        match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();

                if output.status.success() {
                    Ok(CommandOutput { stdout, stderr })
                } else {
                    let message = failure_message(&stdout, &stderr, output.status.code());
                    debug!("{} failed: {}", command_line, message);
                    Err(BindingError::OperationFailed {
                        command: command_line,
                        message,
                    }
                    .into())
                }
            }
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                warn!("{} not found: {}", self.program, e);
                Err(BindingError::ToolUnavailable.into())
            }
            Ok(Err(e)) => {
                warn!("Failed to spawn {}: {}", command_line, e);
                Err(BindingError::OperationFailed {
                    command: command_line,
                    message: e.to_string(),
                }
                .into())
            }
            Err(_) => {
                warn!("{} timed out after {:?}", command_line, self.timeout);
                Err(BindingError::OperationTimedOut(self.timeout).into())
            }
        }
    }

    /// Human-readable command line for logs and error messages
    pub fn command_line(&self, args: &[&str]) -> String {
        if args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, args.join(" "))
        }
    }

    /// Wrap the command in a PowerShell UAC prompt that forwards the exit code
    fn elevated_command(&self, args: &[&str]) -> Command {
        let script = elevation_script(&self.program, args);
        let mut cmd = Command::new("powershell");
        cmd.args(["-NoProfile", "-NonInteractive", "-Command", &script]);
        cmd
    }
}

/// PowerShell script that runs `program` elevated and exits with its code
fn elevation_script(program: &str, args: &[&str]) -> String {
    let quoted: Vec<String> = args.iter().map(|a| quote_ps(a)).collect();
    format!(
        "$p = Start-Process -FilePath {} -ArgumentList {} -Verb RunAs -Wait -PassThru -WindowStyle Hidden; exit $p.ExitCode",
        quote_ps(program),
        quoted.join(","),
    )
}

/// Single-quote a PowerShell literal
fn quote_ps(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Pick the most useful text for a failed command
fn failure_message(stdout: &str, stderr: &str, code: Option<i32>) -> String {
    let stderr = stderr.trim();
    let stdout = stdout.trim();
    if !stderr.is_empty() {
        stderr.to_string()
    } else if !stdout.is_empty() {
        stdout.to_string()
    } else {
        match code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}
