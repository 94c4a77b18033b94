//! Main TUI application
//!
//! Event-driven application that coordinates:
//! - Terminal rendering with ratatui
//! - User input handling
//! - Device operations run on background tasks, reported back as events

use std::future::Future;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use throbber_widgets_tui::{Throbber, ThrobberState};
use tracing::{debug, info, warn};

use super::event::{AppEvent, DeviceAction, EventLoop, InputEvent, StateUpdate, UserCommand};
use super::theme::Theme;
use super::widgets::{DeviceTable, DeviceTableState};
use crate::config::{Config, MANUAL_INSTALL_URL};
use crate::error::{BindingError, Error, Result, TuiError};
use crate::session::{BindingManager, BusId, Device};

/// Frames for the pending marker in the state column
const PENDING_FRAMES: [&str; 4] = ["◐", "◓", "◑", "◒"];

/// Modal dialog state
#[derive(Debug, Clone)]
pub enum Modal {
    /// No modal open
    None,
    /// Confirmation modal
    Confirm {
        title: String,
        message: String,
        on_confirm: ConfirmAction,
    },
    /// Help modal
    Help,
    /// Error modal
    Error { message: String },
}

/// Action to perform when the confirm modal is confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    Device { action: DeviceAction, id: BusId },
    Install,
}

/// Application UI state
pub struct AppUiState {
    /// Device table selection
    pub table_state: DeviceTableState,
    /// Copy of the manager's latest snapshot
    pub devices: Vec<Device>,
    /// When the snapshot was taken
    pub scanned_at: Option<DateTime<Utc>>,
    /// Shared devices in the snapshot
    pub shared_count: usize,
    /// Current modal
    pub modal: Modal,
    /// Status message
    pub status_message: Option<String>,
    /// A device operation is in flight
    pub busy: bool,
    /// Status bar spinner
    pub throbber: ThrobberState,
    /// Tick counter for the pending marker
    pub frame: usize,
    /// Should quit
    pub should_quit: bool,
}

impl Default for AppUiState {
    fn default() -> Self {
        Self {
            table_state: DeviceTableState::new(),
            devices: Vec::new(),
            scanned_at: None,
            shared_count: 0,
            modal: Modal::None,
            status_message: None,
            busy: false,
            throbber: ThrobberState::default(),
            frame: 0,
            should_quit: false,
        }
    }
}

impl AppUiState {
    /// Currently selected device
    pub fn selected_device(&self) -> Option<&Device> {
        self.table_state
            .selected()
            .and_then(|idx| self.devices.get(idx))
    }
}

/// Main TUI application
pub struct App {
    /// Configuration
    config: Config,
    /// Binding manager (shared with background tasks)
    manager: Arc<BindingManager>,
    /// UI state
    ui_state: AppUiState,
    /// Event loop
    event_loop: EventLoop,
    /// Colors
    theme: Theme,
}

impl App {
    /// Create a new application
    pub fn new(config: Config, manager: Arc<BindingManager>) -> Self {
        Self {
            config,
            manager,
            ui_state: AppUiState::default(),
            event_loop: EventLoop::new(),
            theme: Theme::default(),
        }
    }

    /// Run the application until the user quits
    pub async fn run(&mut self) -> Result<()> {
        let tick_rate = Duration::from_millis(1000 / self.config.ui_refresh_fps.max(1) as u64);
        self.event_loop.start(tick_rate);

        self.ui_state.status_message = Some("Scanning devices…".to_string());
        self.spawn_scan();

        let mut terminal = self.setup_terminal()?;
        info!("Entering main loop");
        let result = self.main_loop(&mut terminal).await;
        info!("Main loop exited, ok: {}", result.is_ok());

        self.restore_terminal(&mut terminal)?;
        result
    }

    /// Setup terminal for TUI
    fn setup_terminal(&self) -> Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode().map_err(|e| TuiError::InitFailed(e.to_string()))?;

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).map_err(|e| TuiError::InitFailed(e.to_string()))?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend).map_err(|e| TuiError::InitFailed(e.to_string()))?;

        Ok(terminal)
    }

    /// Restore terminal to normal state
    fn restore_terminal(&self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        disable_raw_mode().map_err(|e| TuiError::RestoreFailed(e.to_string()))?;

        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .map_err(|e| TuiError::RestoreFailed(e.to_string()))?;

        terminal
            .show_cursor()
            .map_err(|e| TuiError::RestoreFailed(e.to_string()))?;

        Ok(())
    }

    /// Main event loop
    async fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal
                .draw(|f| self.render(f))
                .map_err(|e| TuiError::RenderError(e.to_string()))?;

            match self.event_loop.next().await {
                Some(AppEvent::Input(input)) => self.handle_input(input),
                Some(AppEvent::StateUpdate(update)) => {
                    self.handle_state_update(update);
                    self.refresh_devices().await;
                }
                Some(AppEvent::Tick) => {
                    self.ui_state.throbber.calc_next();
                    self.ui_state.frame = self.ui_state.frame.wrapping_add(1);
                    self.refresh_devices().await;
                }
                None => break,
            }

            if self.ui_state.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Pull a fresh copy of the manager's snapshot
    async fn refresh_devices(&mut self) {
        let snapshot = self.manager.snapshot().await;
        self.ui_state.devices = snapshot.devices().to_vec();
        self.ui_state.scanned_at = snapshot.scanned_at;
        self.ui_state.shared_count = snapshot.bound_count();
        self.ui_state
            .table_state
            .set_item_count(self.ui_state.devices.len());
        self.ui_state.busy = self.manager.is_busy();
    }

    /// Render the UI
    fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(frame.area());

        self.render_title(frame, chunks[0]);
        self.render_devices(frame, chunks[1]);
        self.render_status_bar(frame, chunks[2]);
        self.render_modal(frame, frame.area());
    }

    fn render_title(&self, frame: &mut Frame, area: Rect) {
        let scanned = match self.ui_state.scanned_at {
            Some(at) => format!("scanned {}", at.with_timezone(&Local).format("%H:%M:%S")),
            None => "not scanned".to_string(),
        };

        let line = Line::from(vec![
            Span::styled(
                " usbipd-tui ",
                Style::default()
                    .fg(self.theme.text_accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(
                    " {} devices, {} shared, {}",
                    self.ui_state.devices.len(),
                    self.ui_state.shared_count,
                    scanned
                ),
                Style::default().fg(self.theme.text_secondary),
            ),
        ]);

        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_devices(&mut self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(" USB Devices ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border));

        let symbol = PENDING_FRAMES[self.ui_state.frame % PENDING_FRAMES.len()];
        let table = DeviceTable::new(&self.ui_state.devices, &self.theme)
            .block(block)
            .pending_symbol(symbol);

        frame.render_stateful_widget(table, area, &mut self.ui_state.table_state.table_state);
    }

    fn render_status_bar(&mut self, frame: &mut Frame, area: Rect) {
        let text = self.ui_state.status_message.clone().unwrap_or_else(|| {
            "r: rescan | b: bind | u: unbind | a: attach | d: detach | i: install | ?: help | q: quit"
                .to_string()
        });

        if self.ui_state.busy {
            let throbber = Throbber::default()
                .label(text)
                .style(self.theme.status_bar());
            frame.render_stateful_widget(throbber, area, &mut self.ui_state.throbber);
        } else {
            frame.render_widget(Paragraph::new(text).style(self.theme.status_bar()), area);
        }
    }

    /// Render modal overlay
    fn render_modal(&self, frame: &mut Frame, area: Rect) {
        let (title, body, color) = match &self.ui_state.modal {
            Modal::None => return,
            Modal::Confirm { title, message, .. } => (
                title.clone(),
                format!("{}\n\n[Enter/y] Confirm  [Esc/n] Cancel", message),
                self.theme.modal_warning,
            ),
            Modal::Error { message } => (
                "Error".to_string(),
                format!("{}\n\nPress any key to close.", message),
                self.theme.modal_error,
            ),
            Modal::Help => ("Help".to_string(), HELP_TEXT.to_string(), self.theme.modal_info),
        };

        let modal_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, modal_area);

        let block = Block::default()
            .title(format!(" {} ", title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color));

        let inner = block.inner(modal_area);
        frame.render_widget(block, modal_area);
        frame.render_widget(
            Paragraph::new(body)
                .style(Style::default().fg(self.theme.text_primary))
                .wrap(Wrap { trim: false }),
            inner,
        );
    }

    /// Handle input events
    fn handle_input(&mut self, input: InputEvent) {
        match input {
            InputEvent::Key(key) => {
                let command = UserCommand::from_key(key);

                if !matches!(self.ui_state.modal, Modal::None) {
                    self.handle_modal_command(command);
                    return;
                }

                if let Some(cmd) = command {
                    self.handle_command(cmd);
                }
            }
            InputEvent::Resize(_, _) => {}
        }
    }

    /// Handle a key while a modal is open
    fn handle_modal_command(&mut self, command: Option<UserCommand>) {
        let Modal::Confirm { on_confirm, .. } = &self.ui_state.modal else {
            // Any key closes help/error
            self.ui_state.modal = Modal::None;
            return;
        };

        match command {
            Some(UserCommand::Confirm) => {
                let action = on_confirm.clone();
                self.ui_state.modal = Modal::None;
                self.handle_confirm(action);
            }
            Some(UserCommand::Cancel) | Some(UserCommand::Quit) => {
                self.ui_state.modal = Modal::None;
                self.ui_state.status_message = Some("Cancelled".to_string());
            }
            _ => {}
        }
    }

    /// Handle a user command
    fn handle_command(&mut self, cmd: UserCommand) {
        match cmd {
            UserCommand::NavigateUp => self.ui_state.table_state.previous(),
            UserCommand::NavigateDown => self.ui_state.table_state.next(),
            UserCommand::Refresh => {
                self.ui_state.status_message = Some("Scanning devices…".to_string());
                self.spawn_scan();
            }
            UserCommand::Bind => self.request_device_action(DeviceAction::Bind),
            UserCommand::Unbind => self.request_device_action(DeviceAction::Unbind),
            UserCommand::Attach => self.request_device_action(DeviceAction::Attach),
            UserCommand::Detach => self.request_device_action(DeviceAction::Detach),
            UserCommand::Install => {
                self.ui_state.modal = Modal::Confirm {
                    title: "Install usbipd-win".to_string(),
                    message: install_message(&self.config),
                    on_confirm: ConfirmAction::Install,
                };
            }
            UserCommand::ShowHelp => self.ui_state.modal = Modal::Help,
            UserCommand::Quit => self.ui_state.should_quit = true,
            UserCommand::Cancel | UserCommand::Confirm => {}
        }
    }

    /// Start a device action; bind and unbind ask first
    fn request_device_action(&mut self, action: DeviceAction) {
        let Some(device) = self.ui_state.selected_device().cloned() else {
            self.ui_state.status_message = Some("Select a device first".to_string());
            return;
        };

        match action {
            DeviceAction::Bind | DeviceAction::Unbind => {
                self.ui_state.modal = Modal::Confirm {
                    title: confirm_title(action).to_string(),
                    message: confirm_message(action, &device, &self.config),
                    on_confirm: ConfirmAction::Device {
                        action,
                        id: device.id,
                    },
                };
            }
            DeviceAction::Attach | DeviceAction::Detach => {
                self.spawn_device_action(action, device.id, false);
            }
        }
    }

    /// Handle confirmation
    fn handle_confirm(&mut self, action: ConfirmAction) {
        match action {
            ConfirmAction::Device { action, id } => self.spawn_device_action(action, id, false),
            ConfirmAction::Install => {
                self.ui_state.status_message = Some(format!(
                    "Installing usbipd-win via {}…",
                    self.config.installer_program
                ));
                self.ui_state.busy = true;
                let manager = self.manager.clone();
                self.spawn_task(async move {
                    match manager.ensure_tool_installed().await {
                        Ok(available) => StateUpdate::ToolChecked { available },
                        Err(e) => failure("Install", e),
                    }
                });
            }
        }
    }

    /// Handle results from background tasks
    fn handle_state_update(&mut self, update: StateUpdate) {
        match update {
            StateUpdate::Scanned { count } => {
                self.ui_state.status_message =
                    Some(format!("Scan complete: {} USB devices", count));
            }
            StateUpdate::DeviceUpdated { action, device } => {
                info!("Device {} {}", device.id, action.done());
                self.ui_state.status_message =
                    Some(format!("Device {} {}", device.id, action.done()));

                if action == DeviceAction::Bind && self.config.auto_attach && !device.attached {
                    self.spawn_device_action(DeviceAction::Attach, device.id, true);
                }
            }
            StateUpdate::ToolChecked { available: true } => {
                self.ui_state.status_message = Some("usbipd-win is installed".to_string());
            }
            StateUpdate::ToolChecked { available: false } => {
                self.ui_state.status_message = Some("Automatic install failed".to_string());
                self.ui_state.modal = Modal::Error {
                    message: format!(
                        "usbipd-win could not be installed automatically.\nInstall it manually from {} and restart.",
                        MANUAL_INSTALL_URL
                    ),
                };
            }
            StateUpdate::Failed { context, error } => {
                warn!("{} failed: {}", context, error);
                if error.is_retryable_after_rescan() {
                    self.ui_state.status_message =
                        Some(format!("{} failed: {}; rescanning", context, error));
                    self.spawn_scan();
                    return;
                }
                match error {
                    BindingError::OperationInProgress => {
                        self.ui_state.status_message =
                            Some("Another operation is still running".to_string());
                    }
                    BindingError::ToolUnavailable => {
                        self.ui_state.status_message = Some(error.to_string());
                        self.ui_state.modal = Modal::Error {
                            message: format!(
                                "{} failed: usbipd-win is not installed.\nPress 'i' to install it.",
                                context
                            ),
                        };
                    }
                    other => {
                        self.ui_state.status_message = Some(format!("{} failed", context));
                        self.ui_state.modal = Modal::Error {
                            message: format!("{} failed:\n{}", context, other),
                        };
                    }
                }
            }
        }
    }

    /// Scan on a background task
    fn spawn_scan(&self) {
        let manager = self.manager.clone();
        self.spawn_task(async move {
            match manager.scan().await {
                Ok(devices) => StateUpdate::Scanned {
                    count: devices.len(),
                },
                Err(e) => failure("Scan", e),
            }
        });
    }

    /// Run a device action on a background task
    ///
    /// `after_bind` marks the automatic attach that follows a bind.
    fn spawn_device_action(&mut self, action: DeviceAction, id: BusId, after_bind: bool) {
        let context = action_context(action, &id, after_bind);
        self.ui_state.status_message = Some(format!("{} {}…", action.progress(), id));
        self.ui_state.busy = true;

        let manager = self.manager.clone();
        self.spawn_task(async move {
            let result = match action {
                DeviceAction::Bind => manager.bind(&id).await,
                DeviceAction::Unbind => manager.unbind(&id).await,
                DeviceAction::Attach => manager.attach(&id).await,
                DeviceAction::Detach => manager.detach(&id).await,
            };

            match result {
                Ok(device) => StateUpdate::DeviceUpdated { action, device },
                Err(e) => failure(context, e),
            }
        });
    }

    /// Run `task` off the input loop and post its result as an event
    fn spawn_task<F>(&self, task: F)
    where
        F: Future<Output = StateUpdate> + Send + 'static,
    {
        let tx = self.event_loop.sender();
        tokio::spawn(async move {
            let update = task.await;
            if tx.send(AppEvent::StateUpdate(update)).await.is_err() {
                debug!("Event loop closed before task finished");
            }
        });
    }
}

/// Turn a manager error into a failure event
fn failure(context: impl Into<String>, e: Error) -> StateUpdate {
    let context = context.into();
    let error = match e {
        Error::Binding(error) => error,
        other => BindingError::OperationFailed {
            command: context.clone(),
            message: other.to_string(),
        },
    };
    StateUpdate::Failed { context, error }
}

/// Failure label for a device action
fn action_context(action: DeviceAction, id: &BusId, after_bind: bool) -> String {
    if after_bind {
        format!("Device {} is bound but attaching to WSL", id)
    } else {
        format!("{} {}", action.progress(), id)
    }
}

fn confirm_title(action: DeviceAction) -> &'static str {
    match action {
        DeviceAction::Bind => "Confirm bind",
        DeviceAction::Unbind => "Confirm unbind",
        DeviceAction::Attach => "Confirm attach",
        DeviceAction::Detach => "Confirm detach",
    }
}

fn confirm_message(action: DeviceAction, device: &Device, config: &Config) -> String {
    match action {
        DeviceAction::Bind => {
            let mut msg = if config.auto_attach {
                format!(
                    "Bind {} ({}) and attach it to WSL?",
                    device.description, device.id
                )
            } else {
                format!("Bind {} ({})?", device.description, device.id)
            };
            if config.elevate {
                msg.push_str("\n\nBinding needs administrator rights; Windows may show a UAC prompt.");
            }
            msg
        }
        DeviceAction::Unbind => format!("Unbind {} ({})?", device.description, device.id),
        DeviceAction::Attach => format!("Attach {} ({}) to WSL?", device.description, device.id),
        DeviceAction::Detach => format!("Detach {} ({}) from WSL?", device.description, device.id),
    }
}

fn install_message(config: &Config) -> String {
    format!(
        "Check for usbipd-win and install it with `{} {}` if it is missing?",
        config.installer_program,
        config.installer_args.join(" ")
    )
}

const HELP_TEXT: &str = r#"
Navigation:
  j/k, Up/Down    Move selection

Devices:
  r, F5           Rescan devices
  b               Bind (and attach to WSL if auto_attach is on)
  u               Unbind (detaches first if attached)
  a               Attach to WSL
  d               Detach from WSL
  i               Install usbipd-win if missing

Other:
  ?               Show this help
  q               Quit

Press any key to close this help.
"#;

/// Helper to create a centered rect
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
