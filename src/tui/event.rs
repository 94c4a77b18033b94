//! Event handling for the TUI
//!
//! Provides an async event stream that combines:
//! - Terminal input events (keyboard, resize)
//! - Results of background device operations
//! - Render ticks

use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyCode, KeyEvent, KeyModifiers};
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::BindingError;
use crate::session::Device;

/// Application events
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Terminal input event
    Input(InputEvent),
    /// Result from a background task
    StateUpdate(StateUpdate),
    /// Render tick
    Tick,
}

/// Input events from the terminal
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// Key press
    Key(KeyEvent),
    /// Terminal resize
    Resize(u16, u16),
}

/// A device operation the user can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAction {
    Bind,
    Unbind,
    Attach,
    Detach,
}

impl DeviceAction {
    /// Progress text (`Binding 1-4…`)
    pub fn progress(&self) -> &'static str {
        match self {
            Self::Bind => "Binding",
            Self::Unbind => "Unbinding",
            Self::Attach => "Attaching",
            Self::Detach => "Detaching",
        }
    }

    /// Past tense for result messages
    pub fn done(&self) -> &'static str {
        match self {
            Self::Bind => "bound",
            Self::Unbind => "unbound",
            Self::Attach => "attached to WSL",
            Self::Detach => "detached from WSL",
        }
    }
}

/// Results of background manager calls
#[derive(Debug, Clone)]
pub enum StateUpdate {
    /// A scan completed
    Scanned { count: usize },
    /// A device operation completed
    DeviceUpdated { action: DeviceAction, device: Device },
    /// The install check completed
    ToolChecked { available: bool },
    /// A background call failed
    Failed { context: String, error: BindingError },
}

/// User commands triggered by input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Navigate up in the list
    NavigateUp,
    /// Navigate down in the list
    NavigateDown,
    /// Rescan devices
    Refresh,
    /// Bind (and attach, if configured) the selected device
    Bind,
    /// Unbind the selected device
    Unbind,
    /// Attach the selected device to WSL
    Attach,
    /// Detach the selected device from WSL
    Detach,
    /// Check for usbipd and install it if missing
    Install,
    /// Show help
    ShowHelp,
    /// Quit application
    Quit,
    /// Cancel current modal
    Cancel,
    /// Confirm current modal
    Confirm,
}

impl UserCommand {
    /// Convert a key event to a user command
    pub fn from_key(key: KeyEvent) -> Option<Self> {
        match (key.code, key.modifiers) {
            // Navigation
            (KeyCode::Up, _) | (KeyCode::Char('k'), KeyModifiers::NONE) => {
                Some(UserCommand::NavigateUp)
            }
            (KeyCode::Down, _) | (KeyCode::Char('j'), KeyModifiers::NONE) => {
                Some(UserCommand::NavigateDown)
            }

            // Device operations
            (KeyCode::Char('r'), KeyModifiers::NONE) | (KeyCode::F(5), _) => {
                Some(UserCommand::Refresh)
            }
            (KeyCode::Char('b'), KeyModifiers::NONE) => Some(UserCommand::Bind),
            (KeyCode::Char('u'), KeyModifiers::NONE) => Some(UserCommand::Unbind),
            (KeyCode::Char('a'), KeyModifiers::NONE) => Some(UserCommand::Attach),
            (KeyCode::Char('d'), KeyModifiers::NONE) => Some(UserCommand::Detach),
            (KeyCode::Char('i'), KeyModifiers::NONE) => Some(UserCommand::Install),

            // Help and quit
            (KeyCode::Char('?'), _) => Some(UserCommand::ShowHelp),
            (KeyCode::Char('q'), KeyModifiers::NONE) => Some(UserCommand::Quit),
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(UserCommand::Quit),

            // Modal controls
            (KeyCode::Esc, _) | (KeyCode::Char('n'), KeyModifiers::NONE) => {
                Some(UserCommand::Cancel)
            }
            (KeyCode::Enter, _) | (KeyCode::Char('y'), KeyModifiers::NONE) => {
                Some(UserCommand::Confirm)
            }

            _ => None,
        }
    }
}

/// Event loop handle
pub struct EventLoop {
    /// Sender for events
    tx: mpsc::Sender<AppEvent>,
    /// Receiver for events
    rx: mpsc::Receiver<AppEvent>,
}

impl EventLoop {
    /// Create a new event loop
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(256);
        Self { tx, rx }
    }

    /// Get a sender for posting events
    pub fn sender(&self) -> mpsc::Sender<AppEvent> {
        self.tx.clone()
    }

    /// Start the event loop
    ///
    /// This spawns background tasks for:
    /// - Terminal input
    /// - Render ticks
    pub fn start(&mut self, tick_rate: Duration) {
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let mut reader = EventStream::new();

            loop {
                match reader.next().fuse().await {
                    Some(Ok(event)) => {
                        let app_event = match event {
                            CrosstermEvent::Key(key) => AppEvent::Input(InputEvent::Key(key)),
                            CrosstermEvent::Resize(w, h) => {
                                AppEvent::Input(InputEvent::Resize(w, h))
                            }
                            _ => continue,
                        };

                        if tx.send(app_event).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("Error reading terminal event: {}", e);
                        continue;
                    }
                    None => break,
                }
            }
        });

        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_rate);

            loop {
                interval.tick().await;
                if tx.send(AppEvent::Tick).await.is_err() {
                    break;
                }
            }
        });
    }

    /// Receive the next event
    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn test_key_to_command() {
        assert_eq!(UserCommand::from_key(key('j')), Some(UserCommand::NavigateDown));
        assert_eq!(UserCommand::from_key(key('k')), Some(UserCommand::NavigateUp));
        assert_eq!(UserCommand::from_key(key('b')), Some(UserCommand::Bind));
        assert_eq!(UserCommand::from_key(key('u')), Some(UserCommand::Unbind));
        assert_eq!(UserCommand::from_key(key('i')), Some(UserCommand::Install));
        assert_eq!(UserCommand::from_key(key('q')), Some(UserCommand::Quit));
        assert_eq!(
            UserCommand::from_key(KeyEvent::new(KeyCode::F(5), KeyModifiers::NONE)),
            Some(UserCommand::Refresh)
        );
        assert_eq!(
            UserCommand::from_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(UserCommand::Quit)
        );
        assert_eq!(UserCommand::from_key(key('z')), None);
    }

    #[test]
    fn test_action_labels() {
        assert_eq!(DeviceAction::Bind.progress(), "Binding");
        assert_eq!(DeviceAction::Detach.done(), "detached from WSL");
    }

    #[tokio::test]
    async fn test_sender_posts_to_loop() {
        let mut event_loop = EventLoop::new();
        event_loop
            .sender()
            .send(AppEvent::StateUpdate(StateUpdate::Scanned { count: 2 }))
            .await
            .unwrap();

        match event_loop.next().await {
            Some(AppEvent::StateUpdate(StateUpdate::Scanned { count })) => assert_eq!(count, 2),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
