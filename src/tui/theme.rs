//! TUI Theme configuration
//!
//! Centralized theme system for consistent styling across the UI.
//! Supports multiple color depths for terminal compatibility.

use ratatui::style::{Color, Style};

use crate::session::{BindState, Device};

/// Terminal color capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Basic 16 ANSI colors (maximum compatibility)
    Basic,
    /// 256 color palette
    #[default]
    Indexed,
    /// True color (24-bit RGB)
    TrueColor,
}

impl ColorMode {
    /// Detect the best color mode for the current terminal
    pub fn detect() -> Self {
        if let Ok(colorterm) = std::env::var("COLORTERM") {
            if colorterm == "truecolor" || colorterm == "24bit" {
                return Self::TrueColor;
            }
        }

        // Windows Terminal sets WT_SESSION and renders 24-bit color
        if std::env::var_os("WT_SESSION").is_some() {
            return Self::TrueColor;
        }

        if let Ok(term) = std::env::var("TERM") {
            if term.contains("256color") {
                return Self::Indexed;
            }
        }

        Self::Basic
    }
}

/// Theme configuration for the TUI
#[derive(Debug, Clone)]
pub struct Theme {
    // Table frame
    pub border: Color,
    pub header: Color,

    // Selection
    pub selection_bg: Color,
    pub selection_fg: Option<Color>,

    // Device state column
    pub state_unbound: Color,
    pub state_shared: Color,
    pub state_attached: Color,
    pub state_pending: Color,

    // Text
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_accent: Color,

    // Modal borders
    pub modal_info: Color,
    pub modal_warning: Color,
    pub modal_error: Color,

    // Status bar
    pub status_bar_bg: Color,
    pub status_bar_fg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::for_color_mode(ColorMode::detect())
    }
}

impl Theme {
    /// Create a theme for the specified color mode
    pub fn for_color_mode(mode: ColorMode) -> Self {
        match mode {
            ColorMode::Basic => Self::basic(),
            ColorMode::Indexed => Self::indexed(),
            ColorMode::TrueColor => Self::truecolor(),
        }
    }

    /// Basic 16-color theme
    pub fn basic() -> Self {
        Self {
            border: Color::Blue,
            header: Color::Cyan,

            selection_bg: Color::Blue,
            selection_fg: Some(Color::White),

            state_unbound: Color::DarkGray,
            state_shared: Color::Yellow,
            state_attached: Color::Green,
            state_pending: Color::Magenta,

            text_primary: Color::Reset,
            text_secondary: Color::DarkGray,
            text_accent: Color::Blue,

            modal_info: Color::Cyan,
            modal_warning: Color::Yellow,
            modal_error: Color::Red,

            status_bar_bg: Color::Blue,
            status_bar_fg: Color::White,
        }
    }

    /// 256-color theme
    pub fn indexed() -> Self {
        Self {
            border: Color::Indexed(240),
            header: Color::Indexed(75),

            selection_bg: Color::Indexed(237),
            selection_fg: Some(Color::Indexed(255)),

            state_unbound: Color::Indexed(245),
            state_shared: Color::Indexed(178),
            state_attached: Color::Indexed(71),
            state_pending: Color::Indexed(141),

            text_primary: Color::Reset,
            text_secondary: Color::Indexed(245),
            text_accent: Color::Indexed(75),

            modal_info: Color::Indexed(75),
            modal_warning: Color::Indexed(178),
            modal_error: Color::Indexed(203),

            status_bar_bg: Color::Indexed(235),
            status_bar_fg: Color::Indexed(252),
        }
    }

    /// True color theme, GitHub-dark palette
    pub fn truecolor() -> Self {
        Self {
            border: Color::Rgb(48, 54, 61),
            header: Color::Rgb(88, 166, 255),

            selection_bg: Color::Rgb(28, 35, 51),
            selection_fg: Some(Color::Rgb(230, 237, 243)),

            state_unbound: Color::Rgb(139, 148, 158),
            state_shared: Color::Rgb(210, 153, 34),
            state_attached: Color::Rgb(63, 185, 80),
            state_pending: Color::Rgb(108, 92, 231),

            text_primary: Color::Rgb(230, 237, 243),
            text_secondary: Color::Rgb(139, 148, 158),
            text_accent: Color::Rgb(88, 166, 255),

            modal_info: Color::Rgb(88, 166, 255),
            modal_warning: Color::Rgb(210, 153, 34),
            modal_error: Color::Rgb(248, 81, 73),

            status_bar_bg: Color::Rgb(22, 27, 34),
            status_bar_fg: Color::Rgb(230, 237, 243),
        }
    }

    /// Color of a device's state cell
    pub fn device_state(&self, device: &Device) -> Color {
        match (device.bind_state, device.attached) {
            (BindState::Pending, _) => self.state_pending,
            (BindState::Bound, true) => self.state_attached,
            (BindState::Bound, false) => self.state_shared,
            (BindState::Unbound, _) => self.state_unbound,
        }
    }

    /// Style for selected rows
    pub fn selection(&self) -> Style {
        let style = Style::default().bg(self.selection_bg);
        match self.selection_fg {
            Some(fg) => style.fg(fg),
            None => style,
        }
    }

    /// Style for status bar
    pub fn status_bar(&self) -> Style {
        Style::default().bg(self.status_bar_bg).fg(self.status_bar_fg)
    }
}
