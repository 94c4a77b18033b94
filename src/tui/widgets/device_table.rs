//! Device table widget
//!
//! One row per device: bus id, VID:PID, description and state.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::Span,
    widgets::{Block, Cell, Row, StatefulWidget, Table, TableState},
};

use crate::session::Device;
use crate::tui::theme::Theme;

/// Table widget over a device snapshot
pub struct DeviceTable<'a> {
    /// Devices to display
    devices: &'a [Device],
    /// Theme for styling
    theme: &'a Theme,
    /// Block for borders and title
    block: Option<Block<'a>>,
    /// Glyph shown in the state column of pending devices
    pending_symbol: &'a str,
}

impl<'a> DeviceTable<'a> {
    /// Create a new device table
    pub fn new(devices: &'a [Device], theme: &'a Theme) -> Self {
        Self {
            devices,
            theme,
            block: None,
            pending_symbol: "…",
        }
    }

    /// Set the block
    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    /// Set the pending glyph (driven by the spinner tick)
    pub fn pending_symbol(mut self, symbol: &'a str) -> Self {
        self.pending_symbol = symbol;
        self
    }

    fn to_rows(&self) -> Vec<Row<'a>> {
        self.devices
            .iter()
            .map(|device| {
                let state = if device.bind_state.is_pending() {
                    format!("{} {}", self.pending_symbol, device.state_label())
                } else {
                    device.state_label().to_string()
                };

                Row::new(vec![
                    Cell::from(device.id.to_string()),
                    Cell::from(Span::styled(
                        device.vid_pid.clone().unwrap_or_else(|| "-".to_string()),
                        Style::default().fg(self.theme.text_secondary),
                    )),
                    Cell::from(device.description.clone()),
                    Cell::from(Span::styled(
                        state,
                        Style::default().fg(self.theme.device_state(device)),
                    )),
                ])
            })
            .collect()
    }
}

impl StatefulWidget for DeviceTable<'_> {
    type State = TableState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let header = Row::new(vec!["BUS ID", "VID:PID", "DEVICE", "STATE"]).style(
            Style::default()
                .fg(self.theme.header)
                .add_modifier(Modifier::BOLD),
        );

        let widths = [
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Min(20),
            Constraint::Length(14),
        ];

        let rows = self.to_rows();
        let table = Table::new(rows, widths)
            .header(header)
            .row_highlight_style(self.theme.selection().add_modifier(Modifier::BOLD))
            .highlight_symbol("▶ ");

        let table = if let Some(block) = self.block {
            table.block(block)
        } else {
            table
        };

        StatefulWidget::render(table, area, buf, state);
    }
}

/// Selection state for the device table
#[derive(Debug, Default)]
pub struct DeviceTableState {
    /// Inner table state
    pub table_state: TableState,
    /// Total number of rows
    pub item_count: usize,
}

impl DeviceTableState {
    /// Create a new state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the selected index
    pub fn selected(&self) -> Option<usize> {
        self.table_state.selected()
    }

    /// Select the next row, wrapping around
    pub fn next(&mut self) {
        if self.item_count == 0 {
            return;
        }

        let i = match self.table_state.selected() {
            Some(i) if i + 1 < self.item_count => i + 1,
            _ => 0,
        };
        self.table_state.select(Some(i));
    }

    /// Select the previous row, wrapping around
    pub fn previous(&mut self) {
        if self.item_count == 0 {
            return;
        }

        let i = match self.table_state.selected() {
            Some(0) | None => self.item_count - 1,
            Some(i) => i - 1,
        };
        self.table_state.select(Some(i));
    }

    /// Update row count and keep the selection in range
    pub fn set_item_count(&mut self, count: usize) {
        self.item_count = count;

        match self.table_state.selected() {
            _ if count == 0 => self.table_state.select(None),
            Some(selected) if selected >= count => self.table_state.select(Some(count - 1)),
            None => self.table_state.select(Some(0)),
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    use crate::session::BindState;

    #[test]
    fn test_table_state_navigation() {
        let mut state = DeviceTableState::new();
        state.set_item_count(3);
        assert_eq!(state.selected(), Some(0));

        state.next();
        assert_eq!(state.selected(), Some(1));
        state.next();
        assert_eq!(state.selected(), Some(2));

        // Wrap around
        state.next();
        assert_eq!(state.selected(), Some(0));
        state.previous();
        assert_eq!(state.selected(), Some(2));
    }

    #[test]
    fn test_table_state_shrinks_with_rows() {
        let mut state = DeviceTableState::new();
        state.set_item_count(3);
        state.previous();
        assert_eq!(state.selected(), Some(2));

        state.set_item_count(1);
        assert_eq!(state.selected(), Some(0));

        state.set_item_count(0);
        assert_eq!(state.selected(), None);
        state.next();
        assert_eq!(state.selected(), None);
    }

    #[test]
    fn test_renders_device_rows() {
        let devices = vec![
            Device::new("1-1", "Logitech Mouse").with_vid_pid("046d:c52b"),
            Device::new("2-3", "Webcam").with_state(BindState::Bound, true),
            Device::new("3-1", "STLink").with_state(BindState::Pending, false),
        ];
        let theme = Theme::basic();
        let mut state = TableState::default();

        let backend = TestBackend::new(70, 6);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| {
                let table = DeviceTable::new(&devices, &theme).pending_symbol("*");
                f.render_stateful_widget(table, f.area(), &mut state);
            })
            .unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n");

        assert!(text.contains("BUS ID"));
        assert!(text.contains("046d:c52b"));
        assert!(text.contains("Logitech Mouse"));
        assert!(text.contains("Not shared"));
        assert!(text.contains("Attached"));
        assert!(text.contains("* Pending"));
    }
}
