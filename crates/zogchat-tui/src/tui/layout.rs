// Screen layout.
//
// +--------------------------------------------------+
// | Status Bar (1 row)                                |
// +--------------------------------------------------+
// | Body: form, share panel or chat log (fill)        |
// +--------------------------------------------------+
// | Input line (3 rows)                               |
// +--------------------------------------------------+
// | Help Bar (1 row)                                  |
// +--------------------------------------------------+

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Resolved screen areas.
#[derive(Debug, Clone)]
pub struct AppLayout {
    /// Connection indicator and status text.
    pub status_bar: Rect,
    pub body: Rect,
    /// Bordered message / command line.
    pub input: Rect,
    /// Key hints, or the latest notice.
    pub help_bar: Rect,
}

pub fn build_layout(area: Rect) -> AppLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Min(3),    // body
            Constraint::Length(3), // input
            Constraint::Length(1), // help bar
        ])
        .split(area);

    AppLayout {
        status_bar: vertical[0],
        body: vertical[1],
        input: vertical[2],
        help_bar: vertical[3],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
