// Chat log widget: chronological list of messages, files and system lines.
//
// Each: "HH:MM author: text"
// Files: "HH:MM author: [kind] name (size) -> path"
// Newest at the bottom; `scroll_offset` counts lines up from there.

use chrono::Local;
use ratatui::layout::{Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
};
use ratatui::Frame;
use zogchat_core::files::{human_size, FileKind};
use zogchat_core::protocol::{ChatEntry, Direction, EntryBody};

use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let title = chat_title(state.chat_title.as_deref());

    if state.chat_log.is_empty() {
        let paragraph = Paragraph::new("  No messages yet.")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(paragraph, area);
        return;
    }

    // Subtract 2 for borders.
    let visible_rows = (area.height as usize).saturating_sub(2);
    let total = state.chat_log.len();
    let (start, offset) = visible_window(total, visible_rows, state.scroll_offset);

    let items: Vec<ListItem> = state
        .chat_log
        .iter()
        .skip(start)
        .take(visible_rows.max(1))
        .map(|entry| ListItem::new(entry_line(entry)))
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);

    if total > visible_rows {
        let max_start = total - visible_rows;
        let mut scrollbar_state =
            ScrollbarState::new(max_start).position(max_start.saturating_sub(offset));
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

/// "Chat with <remote>" once the peer's name is known.
pub fn chat_title(remote: Option<&str>) -> String {
    match remote {
        Some(name) => format!(" Chat with {name} "),
        None => " Chat ".to_string(),
    }
}

/// First entry index to show and the clamped scroll offset.
pub fn visible_window(total: usize, visible_rows: usize, scroll_offset: usize) -> (usize, usize) {
    let max_offset = total.saturating_sub(visible_rows);
    let offset = scroll_offset.min(max_offset);
    (total.saturating_sub(visible_rows + offset), offset)
}

/// Text of one entry after the timestamp and author.
pub fn format_body(body: &EntryBody) -> String {
    match body {
        EntryBody::Text(text) => text.clone(),
        EntryBody::File {
            name,
            size,
            saved_to,
        } => {
            let kind = FileKind::from_name(name).label();
            let base = format!("[{kind}] {name} ({})", human_size(*size));
            match saved_to {
                Some(path) => format!("{base} -> {}", path.display()),
                None => base,
            }
        }
    }
}

pub fn format_entry(entry: &ChatEntry) -> String {
    let time = entry.at.with_timezone(&Local).format("%H:%M");
    match entry.direction {
        Direction::System => format!("{time} * {}", format_body(&entry.body)),
        _ => format!("{time} {}: {}", entry.author, format_body(&entry.body)),
    }
}

fn entry_line(entry: &ChatEntry) -> Line<'static> {
    let style = match entry.direction {
        Direction::Sent => Style::default().fg(Color::Cyan),
        Direction::Received => Style::default().fg(Color::White),
        Direction::System => Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    };
    Line::from(Span::styled(format_entry(entry), style))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn title_names_remote_peer() {
        assert_eq!(chat_title(Some("Bob")), " Chat with Bob ");
        assert_eq!(chat_title(None), " Chat ");
    }

    #[test]
    fn text_entry_format() {
        let entry = ChatEntry::text(Direction::Received, "Bob", "hello");
        let line = format_entry(&entry);
        assert!(line.ends_with(" Bob: hello"), "got {line}");
        // "HH:MM " prefix
        assert_eq!(line.as_bytes()[2], b':');
    }

    #[test]
    fn system_entry_has_no_author() {
        let line = format_entry(&ChatEntry::system("Connected to x"));
        assert!(line.ends_with(" * Connected to x"), "got {line}");
    }

    #[test]
    fn file_body_shows_kind_size_and_path() {
        let body = EntryBody::File {
            name: "cat.png".into(),
            size: 2048,
            saved_to: Some(PathBuf::from("/dl/cat.png")),
        };
        assert_eq!(format_body(&body), "[image] cat.png (2.0 KB) -> /dl/cat.png");

        let body = EntryBody::File {
            name: "notes".into(),
            size: 12,
            saved_to: None,
        };
        assert_eq!(format_body(&body), "[file] notes (12 B)");
    }

    #[test]
    fn window_pins_to_bottom() {
        assert_eq!(visible_window(100, 10, 0), (90, 0));
        assert_eq!(visible_window(100, 10, 5), (85, 5));
        // Clamped to the top.
        assert_eq!(visible_window(100, 10, 500), (0, 90));
        // Everything fits.
        assert_eq!(visible_window(3, 10, 2), (0, 0));
    }

    #[test]
    fn render_does_not_panic() {
        let backend = ratatui::backend::TestBackend::new(60, 8);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let mut state = ViewState::default();
        terminal
            .draw(|frame| render(frame, frame.area(), &state))
            .unwrap();

        for i in 0..30 {
            state
                .chat_log
                .push(ChatEntry::text(Direction::Sent, "me", format!("line {i}")));
        }
        state.scroll_offset = 4;
        terminal
            .draw(|frame| render(frame, frame.area(), &state))
            .unwrap();
    }
}
