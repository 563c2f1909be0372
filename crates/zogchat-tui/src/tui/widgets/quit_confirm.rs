// Quit confirmation overlay, drawn over everything while
// `ViewState::confirm_quit` is set. Warns when a peer is still connected.

use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

const DIALOG_WIDTH: u16 = 36;

pub fn render(frame: &mut Frame, area: Rect, connected: bool) {
    let mut lines = Vec::new();
    if connected {
        lines.push(Line::from(Span::styled(
            " Your peer will be disconnected.",
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(vec![
        Span::raw(" Leave zogchat? ("),
        Span::styled(
            "y",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("/"),
        Span::styled(
            "n",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Span::raw(")"),
    ]));

    // Borders plus one row per line.
    let height = lines.len() as u16 + 2;
    let dialog_area = centered_rect(DIALOG_WIDTH, height, area);
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(Span::styled(
            " Quit ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, dialog_area);
}

/// A `width` x `height` rectangle centered in `area`, clamped to fit.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::vertical([Constraint::Length(height.min(area.height))])
        .flex(Flex::Center)
        .split(area);
    Layout::horizontal([Constraint::Length(width.min(area.width))])
        .flex(Flex::Center)
        .split(vertical[0])[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_is_centered() {
        let area = Rect::new(0, 0, 80, 24);
        let rect = centered_rect(DIALOG_WIDTH, 4, area);
        assert_eq!((rect.width, rect.height), (DIALOG_WIDTH, 4));
        assert!((rect.x + rect.width / 2).abs_diff(40) <= 1);
        assert!((rect.y + rect.height / 2).abs_diff(12) <= 1);
    }

    #[test]
    fn centered_rect_clamps_to_small_area() {
        let area = Rect::new(0, 0, 10, 2);
        let rect = centered_rect(DIALOG_WIDTH, 4, area);
        assert!(rect.width <= area.width && rect.height <= area.height);
    }

    #[test]
    fn warns_when_connected() {
        let backend = ratatui::backend::TestBackend::new(80, 24);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| render(frame, frame.area(), true))
            .unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("Your peer will be disconnected."));
        assert!(text.contains("Leave zogchat?"));
    }
}
