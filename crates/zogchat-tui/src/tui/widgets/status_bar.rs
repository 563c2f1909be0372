// Status bar widget: connection indicator, status text, local name.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use zogchat_core::protocol::{ConnectionStatus, StatusKind};

use crate::tui::ViewState;

/// Layout: [dot] [status text] | [you: name]
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut spans = Vec::new();

    let (dot, dot_color) = connection_indicator(state.connection_status);
    spans.push(Span::styled(format!(" {dot} "), Style::default().fg(dot_color)));

    let text = if state.status_text.is_empty() {
        connection_label(state.connection_status)
    } else {
        state.status_text.as_str()
    };
    spans.push(Span::styled(
        text.to_string(),
        Style::default()
            .fg(status_color(state.status_kind))
            .add_modifier(Modifier::BOLD),
    ));

    if let Some(name) = &state.username {
        spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
        spans.push(Span::styled(
            format!("you: {name}"),
            Style::default().fg(Color::White),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

/// Return the connection dot character and its color.
pub fn connection_indicator(status: ConnectionStatus) -> (&'static str, Color) {
    match status {
        ConnectionStatus::Connected => ("●", Color::Green),
        ConnectionStatus::Connecting => ("●", Color::Yellow),
        ConnectionStatus::Waiting => ("○", Color::Yellow),
        ConnectionStatus::Disconnected => ("●", Color::Red),
    }
}

pub fn connection_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connected => "Connected",
        ConnectionStatus::Connecting => "Connecting...",
        ConnectionStatus::Waiting => "Waiting",
        ConnectionStatus::Disconnected => "Disconnected",
    }
}

fn status_color(kind: StatusKind) -> Color {
    match kind {
        StatusKind::Connected => Color::Green,
        StatusKind::Waiting => Color::Yellow,
        StatusKind::Disconnected => Color::Red,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
