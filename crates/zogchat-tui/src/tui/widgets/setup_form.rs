// Username form: display name, plus the expected recipient for the creator.
// A guest sees who invited them instead.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;
use zogchat_core::protocol::RoleView;

use crate::tui::{FormField, ViewState};

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut lines = Vec::new();

    match &state.role {
        RoleView::Creator => {
            lines.push(Line::from("Start a new private chat."));
        }
        RoleView::Guest { .. } => {
            lines.push(Line::from(Span::styled(
                invitation_line(&state.role),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )));
        }
    }
    lines.push(Line::from(""));

    lines.push(field_line(
        "Your name",
        &state.name_input,
        state.focus == FormField::Name,
    ));

    if state.is_creator() {
        lines.push(field_line(
            "Expected recipient (optional)",
            &state.recipient_input,
            state.focus == FormField::Recipient,
        ));
        lines.push(Line::from(Span::styled(
            "  Only a peer declaring this name will be let in.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" zogchat "));
    frame.render_widget(paragraph, area);
}

/// "<inviter> invites you to join", or a generic line without an inviter.
pub fn invitation_line(role: &RoleView) -> String {
    match role {
        RoleView::Guest {
            inviter: Some(inviter),
        } => format!("{inviter} invites you to join"),
        _ => "You have been invited to join a chat".to_string(),
    }
}

fn field_line(label: &str, value: &str, focused: bool) -> Line<'static> {
    let marker = if focused { "> " } else { "  " };
    let value_style = if focused {
        Style::default()
            .fg(Color::Black)
            .bg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    Line::from(vec![
        Span::styled(marker.to_string(), Style::default().fg(Color::Cyan)),
        Span::raw(format!("{label}: ")),
        Span::styled(format!(" {value} "), value_style),
    ])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
