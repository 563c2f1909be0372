// Share panel: greeting, who may join, and the link to hand to the peer.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;
use zogchat_core::protocol::RoleView;

use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let name = state.username.as_deref().unwrap_or_default();
    let mut lines = vec![
        Line::from(Span::styled(
            format!("Hello {name}!"),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    match &state.role {
        RoleView::Creator => {
            lines.push(Line::from(recipient_sentence(
                state.expected_recipient.as_deref(),
            )));
            lines.push(Line::from(""));
            match &state.share_link {
                Some(link) => {
                    lines.push(Line::from("Share this link:"));
                    lines.push(Line::from(Span::styled(
                        link.clone(),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::UNDERLINED),
                    )));
                    lines.push(Line::from(""));
                    lines.push(Line::from(Span::styled(
                        "Your peer runs: zogchat '<link>'",
                        Style::default().fg(Color::DarkGray),
                    )));
                }
                None => lines.push(Line::from(Span::styled(
                    "Generating link...",
                    Style::default().fg(Color::DarkGray),
                ))),
            }
        }
        RoleView::Guest { inviter } => {
            let target = inviter.as_deref().unwrap_or("the session");
            lines.push(Line::from(format!("Joining {target}...")));
        }
    }

    let paragraph = Paragraph::new(lines)
        // Long links must wrap rather than be cut off.
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Invite "));
    frame.render_widget(paragraph, area);
}

pub fn recipient_sentence(expected: Option<&str>) -> String {
    match expected {
        Some(name) => format!("Only {name} can join this chat."),
        None => "Anyone with the link can join this chat.".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
