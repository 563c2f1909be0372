// Chat TUI: layout, input handling, and widget rendering.
//
// The TUI owns a `ViewState` that mirrors what the session has told it. The
// app loop pushes `UiUpdate` messages over an mpsc channel; the TUI applies
// them to `ViewState` and re-renders at ~30 fps.

pub mod input;
pub mod layout;
pub mod widgets;

use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use tokio::sync::mpsc;
use zogchat_core::protocol::{
    ChatEntry, ConnectionStatus, RoleView, StatusKind, Step, UiUpdate, UserCommand,
};

use layout::{build_layout, AppLayout};

/// Oldest chat lines are dropped past this many.
pub const MAX_CHAT_LINES: usize = 2000;

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// Which field of the username form has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Recipient,
}

/// TUI-local state that mirrors the session for rendering.
pub struct ViewState {
    pub step: Step,
    pub role: RoleView,
    /// Accepted local display name.
    pub username: Option<String>,
    pub expected_recipient: Option<String>,
    pub status_text: String,
    pub status_kind: StatusKind,
    pub connection_status: ConnectionStatus,
    pub share_link: Option<String>,
    /// Remote peer's name, once known.
    pub chat_title: Option<String>,
    pub chat_log: Vec<ChatEntry>,
    /// Last one-off message, shown until the next key press.
    pub notice: Option<String>,
    /// Chat log scroll, in lines up from the newest entry.
    pub scroll_offset: usize,
    pub confirm_quit: bool,
    // Username form
    pub name_input: String,
    pub recipient_input: String,
    pub focus: FormField,
    /// Message / command line.
    pub input: String,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState::new("")
    }
}

impl ViewState {
    /// Fresh state with the name field pre-filled.
    pub fn new(default_username: &str) -> Self {
        ViewState {
            step: Step::Username,
            role: RoleView::Creator,
            username: None,
            expected_recipient: None,
            status_text: String::new(),
            status_kind: StatusKind::Disconnected,
            connection_status: ConnectionStatus::Disconnected,
            share_link: None,
            chat_title: None,
            chat_log: Vec::new(),
            notice: None,
            scroll_offset: 0,
            confirm_quit: false,
            name_input: default_username.to_string(),
            recipient_input: String::new(),
            focus: FormField::Name,
            input: String::new(),
        }
    }

    pub fn is_creator(&self) -> bool {
        self.role == RoleView::Creator
    }
}

// ---------------------------------------------------------------------------
// UiUpdate processing
// ---------------------------------------------------------------------------

/// Apply a single UiUpdate to the ViewState.
pub fn apply_ui_update(state: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::Step(step) => {
            if step != state.step {
                state.input.clear();
                state.focus = FormField::Name;
            }
            state.step = step;
        }
        UiUpdate::Role(role) => {
            state.role = role;
        }
        UiUpdate::Username(name) => {
            state.username = Some(name);
        }
        UiUpdate::ExpectedRecipient(expected) => {
            state.expected_recipient = expected;
        }
        UiUpdate::Status { text, kind } => {
            state.status_text = text;
            state.status_kind = kind;
        }
        UiUpdate::ConnectionStatus(status) => {
            state.connection_status = status;
        }
        UiUpdate::ShareLink(link) => {
            state.share_link = link;
        }
        UiUpdate::ChatTitle(title) => {
            state.chat_title = title;
        }
        UiUpdate::ChatLine(entry) => {
            state.chat_log.push(entry);
            if state.chat_log.len() > MAX_CHAT_LINES {
                let excess = state.chat_log.len() - MAX_CHAT_LINES;
                state.chat_log.drain(..excess);
            }
            // Keep the view pinned where it was when scrolled up.
            if state.scroll_offset > 0 {
                state.scroll_offset += 1;
            }
        }
        UiUpdate::ClearChat => {
            state.chat_log.clear();
            state.scroll_offset = 0;
        }
        UiUpdate::Notice(text) => {
            state.notice = Some(text);
        }
    }
}

// ---------------------------------------------------------------------------
// Render frame
// ---------------------------------------------------------------------------

/// Render the complete frame.
pub fn render_frame(frame: &mut Frame, state: &ViewState) {
    let layout = build_layout(frame.area());

    widgets::status_bar::render(frame, layout.status_bar, state);
    match state.step {
        Step::Username => widgets::setup_form::render(frame, layout.body, state),
        Step::Share => widgets::share_panel::render(frame, layout.body, state),
        Step::Chat => widgets::chat_log::render(frame, layout.body, state),
    }
    render_input(frame, &layout, state);
    render_help_bar(frame, &layout, state);

    if state.confirm_quit {
        widgets::quit_confirm::render(
            frame,
            frame.area(),
            state.connection_status == ConnectionStatus::Connected,
        );
    }
}

fn render_input(frame: &mut Frame, layout: &AppLayout, state: &ViewState) {
    let (title, text) = match state.step {
        Step::Username => (" Enter to continue ", String::new()),
        Step::Share => (" Command: /disconnect /quit ", state.input.clone()),
        Step::Chat => (
            " Message  (/file <path>, /disconnect, /quit) ",
            state.input.clone(),
        ),
    };

    let paragraph = Paragraph::new(text.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(title),
    );
    frame.render_widget(paragraph, layout.input);

    if state.step != Step::Username && !state.confirm_quit {
        place_cursor(frame, layout.input, text.chars().count());
    }
}

/// Put the terminal cursor after `chars` characters inside a bordered box.
fn place_cursor(frame: &mut Frame, area: Rect, chars: usize) {
    let inner_width = area.width.saturating_sub(2);
    if inner_width == 0 || area.height < 3 {
        return;
    }
    let col = (chars as u16).min(inner_width - 1);
    frame.set_cursor_position((area.x + 1 + col, area.y + 1));
}

fn render_help_bar(frame: &mut Frame, layout: &AppLayout, state: &ViewState) {
    let span = match &state.notice {
        Some(notice) => Span::styled(
            format!(" {notice}"),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        None => Span::styled(
            help_text(state),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::DIM),
        ),
    };
    let paragraph = Paragraph::new(Line::from(span)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, layout.help_bar);
}

fn help_text(state: &ViewState) -> &'static str {
    match state.step {
        Step::Username if state.is_creator() => {
            " Tab:Switch field | Enter:Start | Esc:Quit | Ctrl+C:Quit now"
        }
        Step::Username => " Enter:Join | Esc:Quit | Ctrl+C:Quit now",
        Step::Share => " /disconnect:New session | Esc:Quit | Ctrl+C:Quit now",
        Step::Chat => " Enter:Send | PgUp/PgDn:Scroll | Esc:Quit | Ctrl+C:Quit now",
    }
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI event loop.
///
/// 1. Initializes the terminal (raw mode, alternate screen).
/// 2. Installs a panic hook to restore the terminal on crash.
/// 3. Runs an async select loop: UI updates, keyboard input, render ticks.
/// 4. Restores the terminal on exit.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
    mut view_state: ViewState,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = ratatui::restore();
        original_hook(panic_info);
    }));

    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let result = loop {
        tokio::select! {
            // UI updates from the app loop
            update = ui_rx.recv() => {
                match update {
                    Some(ui_update) => apply_ui_update(&mut view_state, ui_update),
                    // App loop is gone.
                    None => break Ok(()),
                }
            }

            // Keyboard input
            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, &mut view_state) {
                            let quit = cmd == UserCommand::Quit;
                            let _ = cmd_tx.send(cmd).await;
                            if quit {
                                break Ok(());
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(anyhow::Error::from(e).context("terminal input error")),
                    None => break Ok(()),
                }
            }

            _ = render_tick.tick() => {
                if let Err(e) = terminal.draw(|frame| render_frame(frame, &view_state)) {
                    break Err(anyhow::Error::from(e).context("failed to draw frame"));
                }
            }
        }
    };

    ratatui::restore();
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use zogchat_core::protocol::Direction;

    fn render_to_string(state: &ViewState, width: u16, height: u16) -> String {
        let backend = ratatui::backend::TestBackend::new(width, height);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal.draw(|frame| render_frame(frame, state)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn view_state_default_is_sensible() {
        let state = ViewState::default();
        assert_eq!(state.step, Step::Username);
        assert_eq!(state.role, RoleView::Creator);
        assert_eq!(state.connection_status, ConnectionStatus::Disconnected);
        assert!(state.chat_log.is_empty());
        assert!(state.share_link.is_none());
        assert!(!state.confirm_quit);
        assert_eq!(state.focus, FormField::Name);
        assert!(state.name_input.is_empty());
    }

    #[test]
    fn new_prefills_name() {
        let state = ViewState::new("Ana");
        assert_eq!(state.name_input, "Ana");
    }

    #[test]
    fn apply_step_clears_input() {
        let mut state = ViewState::default();
        state.input = "half typed".into();
        apply_ui_update(&mut state, UiUpdate::Step(Step::Chat));
        assert_eq!(state.step, Step::Chat);
        assert!(state.input.is_empty());
    }

    #[test]
    fn apply_status_and_indicator() {
        let mut state = ViewState::default();
        apply_ui_update(
            &mut state,
            UiUpdate::Status {
                text: "Connected".into(),
                kind: StatusKind::Connected,
            },
        );
        apply_ui_update(
            &mut state,
            UiUpdate::ConnectionStatus(ConnectionStatus::Connected),
        );
        assert_eq!(state.status_text, "Connected");
        assert_eq!(state.status_kind, StatusKind::Connected);
        assert_eq!(state.connection_status, ConnectionStatus::Connected);
    }

    #[test]
    fn apply_chat_line_and_clear() {
        let mut state = ViewState::default();
        apply_ui_update(
            &mut state,
            UiUpdate::ChatLine(ChatEntry::text(Direction::Received, "Bob", "hi")),
        );
        assert_eq!(state.chat_log.len(), 1);
        apply_ui_update(&mut state, UiUpdate::ClearChat);
        assert!(state.chat_log.is_empty());
    }

    #[test]
    fn chat_log_is_capped() {
        let mut state = ViewState::default();
        for i in 0..MAX_CHAT_LINES + 5 {
            apply_ui_update(
                &mut state,
                UiUpdate::ChatLine(ChatEntry::text(Direction::Sent, "me", i.to_string())),
            );
        }
        assert_eq!(state.chat_log.len(), MAX_CHAT_LINES);
        assert_eq!(
            state.chat_log[0].body,
            zogchat_core::protocol::EntryBody::Text("5".into())
        );
    }

    #[test]
    fn new_line_keeps_scrolled_view_in_place() {
        let mut state = ViewState::default();
        state.scroll_offset = 3;
        apply_ui_update(&mut state, UiUpdate::ChatLine(ChatEntry::system("x")));
        assert_eq!(state.scroll_offset, 4);
    }

    #[test]
    fn apply_share_link_and_title() {
        let mut state = ViewState::default();
        apply_ui_update(&mut state, UiUpdate::ShareLink(Some("zogchat://join?session=x".into())));
        apply_ui_update(&mut state, UiUpdate::ChatTitle(Some("Bob".into())));
        assert_eq!(state.share_link.as_deref(), Some("zogchat://join?session=x"));
        assert_eq!(state.chat_title.as_deref(), Some("Bob"));
    }

    #[test]
    fn apply_notice() {
        let mut state = ViewState::default();
        apply_ui_update(&mut state, UiUpdate::Notice("File too large".into()));
        assert_eq!(state.notice.as_deref(), Some("File too large"));
    }

    #[test]
    fn render_each_step_does_not_panic() {
        let mut state = ViewState::new("Ana");
        for step in [Step::Username, Step::Share, Step::Chat] {
            state.step = step;
            render_to_string(&state, 80, 24);
        }
        state.confirm_quit = true;
        render_to_string(&state, 80, 24);
    }

    #[test]
    fn render_tiny_terminal_does_not_panic() {
        let mut state = ViewState::default();
        state.step = Step::Chat;
        state.input = "some text longer than the box".into();
        render_to_string(&state, 10, 4);
    }

    #[test]
    fn share_step_shows_link() {
        let mut state = ViewState::default();
        state.step = Step::Share;
        state.username = Some("Ana".into());
        state.share_link = Some("zogchat://join?session=abc".into());
        let screen = render_to_string(&state, 80, 24);
        assert!(screen.contains("Hello Ana!"));
        assert!(screen.contains("zogchat://join?session=abc"));
    }

    #[test]
    fn notice_replaces_help_text() {
        let mut state = ViewState::default();
        state.notice = Some("Not connected".into());
        let screen = render_to_string(&state, 80, 24);
        assert!(screen.contains("Not connected"));
        assert!(!screen.contains("Tab:Switch field"));
    }
}
