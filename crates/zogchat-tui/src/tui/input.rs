// Keyboard input handling and command dispatch.
//
// Translates crossterm key events into `UserCommand`s for the app loop, or
// into local ViewState edits (typing, field focus, scrolling).

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use zogchat_core::protocol::{Step, UserCommand};

use super::{FormField, ViewState};

/// Lines moved by PageUp/PageDown in the chat log.
const PAGE_SIZE: usize = 10;

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key press should be forwarded to the
/// app loop, `None` when it was handled locally.
pub fn handle_key(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    // Windows reports Press and Release for each key.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    if key_event.modifiers.contains(KeyModifiers::CONTROL) && key_event.code == KeyCode::Char('c')
    {
        return Some(UserCommand::Quit);
    }

    if view_state.confirm_quit {
        return handle_confirm_quit(key_event, view_state);
    }

    view_state.notice = None;

    if key_event.code == KeyCode::Esc {
        view_state.confirm_quit = true;
        return None;
    }

    match view_state.step {
        Step::Username => handle_form(key_event, view_state),
        Step::Share | Step::Chat => handle_line(key_event, view_state),
    }
}

/// y/Y confirms, n/N/Esc cancels, everything else is blocked.
fn handle_confirm_quit(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserCommand::Quit),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            view_state.confirm_quit = false;
            None
        }
        _ => None,
    }
}

fn handle_form(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            if view_state.is_creator() {
                view_state.focus = match view_state.focus {
                    FormField::Name => FormField::Recipient,
                    FormField::Recipient => FormField::Name,
                };
            }
            None
        }
        KeyCode::Enter => {
            let expected_recipient = if view_state.is_creator() {
                Some(view_state.recipient_input.trim().to_string()).filter(|r| !r.is_empty())
            } else {
                None
            };
            Some(UserCommand::SubmitUsername {
                username: view_state.name_input.clone(),
                expected_recipient,
            })
        }
        KeyCode::Backspace => {
            focused_field(view_state).pop();
            None
        }
        KeyCode::Char(c) => {
            focused_field(view_state).push(c);
            None
        }
        _ => None,
    }
}

fn focused_field(view_state: &mut ViewState) -> &mut String {
    match view_state.focus {
        FormField::Recipient if view_state.is_creator() => &mut view_state.recipient_input,
        _ => &mut view_state.name_input,
    }
}

fn handle_line(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Enter => {
            let line = std::mem::take(&mut view_state.input);
            let cmd = parse_line(&line, view_state.step);
            if let Err(notice) = &cmd {
                view_state.notice = Some(notice.clone());
            }
            cmd.ok().flatten()
        }
        KeyCode::Backspace => {
            view_state.input.pop();
            None
        }
        KeyCode::Char(c) => {
            view_state.input.push(c);
            None
        }
        KeyCode::Up => {
            view_state.scroll_offset = view_state.scroll_offset.saturating_add(1);
            None
        }
        KeyCode::Down => {
            view_state.scroll_offset = view_state.scroll_offset.saturating_sub(1);
            None
        }
        KeyCode::PageUp => {
            view_state.scroll_offset = view_state.scroll_offset.saturating_add(PAGE_SIZE);
            None
        }
        KeyCode::PageDown => {
            view_state.scroll_offset = view_state.scroll_offset.saturating_sub(PAGE_SIZE);
            None
        }
        KeyCode::End => {
            view_state.scroll_offset = 0;
            None
        }
        _ => None,
    }
}

/// Interpret a submitted input line.
///
/// `Ok(None)` means nothing to send; `Err` carries a message for the user.
pub fn parse_line(line: &str, step: Step) -> Result<Option<UserCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Some(rest) = line.strip_prefix('/') {
        let (name, arg) = rest
            .split_once(char::is_whitespace)
            .map(|(n, a)| (n, a.trim()))
            .unwrap_or((rest, ""));
        return match name {
            "quit" => Ok(Some(UserCommand::Quit)),
            "disconnect" => Ok(Some(UserCommand::Disconnect)),
            "file" if step != Step::Chat => Err("Files can only be sent once connected".into()),
            "file" if arg.is_empty() => Err("Usage: /file <path>".into()),
            "file" => Ok(Some(UserCommand::SendFile(PathBuf::from(unquote(arg))))),
            other => Err(format!("Unknown command: /{other}")),
        };
    }

    if step == Step::Chat {
        Ok(Some(UserCommand::SendMessage(line.to_string())))
    } else {
        Err("Not connected yet".into())
    }
}

/// Strip one pair of matching quotes, for paths pasted with spaces.
fn unquote(arg: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = arg
            .strip_prefix(quote)
            .and_then(|a| a.strip_suffix(quote))
        {
            return inner;
        }
    }
    arg
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;
    use zogchat_core::protocol::RoleView;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn ctrl_key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::CONTROL,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn type_text(state: &mut ViewState, text: &str) {
        for c in text.chars() {
            assert!(handle_key(key(KeyCode::Char(c)), state).is_none());
        }
    }

    fn chat_state() -> ViewState {
        let mut state = ViewState::default();
        state.step = Step::Chat;
        state
    }

    // -- Username form --

    #[test]
    fn typing_fills_name_field() {
        let mut state = ViewState::default();
        type_text(&mut state, "Anx");
        handle_key(key(KeyCode::Backspace), &mut state);
        type_text(&mut state, "a");
        assert_eq!(state.name_input, "Ana");
    }

    #[test]
    fn tab_switches_to_recipient_for_creator() {
        let mut state = ViewState::default();
        type_text(&mut state, "Ana");
        handle_key(key(KeyCode::Tab), &mut state);
        type_text(&mut state, "Bob");
        assert_eq!(state.focus, FormField::Recipient);
        assert_eq!(state.recipient_input, "Bob");

        let cmd = handle_key(key(KeyCode::Enter), &mut state);
        assert_eq!(
            cmd,
            Some(UserCommand::SubmitUsername {
                username: "Ana".into(),
                expected_recipient: Some("Bob".into()),
            })
        );
    }

    #[test]
    fn guest_has_no_recipient_field() {
        let mut state = ViewState::default();
        state.role = RoleView::Guest { inviter: None };
        handle_key(key(KeyCode::Tab), &mut state);
        assert_eq!(state.focus, FormField::Name);
        type_text(&mut state, "Bob");
        let cmd = handle_key(key(KeyCode::Enter), &mut state);
        assert_eq!(
            cmd,
            Some(UserCommand::SubmitUsername {
                username: "Bob".into(),
                expected_recipient: None,
            })
        );
    }

    #[test]
    fn blank_recipient_submits_none() {
        let mut state = ViewState::new("Ana");
        state.recipient_input = "   ".into();
        match handle_key(key(KeyCode::Enter), &mut state) {
            Some(UserCommand::SubmitUsername {
                expected_recipient, ..
            }) => assert!(expected_recipient.is_none()),
            other => panic!("expected SubmitUsername, got {other:?}"),
        }
    }

    // -- Message line --

    #[test]
    fn enter_sends_message_and_clears_input() {
        let mut state = chat_state();
        type_text(&mut state, "hello there");
        let cmd = handle_key(key(KeyCode::Enter), &mut state);
        assert_eq!(cmd, Some(UserCommand::SendMessage("hello there".into())));
        assert!(state.input.is_empty());
    }

    #[test]
    fn q_is_just_a_letter() {
        let mut state = chat_state();
        assert!(handle_key(key(KeyCode::Char('q')), &mut state).is_none());
        assert_eq!(state.input, "q");
        assert!(!state.confirm_quit);
    }

    #[test]
    fn file_command_sends_file() {
        let mut state = chat_state();
        type_text(&mut state, "/file \"/tmp/my notes.txt\"");
        let cmd = handle_key(key(KeyCode::Enter), &mut state);
        assert_eq!(
            cmd,
            Some(UserCommand::SendFile(PathBuf::from("/tmp/my notes.txt")))
        );
    }

    #[test]
    fn file_without_path_shows_usage() {
        let mut state = chat_state();
        type_text(&mut state, "/file");
        assert!(handle_key(key(KeyCode::Enter), &mut state).is_none());
        assert_eq!(state.notice.as_deref(), Some("Usage: /file <path>"));
    }

    #[test]
    fn disconnect_works_on_share_step() {
        let mut state = ViewState::default();
        state.step = Step::Share;
        type_text(&mut state, "/disconnect");
        assert_eq!(
            handle_key(key(KeyCode::Enter), &mut state),
            Some(UserCommand::Disconnect)
        );
    }

    #[test]
    fn plain_text_on_share_step_is_refused() {
        let mut state = ViewState::default();
        state.step = Step::Share;
        type_text(&mut state, "hi");
        assert!(handle_key(key(KeyCode::Enter), &mut state).is_none());
        assert!(state.notice.is_some());
    }

    #[test]
    fn parse_line_variants() {
        assert_eq!(parse_line("   ", Step::Chat), Ok(None));
        assert_eq!(parse_line("/quit", Step::Share), Ok(Some(UserCommand::Quit)));
        assert_eq!(
            parse_line("/nope", Step::Chat),
            Err("Unknown command: /nope".into())
        );
        assert!(parse_line("/file a.txt", Step::Share).is_err());
    }

    #[test]
    fn scrolling_moves_offset() {
        let mut state = chat_state();
        handle_key(key(KeyCode::PageUp), &mut state);
        handle_key(key(KeyCode::Up), &mut state);
        assert_eq!(state.scroll_offset, PAGE_SIZE + 1);
        handle_key(key(KeyCode::Down), &mut state);
        assert_eq!(state.scroll_offset, PAGE_SIZE);
        handle_key(key(KeyCode::End), &mut state);
        assert_eq!(state.scroll_offset, 0);
        handle_key(key(KeyCode::PageDown), &mut state);
        assert_eq!(state.scroll_offset, 0);
    }

    // -- Notices --

    #[test]
    fn any_key_dismisses_notice() {
        let mut state = chat_state();
        state.notice = Some("Not connected".into());
        handle_key(key(KeyCode::Char('x')), &mut state);
        assert!(state.notice.is_none());
    }

    // -- Quit confirmation --

    #[test]
    fn esc_enters_confirm_quit_mode() {
        let mut state = chat_state();
        assert!(handle_key(key(KeyCode::Esc), &mut state).is_none());
        assert!(state.confirm_quit);
    }

    #[test]
    fn confirm_quit_y_sends_quit() {
        let mut state = ViewState::default();
        state.confirm_quit = true;
        assert_eq!(
            handle_key(key(KeyCode::Char('y')), &mut state),
            Some(UserCommand::Quit)
        );
    }

    #[test]
    fn confirm_quit_n_and_esc_cancel() {
        let mut state = ViewState::default();
        state.confirm_quit = true;
        assert!(handle_key(key(KeyCode::Char('n')), &mut state).is_none());
        assert!(!state.confirm_quit);

        state.confirm_quit = true;
        assert!(handle_key(key(KeyCode::Esc), &mut state).is_none());
        assert!(!state.confirm_quit);
    }

    #[test]
    fn confirm_quit_blocks_typing() {
        let mut state = chat_state();
        state.confirm_quit = true;
        assert!(handle_key(key(KeyCode::Char('x')), &mut state).is_none());
        assert!(handle_key(key(KeyCode::Enter), &mut state).is_none());
        assert!(state.input.is_empty());
        assert!(state.confirm_quit);
    }

    #[test]
    fn ctrl_c_quits_immediately() {
        let mut state = chat_state();
        assert_eq!(
            handle_key(ctrl_key(KeyCode::Char('c')), &mut state),
            Some(UserCommand::Quit)
        );
        assert!(!state.confirm_quit);

        state.confirm_quit = true;
        assert_eq!(
            handle_key(ctrl_key(KeyCode::Char('c')), &mut state),
            Some(UserCommand::Quit)
        );
    }

    #[test]
    fn release_events_are_ignored() {
        let mut state = chat_state();
        let release = KeyEvent {
            code: KeyCode::Char('a'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert!(handle_key(release, &mut state).is_none());
        assert!(state.input.is_empty());
    }
}
