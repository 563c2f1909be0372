// TUI widget modules, one per screen zone.

pub mod chat_log;
pub mod quit_confirm;
pub mod setup_form;
pub mod share_panel;
pub mod status_bar;
