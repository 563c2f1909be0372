// Terminal front-end for zogchat: command line parsing and the ratatui UI.

pub mod cli;
pub mod tui;
