// Chat session logic and the async loop that drives it.

pub mod app;
pub mod session;
