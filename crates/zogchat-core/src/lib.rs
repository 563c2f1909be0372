// Core building blocks shared by the session logic and the terminal front-end:
// wire frames, the UI protocol, configuration, share links, recipient
// verification, file payloads, and the peer transport.

pub mod config;
pub mod files;
pub mod protocol;
pub mod share_link;
pub mod transport;
pub mod verify;
