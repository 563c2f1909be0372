// Application orchestration.
//
// The event loop that feeds transport events and user commands into the
// `Session`, then carries out the effects it returns: transport calls, file
// I/O and UI updates for the TUI render loop.

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use zogchat_core::config::Config;
use zogchat_core::files::{self, FileError};
use zogchat_core::protocol::{ChatEntry, Direction, EntryBody, FilePayload, UiUpdate, UserCommand};
use zogchat_core::transport::{PeerEvent, Transport};

use crate::session::{Effect, Session};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// File handling settings for the app loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub download_dir: PathBuf,
    pub max_file_bytes: u64,
}

impl AppSettings {
    pub fn from_config(config: &Config) -> Self {
        AppSettings {
            download_dir: config.files.resolve_download_dir(),
            max_file_bytes: config.files.max_file_bytes,
        }
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

struct App<T> {
    transport: T,
    session: Session,
    ui_tx: mpsc::Sender<UiUpdate>,
    settings: AppSettings,
}

impl<T: Transport> App<T> {
    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Ui(update) => {
                    let _ = self.ui_tx.send(update).await;
                }
                Effect::OpenPeer(mode) => {
                    info!("Opening peer endpoint ({mode:?})");
                    self.transport.open(mode).await;
                }
                Effect::Connect(peer_id) => {
                    if let Err(e) = self.transport.connect(&peer_id).await {
                        queue.extend(self.session.connect_failed(&e.to_string()));
                    }
                }
                Effect::Send(link, frame) => {
                    if let Err(e) = self.transport.send(link, &frame).await {
                        warn!("Failed to send {} frame on {link}: {e}", frame.kind());
                        queue.push_back(Effect::Ui(UiUpdate::Notice(format!(
                            "Could not send {}: {e}",
                            frame.kind()
                        ))));
                    }
                }
                Effect::CloseLink(link) => self.transport.close(link).await,
                Effect::DestroyPeer => self.transport.destroy().await,
                Effect::LoadFile(path) => {
                    queue.extend(self.load_file(path));
                }
                Effect::StoreFile { payload, author } => {
                    let update = self.store_file(payload, author);
                    queue.extend(update);
                }
            }
        }
    }

    fn load_file(&mut self, path: PathBuf) -> Vec<Effect> {
        match files::load_outgoing(&path, self.settings.max_file_bytes) {
            Ok(payload) => self.session.outgoing_file(payload, path),
            Err(FileError::TooLarge { size, limit }) => {
                warn!("Refusing to send {}: {size} bytes", path.display());
                vec![Effect::Ui(UiUpdate::Notice(format!(
                    "File too large (max {})",
                    files::human_size(limit)
                )))]
            }
            Err(e) => {
                warn!("Failed to read {}: {e}", path.display());
                vec![Effect::Ui(UiUpdate::Notice(format!(
                    "Could not read {}: {e}",
                    path.display()
                )))]
            }
        }
    }

    fn store_file(&self, payload: FilePayload, author: String) -> Vec<Effect> {
        let mut effects = Vec::new();
        let saved_to = match files::store_incoming(&self.settings.download_dir, &payload) {
            Ok(path) => {
                info!("Saved {} to {}", payload.name, path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Failed to save {}: {e}", payload.name);
                effects.push(Effect::Ui(UiUpdate::Notice(format!(
                    "Could not save {}: {e}",
                    payload.name
                ))));
                None
            }
        };
        effects.insert(
            0,
            Effect::Ui(UiUpdate::ChatLine(ChatEntry {
                direction: Direction::Received,
                author,
                body: EntryBody::File {
                    name: payload.name,
                    size: payload.size,
                    saved_to,
                },
                at: Utc::now(),
            })),
        );
        effects
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the application event loop.
///
/// Listens on two channels using `tokio::select!`:
/// 1. Transport events
/// 2. User commands from the TUI
///
/// Returns on `Quit` or when the command channel closes, after tearing the
/// transport down.
pub async fn run<T: Transport>(
    transport: T,
    mut peer_rx: mpsc::Receiver<PeerEvent>,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut session: Session,
    settings: AppSettings,
) -> anyhow::Result<()> {
    info!("Application event loop started");

    let initial = session.start();
    let mut app = App {
        transport,
        session,
        ui_tx,
        settings,
    };
    app.apply(initial).await;

    let mut peer_open = true;

    loop {
        tokio::select! {
            // --- Transport events ---
            event = peer_rx.recv(), if peer_open => {
                match event {
                    Some(event) => {
                        debug!("Peer event: {event:?}");
                        let effects = app.session.handle_peer_event(event);
                        app.apply(effects).await;
                    }
                    None => {
                        info!("Peer event channel closed");
                        peer_open = false;
                    }
                }
            }

            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => {
                        let effects = app.session.handle_command(cmd);
                        app.apply(effects).await;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup
    let effects = app.session.handle_command(UserCommand::Quit);
    app.apply(effects).await;
    info!("Application event loop exiting");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
