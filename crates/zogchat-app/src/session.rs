// Chat session state machine.
//
// `Session` owns the connection lifecycle of one client: the local name, the
// current link, the expected-recipient check and the visible UI step. It does
// no I/O. Every input (a user command or a transport event) returns a list of
// `Effect`s that the app loop carries out against the transport, the file
// system and the UI channel.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, info, warn};
use zogchat_core::config::Config;
use zogchat_core::protocol::{
    ChatEntry, ConnectionStatus, Direction, EntryBody, FilePayload, Frame, RoleView, StatusKind,
    Step, UiUpdate, UserCommand,
};
use zogchat_core::share_link::ShareLink;
use zogchat_core::transport::{LinkDirection, LinkId, OpenMode, PeerEvent};
use zogchat_core::verify::{RecipientGuard, Verdict};

/// Minimum length of a display name, in characters, after trimming.
pub const MIN_USERNAME_CHARS: usize = 2;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Which side of the conversation this client is.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    /// Started without a share link; listens and publishes the link.
    Creator,
    /// Started from a share link; dials the creator.
    Guest {
        session_id: String,
        inviter: Option<String>,
    },
}

impl Role {
    pub fn from_share_link(link: ShareLink) -> Self {
        Role::Guest {
            session_id: link.session,
            inviter: link.inviter,
        }
    }

    pub fn is_creator(&self) -> bool {
        matches!(self, Role::Creator)
    }

    fn view(&self) -> RoleView {
        match self {
            Role::Creator => RoleView::Creator,
            Role::Guest { inviter, .. } => RoleView::Guest {
                inviter: inviter.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    /// `OpenPeer` issued, waiting for the transport's `Open`.
    AwaitingOpen,
    /// Creator is listening with a published link.
    WaitingForPeer,
    Connecting,
    Connected,
    Closed,
}

/// Work the app loop must carry out on behalf of the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    OpenPeer(OpenMode),
    Connect(String),
    Send(LinkId, Frame),
    CloseLink(LinkId),
    DestroyPeer,
    /// Read a file from disk and hand it back through `Session::outgoing_file`.
    LoadFile(PathBuf),
    /// Write a received file to the download directory.
    StoreFile { payload: FilePayload, author: String },
    Ui(UiUpdate),
}

/// Session-level settings taken from the config.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Prefix of generated share links.
    pub share_base: String,
    pub max_attempts: u32,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        SessionSettings {
            share_base: config.share.base_url.trim().to_string(),
            max_attempts: config.security.max_attempts,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings::from_config(&Config::default())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Session {
    role: Role,
    settings: SessionSettings,
    state: ConnectionState,
    step: Step,
    username: Option<String>,
    remote_username: Option<String>,
    /// Address of the current link's remote end, for the "Connected to" line.
    remote_addr: Option<String>,
    guard: RecipientGuard,
    /// The remote peer passed the recipient check.
    verified: bool,
    local_id: Option<String>,
    share_link: Option<String>,
    link: Option<LinkId>,
    link_open: bool,
    /// Set once the attempt cap is reached; nothing reconnects after that.
    ended: bool,
}

impl Session {
    pub fn new(role: Role, settings: SessionSettings) -> Self {
        let guard = RecipientGuard::new(None, settings.max_attempts);
        Session {
            role,
            settings,
            state: ConnectionState::Idle,
            step: Step::Username,
            username: None,
            remote_username: None,
            remote_addr: None,
            guard,
            verified: false,
            local_id: None,
            share_link: None,
            link: None,
            link_open: false,
            ended: false,
        }
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn remote_username(&self) -> Option<&str> {
        self.remote_username.as_deref()
    }

    pub fn share_link(&self) -> Option<&str> {
        self.share_link.as_deref()
    }

    pub fn current_link(&self) -> Option<LinkId> {
        self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link_open
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    pub fn guard(&self) -> &RecipientGuard {
        &self.guard
    }

    /// Initial UI state.
    pub fn start(&mut self) -> Vec<Effect> {
        info!("Session starting as {:?}", self.role);
        vec![
            Effect::Ui(UiUpdate::Role(self.role.view())),
            Effect::Ui(UiUpdate::Step(Step::Username)),
            Effect::Ui(UiUpdate::ConnectionStatus(ConnectionStatus::Disconnected)),
        ]
    }

    pub fn handle_command(&mut self, cmd: UserCommand) -> Vec<Effect> {
        match cmd {
            UserCommand::SubmitUsername {
                username,
                expected_recipient,
            } => self.submit_username(&username, expected_recipient),
            UserCommand::SendMessage(text) => self.send_message(&text),
            UserCommand::SendFile(path) => self.send_file(path),
            UserCommand::Disconnect => self.disconnect(),
            UserCommand::Quit => self.quit(),
        }
    }

    pub fn handle_peer_event(&mut self, event: PeerEvent) -> Vec<Effect> {
        if let Some(link) = event.link() {
            let is_new_link = matches!(event, PeerEvent::Connection { .. });
            if !is_new_link && self.link != Some(link) {
                debug!("Ignoring {event:?}: {link} is not the current link");
                return Vec::new();
            }
        }

        match event {
            PeerEvent::Open { id } => self.on_open(id),
            PeerEvent::Connection {
                link,
                remote,
                direction,
            } => self.on_connection(link, remote, direction),
            PeerEvent::LinkOpen { link } => self.on_link_open(link),
            PeerEvent::Data { link, frame } => self.on_frame(link, frame),
            PeerEvent::LinkClosed { .. } => self.on_link_closed(),
            PeerEvent::LinkError { message, .. } => self.on_link_error(&message),
            PeerEvent::Error { message } => self.on_error(&message),
        }
    }

    /// Wrap a loaded file into a `file` frame for the current link.
    pub fn outgoing_file(&mut self, payload: FilePayload, source: PathBuf) -> Vec<Effect> {
        let Some(link) = self.link.filter(|_| self.link_open) else {
            return vec![notice("Not connected")];
        };
        info!("Sending file {} ({} bytes) on {link}", payload.name, payload.size);
        let entry = ChatEntry {
            direction: Direction::Sent,
            author: self.display_name().to_string(),
            body: EntryBody::File {
                name: payload.name.clone(),
                size: payload.size,
                saved_to: Some(source),
            },
            at: Utc::now(),
        };
        vec![
            Effect::Send(link, Frame::File(payload)),
            Effect::Ui(UiUpdate::ChatLine(entry)),
        ]
    }

    /// A `Connect` effect failed before the transport could start dialing.
    pub fn connect_failed(&mut self, message: &str) -> Vec<Effect> {
        warn!("Connect failed: {message}");
        self.state = ConnectionState::Closed;
        let mut effects = vec![
            status("Connection error", StatusKind::Disconnected),
            indicator(ConnectionStatus::Disconnected),
            notice(format!("Could not connect: {message}")),
        ];
        if !self.role.is_creator() {
            effects.extend(self.enter_step(Step::Username));
        }
        effects
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn submit_username(&mut self, raw: &str, expected_recipient: Option<String>) -> Vec<Effect> {
        if self.ended || self.step != Step::Username {
            debug!("Ignoring username submission in step {:?}", self.step);
            return Vec::new();
        }

        let name = raw.trim();
        if name.chars().count() < MIN_USERNAME_CHARS {
            return vec![notice(format!(
                "Please enter a valid name (at least {MIN_USERNAME_CHARS} characters)"
            ))];
        }
        info!("Username set to {name}");
        self.username = Some(name.to_string());

        let mut effects = vec![Effect::Ui(UiUpdate::Username(name.to_string()))];
        effects.extend(self.enter_step(Step::Share));

        match &self.role {
            Role::Creator => {
                self.guard = RecipientGuard::new(expected_recipient, self.settings.max_attempts);
                self.verified = false;
                if let Some(expected) = self.guard.expected() {
                    info!("Expecting recipient {expected}");
                }
                effects.push(Effect::Ui(UiUpdate::ExpectedRecipient(
                    self.guard.expected().map(str::to_string),
                )));
                effects.push(status("Starting session...", StatusKind::Waiting));
                effects.push(indicator(ConnectionStatus::Waiting));
                self.state = ConnectionState::AwaitingOpen;
                effects.push(Effect::OpenPeer(OpenMode::Listen));
            }
            Role::Guest { session_id, .. } => {
                if self.local_id.is_some() {
                    // Retry after a rejected name: the endpoint is still up.
                    let session_id = session_id.clone();
                    effects.extend(self.begin_dial(session_id));
                } else {
                    self.state = ConnectionState::AwaitingOpen;
                    effects.push(status("Starting session...", StatusKind::Waiting));
                    effects.push(Effect::OpenPeer(OpenMode::DialOnly));
                }
            }
        }
        effects
    }

    fn send_message(&mut self, text: &str) -> Vec<Effect> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        let Some(link) = self.link.filter(|_| self.link_open) else {
            debug!("Dropping outgoing message: not connected");
            return Vec::new();
        };
        if !self.peer_trusted() {
            return vec![notice("Waiting for the peer to confirm their name")];
        }

        let author = self.display_name().to_string();
        vec![
            Effect::Send(link, Frame::message(text, author.clone())),
            Effect::Ui(UiUpdate::ChatLine(ChatEntry::text(
                Direction::Sent,
                author,
                text,
            ))),
        ]
    }

    fn send_file(&mut self, path: PathBuf) -> Vec<Effect> {
        if !self.link_open {
            return vec![notice("Not connected")];
        }
        if !self.peer_trusted() {
            return vec![notice("Waiting for the peer to confirm their name")];
        }
        vec![Effect::LoadFile(path)]
    }

    fn disconnect(&mut self) -> Vec<Effect> {
        info!("Disconnecting");
        let mut effects = Vec::new();
        if let Some(link) = self.link.take() {
            effects.push(Effect::CloseLink(link));
        }
        effects.push(Effect::DestroyPeer);

        self.link_open = false;
        self.verified = false;
        self.ended = false;
        self.guard.reset();
        self.local_id = None;
        self.share_link = None;
        self.remote_username = None;
        self.remote_addr = None;

        effects.extend([
            Effect::Ui(UiUpdate::ShareLink(None)),
            Effect::Ui(UiUpdate::ClearChat),
            Effect::Ui(UiUpdate::ChatTitle(None)),
            indicator(ConnectionStatus::Disconnected),
            status("Disconnected", StatusKind::Disconnected),
        ]);

        match self.role {
            Role::Creator if self.username.is_some() => {
                effects.extend(self.enter_step(Step::Share));
                effects.push(status("Starting session...", StatusKind::Waiting));
                effects.push(indicator(ConnectionStatus::Waiting));
                self.state = ConnectionState::AwaitingOpen;
                effects.push(Effect::OpenPeer(OpenMode::Listen));
            }
            _ => {
                self.state = ConnectionState::Idle;
                effects.extend(self.enter_step(Step::Username));
            }
        }
        effects
    }

    fn quit(&mut self) -> Vec<Effect> {
        info!("Session closing");
        let mut effects = Vec::new();
        if let Some(link) = self.link.take() {
            effects.push(Effect::CloseLink(link));
        }
        self.link_open = false;
        self.state = ConnectionState::Closed;
        effects.push(Effect::DestroyPeer);
        effects
    }

    // -----------------------------------------------------------------------
    // Transport events
    // -----------------------------------------------------------------------

    fn on_open(&mut self, id: String) -> Vec<Effect> {
        if self.state != ConnectionState::AwaitingOpen {
            debug!("Ignoring Open({id}) in state {:?}", self.state);
            return Vec::new();
        }
        info!("Peer endpoint open: {id}");
        self.local_id = Some(id.clone());

        match &self.role {
            Role::Creator => {
                let inviter = self.username.as_deref().unwrap_or_default();
                let link = ShareLink::new(self.settings.share_base.clone(), id, inviter).to_string();
                info!("Share link: {link}");
                self.share_link = Some(link.clone());
                self.state = ConnectionState::WaitingForPeer;
                vec![
                    Effect::Ui(UiUpdate::ShareLink(Some(link))),
                    status("Waiting for connection...", StatusKind::Waiting),
                    indicator(ConnectionStatus::Waiting),
                ]
            }
            Role::Guest { session_id, .. } => {
                let session_id = session_id.clone();
                self.begin_dial(session_id)
            }
        }
    }

    fn on_connection(
        &mut self,
        link: LinkId,
        remote: String,
        direction: LinkDirection,
    ) -> Vec<Effect> {
        if self.ended {
            info!("Refusing {link} from {remote}: session has ended");
            return vec![Effect::CloseLink(link)];
        }
        if direction == LinkDirection::Inbound {
            if let Some(current) = self.link {
                warn!("Refusing {link} from {remote}: {current} is already active");
                return vec![Effect::CloseLink(link)];
            }
            if !self.role.is_creator() || self.state != ConnectionState::WaitingForPeer {
                warn!("Refusing unexpected inbound {link} from {remote}");
                return vec![Effect::CloseLink(link)];
            }
        }

        info!("Link {link} with {remote} ({direction:?})");
        self.link = Some(link);
        self.link_open = false;
        self.verified = false;
        self.remote_addr = Some(remote);
        self.state = ConnectionState::Connecting;
        vec![indicator(ConnectionStatus::Connecting)]
    }

    fn on_link_open(&mut self, link: LinkId) -> Vec<Effect> {
        info!("{link} open");
        self.link_open = true;
        self.state = ConnectionState::Connected;

        let peer = self
            .remote_addr
            .clone()
            .unwrap_or_else(|| link.to_string());
        vec![
            status("Connected", StatusKind::Connected),
            indicator(ConnectionStatus::Connected),
            Effect::Ui(UiUpdate::Step(self.set_step(Step::Chat))),
            Effect::Ui(UiUpdate::ChatLine(ChatEntry::system(format!(
                "Connected to {peer}"
            )))),
            Effect::Send(
                link,
                Frame::Username {
                    username: self.display_name().to_string(),
                },
            ),
            Effect::Ui(UiUpdate::ChatTitle(self.remote_username.clone())),
        ]
    }

    fn on_frame(&mut self, link: LinkId, frame: Frame) -> Vec<Effect> {
        match frame {
            Frame::Username { username } => self.on_remote_username(link, username),
            Frame::Message {
                content, username, ..
            } => {
                if !self.peer_trusted() {
                    warn!("Dropping message on {link}: peer not verified");
                    return Vec::new();
                }
                let author = self.remote_author(&username);
                vec![Effect::Ui(UiUpdate::ChatLine(ChatEntry::text(
                    Direction::Received,
                    author,
                    content,
                )))]
            }
            Frame::File(payload) => {
                if !self.peer_trusted() {
                    warn!("Dropping file {} on {link}: peer not verified", payload.name);
                    return Vec::new();
                }
                info!("Received file {} ({} bytes)", payload.name, payload.size);
                let author = self.remote_author("");
                vec![Effect::StoreFile { payload, author }]
            }
            Frame::Unknown => {
                debug!("Ignoring frame of unknown type on {link}");
                Vec::new()
            }
        }
    }

    fn on_remote_username(&mut self, link: LinkId, username: String) -> Vec<Effect> {
        info!("Peer on {link} is {username}");
        self.remote_username = Some(username.clone());

        if !self.role.is_creator() || !self.guard.is_active() {
            self.verified = true;
            return vec![Effect::Ui(UiUpdate::ChatTitle(Some(username)))];
        }

        match self.guard.check(&username) {
            Verdict::Accepted => {
                info!("{username} matches the expected recipient");
                self.verified = true;
                vec![Effect::Ui(UiUpdate::ChatTitle(Some(username)))]
            }
            Verdict::Rejected { remaining } => {
                warn!("{username} is not the expected recipient, {remaining} attempt(s) left");
                let mut effects = self.drop_current_link();
                self.state = ConnectionState::WaitingForPeer;
                effects.extend([
                    status(
                        format!("Incorrect name - {remaining} attempt(s) remaining"),
                        StatusKind::Waiting,
                    ),
                    indicator(ConnectionStatus::Waiting),
                    Effect::Ui(UiUpdate::ChatTitle(None)),
                ]);
                effects
            }
            Verdict::Exhausted => {
                warn!("{username} rejected, attempt limit reached; ending session");
                let mut effects = self.drop_current_link();
                effects.push(Effect::DestroyPeer);
                self.state = ConnectionState::Closed;
                self.ended = true;
                self.local_id = None;
                self.share_link = None;
                effects.extend([
                    status(
                        format!(
                            "Connection closed - {} failed attempts",
                            self.guard.max_attempts()
                        ),
                        StatusKind::Disconnected,
                    ),
                    indicator(ConnectionStatus::Disconnected),
                    Effect::Ui(UiUpdate::ShareLink(None)),
                    Effect::Ui(UiUpdate::ChatTitle(None)),
                ]);
                effects
            }
        }
    }

    fn on_link_closed(&mut self) -> Vec<Effect> {
        self.link = None;
        self.link_open = false;
        self.verified = false;
        self.remote_addr = None;

        if self.ended {
            return vec![indicator(ConnectionStatus::Disconnected)];
        }

        if self.role.is_creator() && self.guard.retry_pending() {
            info!(
                "Link closed with a retry pending ({}/{} failed)",
                self.guard.failed_attempts(),
                self.guard.max_attempts()
            );
            self.state = ConnectionState::WaitingForPeer;
            return vec![indicator(ConnectionStatus::Waiting)];
        }

        info!("Connection closed");
        self.remote_username = None;
        let mut effects = vec![
            status("Connection closed", StatusKind::Disconnected),
            indicator(ConnectionStatus::Disconnected),
            Effect::Ui(UiUpdate::ClearChat),
            Effect::Ui(UiUpdate::ChatTitle(None)),
        ];
        if self.role.is_creator() {
            self.state = ConnectionState::WaitingForPeer;
            effects.extend(self.enter_step(Step::Share));
        } else {
            self.state = ConnectionState::Closed;
            effects.extend(self.enter_step(Step::Username));
        }
        effects
    }

    fn on_link_error(&mut self, message: &str) -> Vec<Effect> {
        warn!("Link error: {message}");
        self.link = None;
        self.link_open = false;
        self.verified = false;
        self.remote_addr = None;

        let mut effects = vec![
            status("Connection error", StatusKind::Disconnected),
            indicator(ConnectionStatus::Disconnected),
        ];
        match &self.role {
            Role::Creator => {
                self.state = ConnectionState::WaitingForPeer;
            }
            Role::Guest { inviter, .. } => {
                self.state = ConnectionState::Closed;
                let target = inviter.as_deref().unwrap_or("the session");
                effects.push(notice(format!("Could not reach {target}: {message}")));
                effects.extend(self.enter_step(Step::Username));
            }
        }
        effects
    }

    fn on_error(&mut self, message: &str) -> Vec<Effect> {
        warn!("Transport error: {message}");
        let mut effects = vec![
            status("Connection error", StatusKind::Disconnected),
            indicator(ConnectionStatus::Disconnected),
        ];
        if self.state == ConnectionState::AwaitingOpen {
            // The endpoint never came up: back to the name step to retry.
            self.state = ConnectionState::Closed;
            self.share_link = None;
            effects.push(notice(format!(
                "Could not start the session: {message}. Press Enter to retry"
            )));
            effects.extend(self.enter_step(Step::Username));
        } else {
            effects.push(notice(message));
        }
        effects
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn begin_dial(&mut self, session_id: String) -> Vec<Effect> {
        info!("Connecting to {session_id}");
        self.state = ConnectionState::Connecting;
        let mut effects = vec![
            status("Connecting automatically...", StatusKind::Waiting),
            indicator(ConnectionStatus::Connecting),
        ];
        if self.step == Step::Username {
            effects.extend(self.enter_step(Step::Share));
        }
        effects.push(Effect::Connect(session_id));
        effects
    }

    /// Close the current link and forget it, so its `LinkClosed` is stale.
    fn drop_current_link(&mut self) -> Vec<Effect> {
        self.link_open = false;
        self.verified = false;
        self.remote_username = None;
        self.remote_addr = None;
        self.link.take().map(Effect::CloseLink).into_iter().collect()
    }

    fn peer_trusted(&self) -> bool {
        !self.guard.is_active() || self.verified
    }

    fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    fn remote_author(&self, declared: &str) -> String {
        if !declared.trim().is_empty() {
            declared.to_string()
        } else {
            self.remote_username
                .clone()
                .unwrap_or_else(|| "Peer".to_string())
        }
    }

    fn set_step(&mut self, step: Step) -> Step {
        self.step = step;
        step
    }

    fn enter_step(&mut self, step: Step) -> Option<Effect> {
        if self.step == step {
            return None;
        }
        self.step = step;
        Some(Effect::Ui(UiUpdate::Step(step)))
    }
}

fn status(text: impl Into<String>, kind: StatusKind) -> Effect {
    Effect::Ui(UiUpdate::Status {
        text: text.into(),
        kind,
    })
}

fn indicator(status: ConnectionStatus) -> Effect {
    Effect::Ui(UiUpdate::ConnectionStatus(status))
}

fn notice(text: impl Into<String>) -> Effect {
    Effect::Ui(UiUpdate::Notice(text.into()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
