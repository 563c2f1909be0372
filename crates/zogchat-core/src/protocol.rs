// Message types: frames exchanged with the remote peer, and the channel
// protocol between the session loop and the terminal UI.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Wire frames (peer <-> peer)
// ---------------------------------------------------------------------------

/// A single frame sent over a peer link, discriminated by its `type` field.
///
/// ```json
/// {"type":"message","content":"hi","username":"Ana","timestamp":1700000000000}
/// {"type":"file","name":"a.png","data":"data:image/png;base64,...","size":1234}
/// {"type":"username","username":"Ana"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    Message {
        content: String,
        #[serde(default)]
        username: String,
        /// Milliseconds since the Unix epoch, as stamped by the sender.
        #[serde(default)]
        timestamp: i64,
    },
    File(FilePayload),
    Username {
        username: String,
    },
    /// Any frame type this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Payload of a `file` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePayload {
    pub name: String,
    /// The file contents as a base64 data URL.
    pub data: String,
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Frame {
    /// Build a chat message frame stamped with the current time.
    pub fn message(content: impl Into<String>, username: impl Into<String>) -> Self {
        Frame::Message {
            content: content.into(),
            username: username.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// The `type` tag this frame carries on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Message { .. } => "message",
            Frame::File(_) => "file",
            Frame::Username { .. } => "username",
            Frame::Unknown => "unknown",
        }
    }

    pub fn encode(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }
}

// ---------------------------------------------------------------------------
// Session -> UI
// ---------------------------------------------------------------------------

/// The visible step of the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Enter a display name (and, for the creator, an expected recipient).
    Username,
    /// Show the share link and wait for the peer.
    Share,
    /// Exchange messages.
    Chat,
}

/// Severity of the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Waiting,
    Connected,
    Disconnected,
}

/// State of the connection indicator dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Waiting,
    Connecting,
    Connected,
    Disconnected,
}

/// Who this client is in the conversation, as the UI needs to know it.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleView {
    Creator,
    Guest { inviter: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
    System,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryBody {
    Text(String),
    File {
        name: String,
        size: u64,
        /// Where the file was written locally (received files) or read
        /// from (sent files), when known.
        saved_to: Option<PathBuf>,
    },
}

/// One line of the chat log.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub direction: Direction,
    pub author: String,
    pub body: EntryBody,
    pub at: DateTime<Utc>,
}

impl ChatEntry {
    pub fn text(direction: Direction, author: impl Into<String>, text: impl Into<String>) -> Self {
        ChatEntry {
            direction,
            author: author.into(),
            body: EntryBody::Text(text.into()),
            at: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        ChatEntry::text(Direction::System, "System", text)
    }
}

/// Updates pushed from the session loop to the TUI.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    Step(Step),
    Role(RoleView),
    /// The local display name was accepted.
    Username(String),
    /// The expected recipient registered by the creator (`None` when open to anyone).
    ExpectedRecipient(Option<String>),
    Status { text: String, kind: StatusKind },
    ConnectionStatus(ConnectionStatus),
    ShareLink(Option<String>),
    /// Name of the remote peer for the chat title.
    ChatTitle(Option<String>),
    ChatLine(ChatEntry),
    ClearChat,
    /// A one-off message for the user (the browser client used `alert`).
    Notice(String),
}

// ---------------------------------------------------------------------------
// UI -> session
// ---------------------------------------------------------------------------

/// Commands from the TUI to the session loop.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    SubmitUsername {
        username: String,
        expected_recipient: Option<String>,
    },
    SendMessage(String),
    SendFile(PathBuf),
    Disconnect,
    Quit,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
