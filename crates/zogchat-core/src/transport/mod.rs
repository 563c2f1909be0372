// Peer transport: the layer that issues a session identifier, establishes
// links and moves frames. The session logic only reacts to `PeerEvent`s and
// calls the `Transport` trait, so the WebSocket implementation can be swapped
// for an in-memory one in tests.

pub mod ws;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::Frame;

pub use ws::WsTransport;

/// Identifies one link for the lifetime of a transport. Ids are never reused,
/// so events from a link the session already dropped can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    Inbound,
    Outbound,
}

/// How the local endpoint should come up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Accept inbound links; the issued identifier is dialable.
    Listen,
    /// Only dial out; the issued identifier is informational.
    DialOnly,
}

/// Events emitted by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// The local endpoint is ready.
    Open { id: String },
    /// A link is being established.
    Connection {
        link: LinkId,
        remote: String,
        direction: LinkDirection,
    },
    /// The link is ready to carry frames.
    LinkOpen { link: LinkId },
    Data { link: LinkId, frame: Frame },
    LinkClosed { link: LinkId },
    LinkError { link: LinkId, message: String },
    /// Endpoint-level failure.
    Error { message: String },
}

impl PeerEvent {
    /// The link an event refers to, if any.
    pub fn link(&self) -> Option<LinkId> {
        match self {
            PeerEvent::Connection { link, .. }
            | PeerEvent::LinkOpen { link }
            | PeerEvent::Data { link, .. }
            | PeerEvent::LinkClosed { link }
            | PeerEvent::LinkError { link, .. } => Some(*link),
            PeerEvent::Open { .. } | PeerEvent::Error { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer id `{0}` is not a ws:// address")]
    InvalidPeerId(String),

    #[error("{0} is not open")]
    UnknownLink(LinkId),

    #[error("transport has not been opened")]
    NotOpen,

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("failed to encode frame: {0}")]
    Encode(#[from] crate::protocol::FrameError),
}

/// Implementations must not wait on the event channel from these methods:
/// the caller is usually the task draining it.
#[async_trait]
pub trait Transport: Send {
    /// Bring the local endpoint up. Completion is reported as `PeerEvent::Open`
    /// (or `PeerEvent::Error`), not through the return value.
    async fn open(&mut self, mode: OpenMode);

    /// Start dialing `peer_id`. Emits `Connection`, then `LinkOpen` or
    /// `LinkError`.
    async fn connect(&mut self, peer_id: &str) -> Result<LinkId, TransportError>;

    async fn send(&mut self, link: LinkId, frame: &Frame) -> Result<(), TransportError>;

    /// Close one link. Emits `LinkClosed`.
    async fn close(&mut self, link: LinkId);

    /// Stop accepting and close every link.
    async fn destroy(&mut self);
}
