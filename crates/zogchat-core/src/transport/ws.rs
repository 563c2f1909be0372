// WebSocket transport.
//
// A listening endpoint binds a TCP port and issues the identifier
// `ws://{advertise_host}:{port}/{token}`; only handshakes on `/{token}` are
// accepted. Each open link gets a writer task (fed by an mpsc outbox) and a
// reader task that decodes text messages into frames.
//
// Background tasks await on the event channel. The `Transport` methods never
// do: their caller is normally the channel's only consumer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, Stream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{LinkDirection, LinkId, OpenMode, PeerEvent, Transport, TransportError};
use crate::config::TransportConfig;
use crate::protocol::Frame;

/// Frames queued per link before `send` waits on the writer.
const OUTBOX_CAPACITY: usize = 64;

enum LinkSlot {
    /// Announced with `Connection` but not attached yet. Removing it makes
    /// `attach` drop the socket.
    Pending,
    Open {
        outbox: mpsc::Sender<Message>,
        stop: oneshot::Sender<()>,
    },
}

/// State shared between the transport handle and its background tasks.
#[derive(Clone)]
struct Shared {
    events: mpsc::Sender<PeerEvent>,
    links: Arc<Mutex<HashMap<LinkId, LinkSlot>>>,
    next_link: Arc<AtomicU64>,
}

impl Shared {
    fn allocate(&self) -> LinkId {
        LinkId(self.next_link.fetch_add(1, Ordering::Relaxed) + 1)
    }

    async fn emit(&self, event: PeerEvent) {
        if self.events.send(event).await.is_err() {
            debug!("Peer event dropped: receiver closed");
        }
    }

    /// Queue an event without waiting. A full channel hands it to a task.
    fn emit_detached(&self, event: PeerEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let events = self.events.clone();
                tokio::spawn(async move {
                    if events.send(event).await.is_err() {
                        debug!("Peer event dropped: receiver closed");
                    }
                });
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Peer event dropped: receiver closed");
            }
        }
    }
}

pub struct WsTransport {
    config: TransportConfig,
    shared: Shared,
    acceptor: Option<JoinHandle<()>>,
    local_id: Option<String>,
}

impl WsTransport {
    pub fn new(config: TransportConfig, events: mpsc::Sender<PeerEvent>) -> Self {
        WsTransport {
            config,
            shared: Shared {
                events,
                links: Arc::new(Mutex::new(HashMap::new())),
                next_link: Arc::new(AtomicU64::new(0)),
            },
            acceptor: None,
            local_id: None,
        }
    }

    /// The identifier issued by the last successful `open`.
    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    async fn open_listener(&mut self) {
        let addr = format!("{}:{}", self.config.listen_host, self.config.listen_port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(source) => {
                let err = TransportError::Bind { addr, source };
                warn!("{err}");
                self.shared.emit_detached(PeerEvent::Error {
                    message: err.to_string(),
                });
                return;
            }
        };

        let port = listener
            .local_addr()
            .map(|a| a.port())
            .unwrap_or(self.config.listen_port);
        let token = Uuid::new_v4().to_string();
        let id = format!("ws://{}:{}/{}", self.config.advertise_host, port, token);
        info!("Listening on {addr} (port {port}) as {id}");

        self.acceptor = Some(tokio::spawn(accept_loop(
            listener,
            format!("/{token}"),
            self.shared.clone(),
        )));
        self.local_id = Some(id.clone());
        self.shared.emit_detached(PeerEvent::Open { id });
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&mut self, mode: OpenMode) {
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
        match mode {
            OpenMode::Listen => self.open_listener().await,
            OpenMode::DialOnly => {
                let id = format!("guest-{}", Uuid::new_v4());
                info!("Opened dial-only endpoint {id}");
                self.local_id = Some(id.clone());
                self.shared.emit_detached(PeerEvent::Open { id });
            }
        }
    }

    async fn connect(&mut self, peer_id: &str) -> Result<LinkId, TransportError> {
        if self.local_id.is_none() {
            return Err(TransportError::NotOpen);
        }
        let url = peer_id.trim().to_string();
        if !url.starts_with("ws://") {
            return Err(TransportError::InvalidPeerId(url));
        }

        let link = self.shared.allocate();
        self.shared.links.lock().await.insert(link, LinkSlot::Pending);

        let shared = self.shared.clone();
        tokio::spawn(async move {
            shared
                .emit(PeerEvent::Connection {
                    link,
                    remote: url.clone(),
                    direction: LinkDirection::Outbound,
                })
                .await;
            info!("Dialing {url} on {link}");
            match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((ws, _response)) => attach(ws, link, shared).await,
                Err(e) => {
                    let was_dialing = shared.links.lock().await.remove(&link).is_some();
                    warn!("Dial to {url} failed: {e}");
                    if was_dialing {
                        shared
                            .emit(PeerEvent::LinkError {
                                link,
                                message: e.to_string(),
                            })
                            .await;
                    }
                }
            }
        });

        Ok(link)
    }

    async fn send(&mut self, link: LinkId, frame: &Frame) -> Result<(), TransportError> {
        let text = frame.encode()?;
        let outbox = match self.shared.links.lock().await.get(&link) {
            Some(LinkSlot::Open { outbox, .. }) => outbox.clone(),
            _ => return Err(TransportError::UnknownLink(link)),
        };
        outbox
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| TransportError::UnknownLink(link))
    }

    async fn close(&mut self, link: LinkId) {
        let slot = self.shared.links.lock().await.remove(&link);
        match slot {
            Some(LinkSlot::Open { outbox, stop }) => {
                // A full outbox skips the close frame; dropping `outbox` still
                // ends the writer.
                let _ = outbox.try_send(Message::Close(None));
                let _ = stop.send(());
            }
            Some(LinkSlot::Pending) => {}
            None => {
                debug!("close() on {link}, which is not open");
                return;
            }
        }
        info!("Closed {link}");
        self.shared.emit_detached(PeerEvent::LinkClosed { link });
    }

    async fn destroy(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
        let links: Vec<LinkId> = self.shared.links.lock().await.keys().copied().collect();
        for link in links {
            self.close(link).await;
        }
        if let Some(id) = self.local_id.take() {
            info!("Destroyed endpoint {id}");
        }
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Accept TCP connections and run the WebSocket handshake for each one.
/// Handshakes live in a `JoinSet` so aborting this task also drops them.
async fn accept_loop(listener: TcpListener, expected_path: String, shared: Shared) {
    let mut handshakes = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        debug!("Accepted TCP connection from {addr}");
                        handshakes.spawn(handshake(
                            stream,
                            addr.to_string(),
                            expected_path.clone(),
                            shared.clone(),
                        ));
                    }
                    Err(e) => {
                        warn!("Accept failed: {e}");
                    }
                }
            }
            Some(_) = handshakes.join_next() => {}
        }
    }
}

async fn handshake(stream: TcpStream, addr: String, expected_path: String, shared: Shared) {
    let check = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if req.uri().path() == expected_path {
            Ok(resp)
        } else {
            Err(reject(StatusCode::NOT_FOUND, "unknown session"))
        }
    };

    match tokio_tungstenite::accept_hdr_async(stream, check).await {
        Ok(ws) => {
            let link = shared.allocate();
            info!("Inbound {link} from {addr}");
            shared.links.lock().await.insert(link, LinkSlot::Pending);
            shared
                .emit(PeerEvent::Connection {
                    link,
                    remote: addr,
                    direction: LinkDirection::Inbound,
                })
                .await;
            attach(ws, link, shared).await;
        }
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
        }
    }
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some(reason.to_string()));
    *resp.status_mut() = status;
    resp
}

/// Register an established WebSocket as an open link, announce it, and start
/// its writer and reader tasks. The slot must still be `Pending`; a link
/// closed before its handshake finished gets a close frame instead.
async fn attach<S>(mut ws: WebSocketStream<S>, link: LinkId, shared: Shared)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
    let (stop_tx, stop_rx) = oneshot::channel();

    let mut links = shared.links.lock().await;
    if !matches!(links.get(&link), Some(LinkSlot::Pending)) {
        drop(links);
        debug!("{link} was closed before it opened, dropping socket");
        let _ = ws.close(None).await;
        return;
    }
    links.insert(
        link,
        LinkSlot::Open {
            outbox: outbox_tx,
            stop: stop_tx,
        },
    );
    drop(links);

    let (sink, stream) = ws.split();
    tokio::spawn(write_loop(sink, outbox_rx, link));
    // LinkOpen is queued before the reader starts, so no Data can overtake it.
    shared.emit(PeerEvent::LinkOpen { link }).await;
    tokio::spawn(read_loop(stream, stop_rx, link, shared));
}

async fn write_loop<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut outbox: mpsc::Receiver<Message>,
    link: LinkId,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(msg) = outbox.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = sink.send(msg).await {
            debug!("Write on {link} failed: {e}");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop<St>(
    stream: St,
    mut stop: oneshot::Receiver<()>,
    link: LinkId,
    shared: Shared,
) where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    tokio::select! {
        // Closed locally: `close()` already announced it.
        _ = &mut stop => return,
        _ = forward_frames(stream, link, &shared.events) => {}
    }

    let removed = shared.links.lock().await.remove(&link).is_some();
    if removed {
        info!("{link} closed by peer");
        shared.emit(PeerEvent::LinkClosed { link }).await;
    }
}

/// Decode text messages from `stream` into `Data` events until the peer sends
/// a close frame or the stream fails. Malformed frames are logged and skipped.
/// Returns `Err(())` if the event receiver is gone.
pub async fn forward_frames<St>(
    mut stream: St,
    link: LinkId,
    events: &mpsc::Sender<PeerEvent>,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match Frame::decode(text.as_str()) {
                Ok(frame) => {
                    if events.send(PeerEvent::Data { link, frame }).await.is_err() {
                        return Err(());
                    }
                }
                Err(e) => {
                    warn!("Dropping malformed frame on {link}: {e}");
                }
            },
            Ok(Message::Close(_)) => {
                info!("Peer on {link} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error on {link}: {e}");
                break;
            }
            _ => {
                // Binary, Ping, Pong, Frame: not part of the chat protocol.
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
