//! Relay server core: shared state, WebSocket handler, connection registry,
//! and room fan-out.
//!
//! Each WebSocket connection gets a [`ConnectionId`] and an outbound channel.
//! Inbound frames are decoded as [`ClientEvent`]s and dispatched: join/leave
//! events update the [`RoomTable`], everything else is broadcast to the
//! addressed room's members other than the sender. Nothing is stored and no
//! reply ever goes back to the sender.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use camplink_proto::codec::{self, CodecError};
use camplink_proto::event::{
    ChatMessage, ClientEvent, ConnectedNotice, PresenceNotice, ScreenShareNotice, ServerEvent,
    SessionUpdate,
};
use camplink_proto::room::{ConnectionId, RoomName};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::rooms::RoomTable;

/// Default maximum accepted inbound frame size in bytes (64 KB).
const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Errors writing directly to a client socket.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The event could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The WebSocket rejected the frame.
    #[error("WebSocket send error: {0}")]
    Socket(#[from] axum::Error),
}

/// Connection registry and room table, guarded together so that membership
/// changes and fan-out never interleave.
#[derive(Default)]
struct Hub {
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    rooms: RoomTable,
}

/// Shared relay server state.
///
/// Fan-out happens under the hub lock, so events addressed to one room reach
/// every member in the order their broadcasts acquired that lock. Events are
/// encoded before the lock is taken; two frames arriving close together on
/// different connections may therefore be relayed in either order, but all
/// members see the same order.
pub struct RelayState {
    hub: Mutex<Hub>,
    /// Frames larger than this are dropped unread.
    max_frame_size: usize,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    /// Creates a relay state with no connections and the default frame limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a relay state with a custom inbound frame size limit.
    #[must_use]
    pub fn with_config(max_frame_size: usize) -> Self {
        Self {
            hub: Mutex::new(Hub::default()),
            max_frame_size,
        }
    }

    /// Registers a new connection and returns its freshly assigned id.
    pub fn register(&self, sender: mpsc::UnboundedSender<Message>) -> ConnectionId {
        let conn_id = ConnectionId::new();
        self.hub.lock().connections.insert(conn_id, sender);
        conn_id
    }

    /// Forgets a connection and removes it from every room it joined.
    ///
    /// Returns the rooms it was removed from. Unknown ids are a no-op.
    pub fn unregister(&self, conn_id: ConnectionId) -> Vec<RoomName> {
        let mut hub = self.hub.lock();
        hub.connections.remove(&conn_id);
        hub.rooms.leave_all(conn_id)
    }

    /// Adds a connection to a room. Returns `false` if already a member.
    pub fn join(&self, conn_id: ConnectionId, room: &RoomName) -> bool {
        let joined = self.hub.lock().rooms.join(conn_id, room);
        tracing::debug!(conn_id = %conn_id, room = %room, joined, "join");
        joined
    }

    /// Removes a connection from a room. Returns `false` if not a member.
    pub fn leave(&self, conn_id: ConnectionId, room: &RoomName) -> bool {
        let left = self.hub.lock().rooms.leave(conn_id, room);
        tracing::debug!(conn_id = %conn_id, room = %room, left, "leave");
        left
    }

    /// Current members of a room.
    #[must_use]
    pub fn members(&self, room: &RoomName) -> Vec<ConnectionId> {
        self.hub.lock().rooms.members(room)
    }

    /// Rooms a connection has joined.
    #[must_use]
    pub fn rooms_of(&self, conn_id: ConnectionId) -> Vec<RoomName> {
        self.hub.lock().rooms.rooms_of(conn_id)
    }

    /// Number of rooms with at least one member.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.hub.lock().rooms.room_count()
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.hub.lock().connections.len()
    }

    /// Sends `event` to every member of `room` except `sender`.
    ///
    /// The event is encoded once. Members whose channel has closed are
    /// skipped; their own connection task cleans them up. Returns the number
    /// of members the frame was handed to.
    pub fn broadcast(&self, room: &RoomName, sender: ConnectionId, event: &ServerEvent) -> usize {
        let frame = match codec::encode(event) {
            Ok(text) => Utf8Bytes::from(text),
            Err(e) => {
                tracing::error!(room = %room, error = %e, "failed to encode event");
                return 0;
            }
        };

        let hub = self.hub.lock();
        let mut delivered = 0;
        for member in hub.rooms.members(room) {
            if member == sender {
                continue;
            }
            if let Some(tx) = hub.connections.get(&member)
                && tx.send(Message::Text(frame.clone())).is_ok()
            {
                delivered += 1;
            }
        }
        drop(hub);

        tracing::debug!(
            room = %room,
            from = %sender,
            event = event.name(),
            delivered,
            "broadcast"
        );
        delivered
    }

    /// Applies one client event on behalf of `conn_id`.
    ///
    /// Returns the number of connections that were sent something.
    pub fn dispatch(&self, conn_id: ConnectionId, event: ClientEvent) -> usize {
        tracing::trace!(conn_id = %conn_id, event = event.name(), "dispatch");
        match event {
            ClientEvent::JoinCamp(id) => {
                self.join(conn_id, &RoomName::camp(&id));
                0
            }
            ClientEvent::LeaveCamp(id) => {
                self.leave(conn_id, &RoomName::camp(&id));
                0
            }
            ClientEvent::CampMessage(msg) => {
                let room = RoomName::camp(&msg.camp_id);
                let chat = ChatMessage::from_camp_message(msg);
                self.broadcast(&room, conn_id, &ServerEvent::NewMessage(chat))
            }
            ClientEvent::JoinSession(id) => {
                let room = RoomName::session(&id);
                self.join(conn_id, &room);
                let notice = PresenceNotice::now(conn_id);
                self.broadcast(&room, conn_id, &ServerEvent::UserJoined(notice))
            }
            ClientEvent::LeaveSession(id) => {
                let room = RoomName::session(&id);
                self.leave(conn_id, &room);
                let notice = PresenceNotice::now(conn_id);
                self.broadcast(&room, conn_id, &ServerEvent::UserLeft(notice))
            }
            ClientEvent::SessionControl(control) => {
                let room = RoomName::session(&control.session_id);
                let update = SessionUpdate::from(control);
                self.broadcast(&room, conn_id, &ServerEvent::SessionUpdate(update))
            }
            ClientEvent::StartScreenShare(id) => {
                let notice = ScreenShareNotice::now(conn_id);
                self.broadcast(
                    &RoomName::session(&id),
                    conn_id,
                    &ServerEvent::ScreenShareStarted(notice),
                )
            }
            ClientEvent::StopScreenShare(id) => {
                let notice = ScreenShareNotice::now(conn_id);
                self.broadcast(
                    &RoomName::session(&id),
                    conn_id,
                    &ServerEvent::ScreenShareStopped(notice),
                )
            }
            ClientEvent::SendNotification(request) => self.broadcast(
                &RoomName::user(&request.user_id),
                conn_id,
                &ServerEvent::Notification(request.notification),
            ),
            ClientEvent::JoinUserRoom(id) => {
                self.join(conn_id, &RoomName::user(&id));
                0
            }
        }
    }

    /// Decodes and dispatches one inbound frame.
    ///
    /// Oversized or undecodable frames are logged and dropped.
    pub fn handle_frame(&self, conn_id: ConnectionId, data: &[u8]) {
        if data.len() > self.max_frame_size {
            tracing::warn!(
                conn_id = %conn_id,
                size = data.len(),
                max = self.max_frame_size,
                "frame exceeds size limit, dropping"
            );
            return;
        }
        match codec::decode::<ClientEvent>(data) {
            Ok(event) => {
                self.dispatch(conn_id, event);
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, error = %e, "failed to decode frame");
            }
        }
    }

    /// Send a WebSocket Close frame to all connected clients.
    ///
    /// Each connection's writer task forwards the close frame and the
    /// connection then winds down through the normal disconnect path.
    pub fn close_all_connections(&self) {
        let hub = self.hub.lock();
        for (conn_id, sender) in &hub.connections {
            tracing::info!(conn_id = %conn_id, "sending close frame");
            let _ = sender.send(Message::Close(None));
        }
    }
}

/// Handles an upgraded WebSocket connection.
///
/// The connection lifecycle:
/// 1. Register the connection and send it a `connected` event with its id.
/// 2. Spawn a writer task draining the connection's outbound channel.
/// 3. Read frames and dispatch them until the socket closes.
/// 4. On disconnect, unregister and drop every room membership.
pub async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn_id = state.register(tx);

    tracing::info!(conn_id = %conn_id, "connection opened");

    let hello = ServerEvent::Connected(ConnectedNotice { socket_id: conn_id });
    if let Err(e) = send_event(&mut ws_sender, &hello).await {
        tracing::error!(conn_id = %conn_id, error = %e, "failed to send connected event");
        state.unregister(conn_id);
        return;
    }

    // Writer: forward queued frames to the socket.
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(conn_id = %conn_id, "WebSocket write failed");
                break;
            }
        }
    });

    // Reader: dispatch inbound frames.
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    reader_state.handle_frame(conn_id, text.as_str().as_bytes());
                }
                Message::Binary(data) => reader_state.handle_frame(conn_id, &data),
                Message::Close(_) => {
                    tracing::info!(conn_id = %conn_id, "received close frame");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    let rooms = state.unregister(conn_id);
    tracing::info!(
        conn_id = %conn_id,
        rooms = rooms.len(),
        "connection closed and removed from rooms"
    );
}

/// Encodes and sends an event directly on a WebSocket sender.
async fn send_event(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    event: &ServerEvent,
) -> Result<(), SendError> {
    let text = codec::encode(event)?;
    ws_sender.send(Message::Text(text.into())).await?;
    Ok(())
}

/// Starts the relay server on the given address and returns the bound address
/// and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(RelayState::new())).await
}

/// Starts the relay server with a pre-configured [`RelayState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<RelayState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "relay server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<RelayState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
