// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::future_not_send,
    clippy::missing_panics_doc
)]

//! Integration tests for camp chat, user notifications and disconnect
//! cleanup over real WebSocket connections.
//!
//! Each test starts an in-process relay on an OS-assigned port and connects
//! `tokio-tungstenite` clients. Because every connection is read by its own
//! task, tests wait on the shared [`RelayState`] for joins to land before
//! broadcasting.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use camplink_proto::codec;
use camplink_proto::event::{CampMessage, CampUser, ClientEvent, NotificationRequest, ServerEvent};
use camplink_proto::room::{ConnectionId, RoomName, TopicId};
use camplink_relay::relay::{self, RelayState};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

type Ws =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(150);

// =============================================================================
// Helpers
// =============================================================================

async fn start_relay() -> (SocketAddr, Arc<RelayState>) {
    let state = Arc::new(RelayState::new());
    let (addr, _handle) = relay::start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start relay");
    (addr, state)
}

/// Connect and read the `connected` frame carrying our id.
async fn connect(addr: SocketAddr) -> (Ws, ConnectionId) {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    match recv(&mut ws).await {
        ServerEvent::Connected(notice) => (ws, notice.socket_id),
        other => panic!("expected Connected, got {other:?}"),
    }
}

async fn emit(ws: &mut Ws, event: &ClientEvent) {
    let text = codec::encode(event).unwrap();
    ws.send(Message::text(text)).await.unwrap();
}

async fn recv(ws: &mut Ws) -> ServerEvent {
    let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
        .await
        .expect("timed out waiting for frame")
        .expect("stream ended")
        .unwrap();
    codec::decode::<ServerEvent>(&msg.into_data()).unwrap()
}

async fn assert_silent(ws: &mut Ws) {
    let result = tokio::time::timeout(QUIET_PERIOD, ws.next()).await;
    assert!(result.is_err(), "unexpected frame: {result:?}");
}

/// Poll the relay until `room` has exactly `expected` members.
async fn wait_for_members(state: &RelayState, room: &RoomName, expected: usize) {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while state.members(room).len() != expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "room {room} never reached {expected} members"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn camp_message(camp: &str, text: &str, first: &str, last: &str) -> ClientEvent {
    ClientEvent::CampMessage(CampMessage {
        camp_id: TopicId::new(camp),
        message: json!(text),
        user: CampUser {
            id: json!("user-a"),
            first_name: json!(first),
            last_name: json!(last),
            role: json!("instructor"),
        },
    })
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn connected_frame_carries_unique_ids() {
    let (addr, state) = start_relay().await;
    let (_ws_a, a) = connect(addr).await;
    let (_ws_b, b) = connect(addr).await;
    assert_ne!(a, b);
    assert_eq!(state.connection_count(), 2);
}

#[tokio::test]
async fn camp_message_reaches_peer_not_sender() {
    let (addr, state) = start_relay().await;
    let (mut ws_a, _a) = connect(addr).await;
    let (mut ws_b, _b) = connect(addr).await;

    emit(&mut ws_a, &ClientEvent::JoinCamp(TopicId::new("42"))).await;
    emit(&mut ws_b, &ClientEvent::JoinCamp(TopicId::new("42"))).await;
    wait_for_members(&state, &RoomName::camp(&TopicId::new("42")), 2).await;

    emit(&mut ws_a, &camp_message("42", "hi", "Grace", "Hopper")).await;

    match recv(&mut ws_b).await {
        ServerEvent::NewMessage(msg) => {
            assert_eq!(msg.content, json!("hi"));
            assert_eq!(msg.sender.name, "Grace Hopper");
            assert_eq!(msg.sender.id, json!("user-a"));
            assert_eq!(msg.sender.role, json!("instructor"));
            assert!(msg.timestamp.ends_with('Z'));
            assert!(!msg.id.is_empty());
        }
        other => panic!("expected NewMessage, got {other:?}"),
    }
    assert_silent(&mut ws_a).await;
}

#[tokio::test]
async fn raw_json_frames_with_numeric_ids() {
    let (addr, state) = start_relay().await;
    let (mut ws_a, _a) = connect(addr).await;
    let (mut ws_b, _b) = connect(addr).await;

    ws_b.send(Message::text(r#"{"event":"join-camp","data":42}"#))
        .await
        .unwrap();
    wait_for_members(&state, &RoomName::camp(&TopicId::new("42")), 1).await;

    let frame = json!({
        "event": "camp-message",
        "data": {
            "campId": "42",
            "message": "numeric id works",
            "user": {"id": 7, "firstName": "Ada", "lastName": "Lovelace", "role": "parent"}
        }
    });
    ws_a.send(Message::text(frame.to_string())).await.unwrap();

    match recv(&mut ws_b).await {
        ServerEvent::NewMessage(msg) => {
            assert_eq!(msg.content, json!("numeric id works"));
            assert_eq!(msg.sender.id, json!(7));
        }
        other => panic!("expected NewMessage, got {other:?}"),
    }
}

#[tokio::test]
async fn leave_camp_stops_delivery() {
    let (addr, state) = start_relay().await;
    let room = RoomName::camp(&TopicId::new("1"));
    let (mut ws_a, _a) = connect(addr).await;
    let (mut ws_b, _b) = connect(addr).await;

    emit(&mut ws_b, &ClientEvent::JoinCamp(TopicId::new("1"))).await;
    wait_for_members(&state, &room, 1).await;
    emit(&mut ws_b, &ClientEvent::LeaveCamp(TopicId::new("1"))).await;
    wait_for_members(&state, &room, 0).await;

    emit(&mut ws_a, &camp_message("1", "gone?", "A", "B")).await;
    assert_silent(&mut ws_b).await;
}

#[tokio::test]
async fn duplicate_join_delivers_single_copy() {
    let (addr, state) = start_relay().await;
    let room = RoomName::camp(&TopicId::new("8"));
    let (mut ws_a, _a) = connect(addr).await;
    let (mut ws_b, b) = connect(addr).await;

    emit(&mut ws_b, &ClientEvent::JoinCamp(TopicId::new("8"))).await;
    emit(&mut ws_b, &ClientEvent::JoinCamp(TopicId::new("8"))).await;
    wait_for_members(&state, &room, 1).await;
    assert_eq!(state.rooms_of(b), vec![room]);

    emit(&mut ws_a, &camp_message("8", "once", "A", "B")).await;
    assert!(matches!(recv(&mut ws_b).await, ServerEvent::NewMessage(_)));
    assert_silent(&mut ws_b).await;
}

#[tokio::test]
async fn notification_goes_only_to_user_room() {
    let (addr, state) = start_relay().await;
    let (mut ws_a, _a) = connect(addr).await;
    let (mut ws_b, _b) = connect(addr).await;
    let (mut ws_c, _c) = connect(addr).await;

    emit(&mut ws_a, &ClientEvent::JoinUserRoom(TopicId::new("99"))).await;
    emit(&mut ws_c, &ClientEvent::JoinUserRoom(TopicId::new("100"))).await;
    wait_for_members(&state, &RoomName::user(&TopicId::new("99")), 1).await;
    wait_for_members(&state, &RoomName::user(&TopicId::new("100")), 1).await;

    let body = json!({"type": "schedule", "title": "Pickup moved", "meta": {"minutes": 15}});
    emit(
        &mut ws_b,
        &ClientEvent::SendNotification(NotificationRequest {
            user_id: TopicId::new("99"),
            notification: body.clone(),
        }),
    )
    .await;

    assert_eq!(recv(&mut ws_a).await, ServerEvent::Notification(body));
    assert_silent(&mut ws_b).await;
    assert_silent(&mut ws_c).await;
}

#[tokio::test]
async fn garbage_frames_do_not_disturb_the_connection() {
    let (addr, state) = start_relay().await;
    let (mut ws_a, _a) = connect(addr).await;
    let (mut ws_b, _b) = connect(addr).await;

    ws_a.send(Message::text("definitely not json")).await.unwrap();
    ws_a.send(Message::text(r#"{"event":"launch-rockets","data":1}"#))
        .await
        .unwrap();

    emit(&mut ws_b, &ClientEvent::JoinCamp(TopicId::new("3"))).await;
    wait_for_members(&state, &RoomName::camp(&TopicId::new("3")), 1).await;
    emit(&mut ws_a, &camp_message("3", "still alive", "A", "B")).await;

    assert!(matches!(recv(&mut ws_b).await, ServerEvent::NewMessage(_)));
    assert_silent(&mut ws_a).await;
}

#[tokio::test]
async fn disconnect_removes_every_membership() {
    let (addr, state) = start_relay().await;
    let (mut ws_a, a) = connect(addr).await;

    emit(&mut ws_a, &ClientEvent::JoinCamp(TopicId::new("1"))).await;
    emit(&mut ws_a, &ClientEvent::JoinSession(TopicId::new("2"))).await;
    emit(&mut ws_a, &ClientEvent::JoinUserRoom(TopicId::new("3"))).await;
    wait_for_members(&state, &RoomName::user(&TopicId::new("3")), 1).await;
    assert_eq!(state.rooms_of(a).len(), 3);

    ws_a.close(None).await.unwrap();

    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while state.connection_count() > 0 {
        assert!(tokio::time::Instant::now() < deadline, "connection never unregistered");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(state.rooms_of(a).is_empty());
    assert_eq!(state.room_count(), 0);
}
