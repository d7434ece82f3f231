//! End-to-end tests: a real server on a random port, driven over
//! WebSocket by raw envelopes and by the remote client.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use turnstile::prelude::*;
use turnstile_client::{Adoption, PollOutcome};
use turnstile_protocol::{Envelope, Payload, Request, Response};

// =========================================================================
// Helpers
// =========================================================================

type ClientWs =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(2);

/// Starts a server on a random port and returns its address.
async fn start_server() -> String {
    start_server_with(TurnstileServerBuilder::new()).await
}

async fn start_server_with(builder: TurnstileServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .build(TokenAuth::new())
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect_raw(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn connect(addr: &str, token: &str) -> RemoteApi {
    RemoteApi::connect(&format!("ws://{addr}"), Some(token.to_string()), TIMEOUT)
        .await
        .expect("should connect and authenticate")
}

async fn send_request(ws: &mut ClientWs, seq: u64, request: Request) {
    let envelope = Envelope::request(seq, 0, request);
    let bytes = serde_json::to_vec(&envelope).expect("encode");
    ws.send(Message::Binary(bytes.into())).await.expect("send");
}

async fn recv_response(ws: &mut ClientWs) -> (Option<u64>, Response) {
    let msg = ws.next().await.expect("stream open").expect("recv");
    let envelope: Envelope = serde_json::from_slice(&msg.into_data()).expect("decode");
    match envelope.payload {
        Payload::Response(response) => (envelope.reply_to, response),
        other => panic!("expected a response, got {other:?}"),
    }
}

async fn hello(ws: &mut ClientWs, token: Option<&str>) -> Response {
    let request = Request::Hello {
        version: PROTOCOL_VERSION,
        token: token.map(str::to_string),
    };
    send_request(ws, 1, request).await;
    recv_response(ws).await.1
}

fn test_config() -> ClientConfig {
    ClientConfig {
        animation_delay: Duration::ZERO,
        request_timeout: TIMEOUT,
        ..ClientConfig::default()
    }
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_hello_welcome() {
    let addr = start_server().await;
    let mut ws = connect_raw(&addr).await;

    let request = Request::Hello {
        version: PROTOCOL_VERSION,
        token: Some("alice".into()),
    };
    send_request(&mut ws, 7, request).await;
    let (reply_to, response) = recv_response(&mut ws).await;

    assert_eq!(reply_to, Some(7));
    assert!(matches!(response, Response::Welcome { player_id: PlayerId(1), .. }));
}

#[tokio::test]
async fn test_hello_version_mismatch() {
    let addr = start_server().await;
    let mut ws = connect_raw(&addr).await;

    let request = Request::Hello {
        version: 999,
        token: Some("alice".into()),
    };
    send_request(&mut ws, 1, request).await;

    match recv_response(&mut ws).await.1 {
        Response::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected Error 400, got {other:?}"),
    }
}

#[tokio::test]
async fn test_hello_missing_token_unauthorized() {
    let addr = start_server().await;
    let mut ws = connect_raw(&addr).await;

    match hello(&mut ws, None).await {
        Response::Error { code, .. } => assert_eq!(code, 401),
        other => panic!("expected Error 401, got {other:?}"),
    }
}

#[tokio::test]
async fn test_first_request_must_be_hello() {
    let addr = start_server().await;
    let mut ws = connect_raw(&addr).await;

    send_request(&mut ws, 1, Request::ListSessions).await;

    match recv_response(&mut ws).await.1 {
        Response::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected Error 400, got {other:?}"),
    }
}

#[tokio::test]
async fn test_heartbeat_response() {
    let addr = start_server().await;
    let mut ws = connect_raw(&addr).await;
    hello(&mut ws, Some("alice")).await;

    send_request(&mut ws, 2, Request::Heartbeat { client_time: 12345 }).await;

    match recv_response(&mut ws).await {
        (Some(2), Response::HeartbeatAck { client_time, .. }) => assert_eq!(client_time, 12345),
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let builder = TurnstileServerBuilder::new().idle_timeout(Duration::from_millis(200));
    let addr = start_server_with(builder).await;
    let mut ws = connect_raw(&addr).await;
    hello(&mut ws, Some("alice")).await;

    let next = tokio::time::timeout(Duration::from_secs(3), ws.next())
        .await
        .expect("server should close the idle connection");
    assert!(
        matches!(next, None | Some(Err(_)) | Some(Ok(Message::Close(_)))),
        "unexpected frame: {next:?}"
    );
}

// =========================================================================
// Lobby
// =========================================================================

#[tokio::test]
async fn test_create_join_start_over_the_wire() {
    let addr = start_server().await;
    let alice = connect(&addr, "alice").await;
    let bob = connect(&addr, "bob").await;

    let created = alice.create_session("Alice", "car").await.unwrap();
    assert_eq!(created.status, SessionStatus::Pending);
    assert_eq!(created.players.len(), 1);

    let lowercase = JoinCode::new(created.code.as_str().to_lowercase());
    let joined = bob.join_session(&lowercase, "Bob", "hat").await.unwrap();
    assert_eq!(joined.players.len(), 2);

    let listed = bob.list_sessions().await.unwrap();
    assert!(listed.iter().any(|s| s.session_id == created.id && s.player_count == 2));

    let running = alice.start_session(created.id).await.unwrap();
    assert_eq!(running.status, SessionStatus::Running);
    assert_eq!(running.next_player_id, Some(alice.player_id()));

    let listed = bob.list_sessions().await.unwrap();
    assert!(listed.iter().all(|s| s.session_id != created.id));
}

#[tokio::test]
async fn test_unknown_code_is_404() {
    let addr = start_server().await;
    let alice = connect(&addr, "alice").await;

    let err = alice
        .get_session_by_code(&JoinCode::new("ZZZZZZ"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Server { code: 404, .. }));
}

#[tokio::test]
async fn test_second_session_is_conflict() {
    let addr = start_server().await;
    let alice = connect(&addr, "alice").await;

    alice.create_session("Alice", "car").await.unwrap();
    let err = alice.create_session("Alice", "car").await.unwrap_err();
    assert!(matches!(err, ClientError::Server { code: 409, .. }));
}

#[tokio::test]
async fn test_reconnect_keeps_seat() {
    let addr = start_server().await;
    let alice = connect(&addr, "alice").await;
    let first_id = alice.player_id();
    let created = alice.create_session("Alice", "car").await.unwrap();
    alice.close("brb").await.unwrap();

    let alice = connect(&addr, "alice").await;
    assert_eq!(alice.player_id(), first_id);

    let session = alice.get_session_by_code(&created.code).await.unwrap();
    assert!(session.contains(first_id));

    let left = alice.leave_session(created.id).await.unwrap();
    assert!(left.players.is_empty());
}

#[tokio::test]
async fn test_finished_game_frees_winner() {
    let addr = start_server().await;
    let alice = connect(&addr, "alice").await;
    let bob = connect(&addr, "bob").await;

    let created = alice.create_session("Alice", "car").await.unwrap();
    bob.join_session(&created.code, "Bob", "hat").await.unwrap();
    alice.start_session(created.id).await.unwrap();

    let after = bob.leave_session(created.id).await.unwrap();
    assert_eq!(after.status, SessionStatus::Finished);
    assert_eq!(after.winner_id, Some(alice.player_id()));

    let err = alice.get_session_by_code(&created.code).await.unwrap_err();
    assert!(matches!(err, ClientError::Server { code: 404, .. }));
    assert!(alice.create_session("Alice", "car").await.is_ok());
}

#[tokio::test]
async fn test_refused_join_leaves_player_free() {
    let addr = start_server().await;
    let alice = connect(&addr, "alice").await;
    let bob = connect(&addr, "bob").await;
    let carol = connect(&addr, "carol").await;

    let created = alice.create_session("Alice", "car").await.unwrap();
    bob.join_session(&created.code, "Bob", "hat").await.unwrap();
    alice.start_session(created.id).await.unwrap();

    let err = carol.join_session(&created.code, "Carol", "dog").await.unwrap_err();
    assert!(matches!(err, ClientError::Server { code: 409, .. }));
    assert!(carol.create_session("Carol", "dog").await.is_ok());
}

#[tokio::test]
async fn test_heartbeat_round_trip() {
    let addr = start_server().await;
    let alice = connect(&addr, "alice").await;
    let rtt = alice.heartbeat().await.unwrap();
    assert!(rtt < TIMEOUT);
}

// =========================================================================
// Turns
// =========================================================================

#[tokio::test]
async fn test_out_of_turn_commit_rejected_in_band() {
    let addr = start_server().await;
    let alice = connect(&addr, "alice").await;
    let bob = connect(&addr, "bob").await;

    let created = alice.create_session("Alice", "car").await.unwrap();
    bob.join_session(&created.code, "Bob", "hat").await.unwrap();
    alice.start_session(created.id).await.unwrap();

    let reply = bob
        .commit_position(bob.player_id(), created.id, 7, 7)
        .await
        .unwrap();
    assert!(!reply.success);
    assert!(reply.message.unwrap().contains("not your turn"));
    assert!(reply.session.is_none());

    let session = bob.get_session_by_code(&created.code).await.unwrap();
    assert_eq!(session.player(bob.player_id()).unwrap().position, 0);
}

#[tokio::test]
async fn test_bad_total_rejected_in_band() {
    let addr = start_server().await;
    let alice = connect(&addr, "alice").await;
    let bob = connect(&addr, "bob").await;

    let created = alice.create_session("Alice", "car").await.unwrap();
    bob.join_session(&created.code, "Bob", "hat").await.unwrap();
    alice.start_session(created.id).await.unwrap();

    let reply = alice
        .commit_position(alice.player_id(), created.id, 12, 12)
        .await
        .unwrap();
    assert!(!reply.success);
}

#[tokio::test]
async fn test_two_players_take_turns() {
    let addr = start_server().await;
    let alice = connect(&addr, "alice").await;
    let bob = connect(&addr, "bob").await;
    let (alice_id, bob_id) = (alice.player_id(), bob.player_id());

    let created = alice.create_session("Alice", "car").await.unwrap();
    bob.join_session(&created.code, "Bob", "hat").await.unwrap();
    alice.start_session(created.id).await.unwrap();

    let a = TurnClient::join(alice, TracingNotifier, alice_id, created.code.clone(), test_config())
        .await
        .unwrap()
        .with_dice(Dice::scripted(&[(3, 4)]).unwrap());
    let b = TurnClient::join(bob, TracingNotifier, bob_id, created.code.clone(), test_config())
        .await
        .unwrap()
        .with_dice(Dice::scripted(&[(5, 5)]).unwrap());

    // Bob can't go first.
    assert!(matches!(b.roll().await, Err(ClientError::Ineligible(_))));

    match a.roll().await.unwrap() {
        RollReport::Moved {
            movement,
            landed_on,
            ..
        } => {
            assert_eq!(movement.to, 7);
            assert_eq!(landed_on.label(), "Chance");
        }
        other => panic!("expected a move, got {other:?}"),
    }
    let after = a.end_turn().await.unwrap();
    assert_eq!(after.next_player_id, Some(bob_id));

    // Bob learns about Alice's move by polling.
    let polled = b.poll_once().await.unwrap();
    assert_eq!(polled, PollOutcome::Fetched(Adoption::Replaced));
    assert_eq!(b.snapshot().await.player(alice_id).unwrap().position, 7);

    match b.roll().await.unwrap() {
        RollReport::Moved { movement, .. } => assert_eq!(movement.to, 10),
        other => panic!("expected a move, got {other:?}"),
    }
    assert!(matches!(b.roll().await, Err(ClientError::Ineligible(_))));

    let after = b.end_turn().await.unwrap();
    assert_eq!(after.next_player_id, Some(alice_id));
    assert_eq!(after.history.len(), 5);

    let a_view = a.poll_once().await.unwrap();
    assert_eq!(a_view, PollOutcome::Fetched(Adoption::Replaced));
    assert_eq!(a.exit(), b.exit());
}

#[tokio::test]
async fn test_local_api_shares_server_authority() {
    let server = TurnstileServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(TokenAuth::new())
        .await
        .unwrap();
    let local = server.local_api();
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let alice = connect(&addr, "alice").await;
    let created = alice.create_session("Alice", "car").await.unwrap();

    let seen = local.get_session_by_code(&created.code).await.unwrap();
    assert_eq!(seen, created);
}
