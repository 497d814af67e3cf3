//! Integration tests for the duelhall server, handler, and full connection flow.

use std::time::Duration;

use duelhall::http::HealthReport;
use duelhall::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestServer {
    addr: String,
    http_addr: String,
    lobby: LobbyHandle,
}

/// Starts a server on random ports. `session_ended` follows the final
/// move immediately.
async fn start_server() -> TestServer {
    let server = DuelhallServer::builder()
        .bind("127.0.0.1:0")
        .http_bind("127.0.0.1:0")
        .lobby_config(LobbyConfig {
            finish_delay: Duration::ZERO,
            ..LobbyConfig::default()
        })
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let http_addr = server.http_addr().expect("http enabled").to_string();
    let lobby = server.lobby();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    TestServer {
        addr,
        http_addr,
        lobby,
    }
}

/// Connects and consumes the `welcome`. Returns the socket and its label.
async fn connect(addr: &str) -> (ClientWs, String) {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    match recv(&mut ws).await {
        ServerMessage::Welcome {
            connection_label, ..
        } => (ws, connection_label),
        other => panic!("expected Welcome, got {other:?}"),
    }
}

async fn send(ws: &mut ClientWs, msg: &ClientMessage) {
    let text = serde_json::to_string(msg).expect("encode");
    ws.send(Message::Text(text.into())).await.expect("send");
}

async fn recv(ws: &mut ClientWs) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for server message")
            .expect("stream ended")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("decode");
        }
    }
}

/// Pairs two fresh clients. Returns (x, o, session id).
async fn start_game(addr: &str) -> (ClientWs, ClientWs, SessionId) {
    let (mut first, first_label) = connect(addr).await;
    let (mut second, second_label) = connect(addr).await;

    send(&mut first, &ClientMessage::RequestMatch).await;
    assert!(matches!(recv(&mut first).await, ServerMessage::Waiting { .. }));
    send(&mut second, &ClientMessage::RequestMatch).await;

    let session_id = match recv(&mut second).await {
        ServerMessage::SessionStarted {
            session_id,
            role,
            opponent_label,
            state,
        } => {
            assert_eq!(role, Role::X);
            assert_eq!(opponent_label, first_label);
            assert_eq!(state.move_count, 0);
            session_id
        }
        other => panic!("expected SessionStarted, got {other:?}"),
    };
    match recv(&mut first).await {
        ServerMessage::SessionStarted {
            session_id: sid,
            role,
            opponent_label,
            ..
        } => {
            assert_eq!(sid, session_id);
            assert_eq!(role, Role::O);
            assert_eq!(opponent_label, second_label);
        }
        other => panic!("expected SessionStarted, got {other:?}"),
    }
    (second, first, session_id)
}

/// Plays `cells` alternately starting with X and checks both players see
/// every update.
async fn play(x: &mut ClientWs, o: &mut ClientWs, sid: &SessionId, cells: &[i64]) -> GameState {
    let mut last = None;
    for (i, &cell) in cells.iter().enumerate() {
        let mover = if i % 2 == 0 { &mut *x } else { &mut *o };
        send(
            mover,
            &ClientMessage::SubmitMove {
                session_id: sid.clone(),
                cell,
            },
        )
        .await;
        for ws in [&mut *x, &mut *o] {
            match recv(ws).await {
                ServerMessage::StateUpdated { state, .. } => {
                    assert_eq!(state.board[cell as usize], Some(if i % 2 == 0 { Role::X } else { Role::O }));
                    last = Some(state);
                }
                other => panic!("expected StateUpdated, got {other:?}"),
            }
        }
    }
    last.expect("at least one move")
}

/// `mover` plays one cell; returns the state `other` observes.
async fn play_single(
    mover: &mut ClientWs,
    other: &mut ClientWs,
    sid: &SessionId,
    cell: i64,
) -> GameState {
    send(
        mover,
        &ClientMessage::SubmitMove {
            session_id: sid.clone(),
            cell,
        },
    )
    .await;
    recv(mover).await;
    match recv(other).await {
        ServerMessage::StateUpdated { state, .. } => state,
        msg => panic!("expected StateUpdated, got {msg:?}"),
    }
}

/// Polls the lobby until `check` passes on the metrics.
async fn wait_for_metrics(lobby: &LobbyHandle, check: impl Fn(&MetricsSnapshot) -> bool) {
    for _ in 0..100 {
        let metrics = lobby.metrics().await.expect("lobby alive");
        if check(&metrics) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("metrics never reached the expected state");
}

// =========================================================================
// Full games
// =========================================================================

#[tokio::test]
async fn test_full_game_top_row_win() {
    let server = start_server().await;
    let (mut x, mut o, sid) = start_game(&server.addr).await;

    let state = play(&mut x, &mut o, &sid, &[0, 3, 1, 4, 2]).await;
    assert_eq!(state.winner, Some(Role::X));

    for ws in [&mut x, &mut o] {
        match recv(ws).await {
            ServerMessage::SessionEnded {
                session_id,
                winner,
                draw,
                move_count,
                duration_secs,
            } => {
                assert_eq!(session_id, sid);
                assert_eq!(winner, Some(Role::X));
                assert!(!draw);
                assert_eq!(move_count, 5);
                assert!(duration_secs >= 0.0);
            }
            other => panic!("expected SessionEnded, got {other:?}"),
        }
    }

    let metrics = server.lobby.metrics().await.unwrap();
    assert_eq!(metrics.sessions_created, 1);
    assert_eq!(metrics.sessions_completed, 1);
    assert_eq!(metrics.active_sessions, 0);
}

#[tokio::test]
async fn test_full_game_draw() {
    let server = start_server().await;
    let (mut x, mut o, sid) = start_game(&server.addr).await;

    let state = play(&mut x, &mut o, &sid, &[0, 1, 2, 4, 3, 5, 7, 6, 8]).await;
    assert!(state.draw);
    assert_eq!(state.winner, None);

    for ws in [&mut x, &mut o] {
        assert!(matches!(
            recv(ws).await,
            ServerMessage::SessionEnded {
                draw: true,
                winner: None,
                move_count: 9,
                ..
            }
        ));
    }
}

#[tokio::test]
async fn test_move_after_session_ended_is_not_found() {
    let server = start_server().await;
    let (mut x, mut o, sid) = start_game(&server.addr).await;
    play(&mut x, &mut o, &sid, &[0, 3, 1, 4, 2]).await;
    recv(&mut x).await; // session_ended
    recv(&mut o).await;

    send(
        &mut o,
        &ClientMessage::SubmitMove {
            session_id: sid,
            cell: 8,
        },
    )
    .await;

    assert!(matches!(
        recv(&mut o).await,
        ServerMessage::ErrorNotice {
            kind: ErrorKind::SessionNotFound,
            ..
        }
    ));
}

// =========================================================================
// Rejected input
// =========================================================================

#[tokio::test]
async fn test_occupied_cell_reports_illegal_move_to_sender_only() {
    let server = start_server().await;
    let (mut x, mut o, sid) = start_game(&server.addr).await;
    play(&mut x, &mut o, &sid, &[4]).await;

    send(
        &mut o,
        &ClientMessage::SubmitMove {
            session_id: sid.clone(),
            cell: 4,
        },
    )
    .await;
    assert!(matches!(
        recv(&mut o).await,
        ServerMessage::ErrorNotice {
            kind: ErrorKind::IllegalMove,
            ..
        }
    ));

    // The game goes on: O's legal move is the next thing X hears.
    let state = play_single(&mut o, &mut x, &sid, 0).await;
    assert_eq!(state.move_count, 2);
}

#[tokio::test]
async fn test_negative_cell_reports_illegal_move() {
    let server = start_server().await;
    let (mut x, mut o, sid) = start_game(&server.addr).await;

    send(
        &mut x,
        &ClientMessage::SubmitMove {
            session_id: sid.clone(),
            cell: -1,
        },
    )
    .await;
    assert!(matches!(
        recv(&mut x).await,
        ServerMessage::ErrorNotice {
            kind: ErrorKind::IllegalMove,
            ..
        }
    ));

    // Raw JSON too, so the wire format is what is under test.
    x.send(Message::Text(
        format!(r#"{{"type":"submit_move","session_id":"{sid}","cell":-1}}"#).into(),
    ))
    .await
    .expect("send");
    assert!(matches!(
        recv(&mut x).await,
        ServerMessage::ErrorNotice {
            kind: ErrorKind::IllegalMove,
            ..
        }
    ));

    // X still holds the turn.
    let state = play_single(&mut x, &mut o, &sid, 4).await;
    assert_eq!(state.move_count, 1);
}

#[tokio::test]
async fn test_garbage_frame_gets_bad_request_and_connection_survives() {
    let server = start_server().await;
    let (mut ws, _) = connect(&server.addr).await;

    ws.send(Message::Text("definitely not json".to_string().into()))
        .await
        .expect("send");
    assert!(matches!(
        recv(&mut ws).await,
        ServerMessage::ErrorNotice {
            kind: ErrorKind::BadRequest,
            ..
        }
    ));

    send(&mut ws, &ClientMessage::RequestMetrics).await;
    match recv(&mut ws).await {
        ServerMessage::Metrics { metrics } => assert_eq!(metrics.current_connections, 1),
        other => panic!("expected Metrics, got {other:?}"),
    }
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test]
async fn test_disconnect_mid_game_notifies_opponent() {
    let server = start_server().await;
    let (mut x, mut o, sid) = start_game(&server.addr).await;
    play(&mut x, &mut o, &sid, &[4]).await;

    x.close(None).await.expect("close");
    drop(x);

    match recv(&mut o).await {
        ServerMessage::OpponentLeft { session_id, .. } => assert_eq!(session_id, sid),
        other => panic!("expected OpponentLeft, got {other:?}"),
    }

    send(
        &mut o,
        &ClientMessage::SubmitMove {
            session_id: sid,
            cell: 0,
        },
    )
    .await;
    assert!(matches!(
        recv(&mut o).await,
        ServerMessage::ErrorNotice {
            kind: ErrorKind::SessionNotFound,
            ..
        }
    ));

    let metrics = server.lobby.metrics().await.unwrap();
    assert_eq!(metrics.active_sessions, 0);
    assert_eq!(metrics.sessions_abandoned, 1);

    // The survivor can queue again.
    send(&mut o, &ClientMessage::RequestMatch).await;
    assert!(matches!(recv(&mut o).await, ServerMessage::Waiting { .. }));
}

#[tokio::test]
async fn test_disconnect_while_waiting_leaves_queue() {
    let server = start_server().await;
    let (mut first, _) = connect(&server.addr).await;
    send(&mut first, &ClientMessage::RequestMatch).await;
    assert!(matches!(recv(&mut first).await, ServerMessage::Waiting { .. }));

    first.close(None).await.expect("close");
    drop(first);
    wait_for_metrics(&server.lobby, |m| m.current_connections == 0).await;

    // Nobody is waiting anymore, so the next requester waits too.
    let (mut second, _) = connect(&server.addr).await;
    send(&mut second, &ClientMessage::RequestMatch).await;
    assert!(matches!(recv(&mut second).await, ServerMessage::Waiting { .. }));
}

#[tokio::test]
async fn test_silent_peer_does_not_block_other_clients() {
    let server = start_server().await;

    // Opens TCP but never sends the upgrade request.
    let _silent = tokio::net::TcpStream::connect(&server.addr)
        .await
        .expect("tcp connect");

    let (mut ws, _) = tokio::time::timeout(Duration::from_secs(3), connect(&server.addr))
        .await
        .expect("second client should be accepted while the first stalls");
    send(&mut ws, &ClientMessage::RequestMatch).await;
    assert!(matches!(recv(&mut ws).await, ServerMessage::Waiting { .. }));
}

#[tokio::test]
async fn test_lobby_shutdown_closes_client_socket() {
    let server = start_server().await;
    let (mut ws, _) = connect(&server.addr).await;

    server.lobby.shutdown().await.expect("lobby alive");
    for _ in 0..100 {
        if server.lobby.metrics().await.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    send(&mut ws, &ClientMessage::RequestMatch).await;
    let next = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("server should close the socket");
    assert!(
        matches!(next, Some(Ok(Message::Close(_))) | None),
        "expected a close frame, got {next:?}"
    );
}

#[tokio::test]
async fn test_handshake_timeout_drops_silent_peer() {
    let server = DuelhallServer::builder()
        .bind("127.0.0.1:0")
        .handshake_timeout(Duration::from_millis(50))
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let mut silent = tokio::net::TcpStream::connect(addr).await.expect("tcp connect");
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(3), silent.read(&mut buf))
        .await
        .expect("server should hang up on a peer that never upgrades");
    // EOF or reset, either way the server let go.
    assert!(matches!(read, Ok(0) | Err(_)));
}

// =========================================================================
// HTTP
// =========================================================================

#[tokio::test]
async fn test_http_health_over_tcp() {
    let server = start_server().await;
    let (_ws, _) = connect(&server.addr).await;

    let mut stream = tokio::net::TcpStream::connect(&server.http_addr)
        .await
        .expect("http connect");
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .expect("write request");
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.expect("read response");
    let response = String::from_utf8(raw).expect("utf-8 response");

    assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .expect("has body");
    let report: HealthReport = serde_json::from_str(body).expect("health json");
    assert_eq!(report.status, "ok");
    assert_eq!(report.metrics.current_connections, 1);
}
