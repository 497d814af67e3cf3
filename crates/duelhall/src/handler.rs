//! Per-connection handler: registration, inbound routing, outbound writing.
//!
//! Each accepted socket gets its own Tokio task running this handler.
//! The flow is:
//!   1. Finish the WebSocket upgrade, bounded by the handshake timeout
//!   2. Register with the lobby → `welcome` is queued on the outbox
//!   3. Spawn a writer task that drains the outbox onto the socket
//!   4. Loop: receive frames → decode → forward to the lobby
//!   5. Close the socket; the guard reports the disconnect

use std::sync::Arc;

use duelhall_lobby::LobbyHandle;
use duelhall_protocol::{ClientMessage, Codec, ConnectionId, ErrorKind, ServerMessage};
use duelhall_transport::{
    Connection, PendingConnection, TransportError, WebSocketConnection, WebSocketHandshake,
};
use tokio::sync::mpsc;

use crate::DuelhallError;
use crate::server::ServerState;

/// Drop guard that reports the disconnect when the handler exits.
///
/// Runs even if the handler returns early with an error. `Drop` is
/// synchronous, so the send happens on a spawned task.
struct DisconnectGuard {
    conn_id: ConnectionId,
    lobby: LobbyHandle,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let lobby = self.lobby.clone();
        tokio::spawn(async move {
            let _ = lobby.disconnect(conn_id).await;
        });
    }
}

/// Handles a single socket from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    pending: WebSocketHandshake,
    state: Arc<ServerState<C>>,
) -> Result<(), DuelhallError> {
    let peer = pending.peer_addr();
    let conn = tokio::time::timeout(state.handshake_timeout, pending.upgrade())
        .await
        .map_err(|_| {
            tracing::debug!(%peer, "peer never finished the WebSocket upgrade");
            TransportError::HandshakeTimeout
        })??;

    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, %peer, "handling new connection");

    let (outbox, inbox) = mpsc::unbounded_channel();
    if let Err(e) = state.lobby.connect(conn_id, outbox.clone()).await {
        let _ = conn.close().await;
        return Err(e.into());
    }
    let _guard = DisconnectGuard {
        conn_id,
        lobby: state.lobby.clone(),
    };

    let writer = tokio::spawn(write_outbound(
        Arc::clone(&conn),
        Arc::clone(&state),
        inbox,
    ));

    let result = read_inbound(&conn, &state, &outbox).await;

    writer.abort();
    if let Err(e) = conn.close().await {
        tracing::trace!(%conn_id, error = %e, "close after handler exit");
    }
    result
    // _guard drops here → disconnect fires.
}

/// Reads frames until the peer goes away, forwarding each to the lobby.
///
/// `outbox` is only used for frames the lobby never sees (undecodable
/// input).
async fn read_inbound<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    outbox: &mpsc::UnboundedSender<ServerMessage>,
) -> Result<(), DuelhallError> {
    let conn_id = conn.id();

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Ok(());
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode client message");
                let _ = outbox.send(ServerMessage::ErrorNotice {
                    kind: ErrorKind::BadRequest,
                    message: e.to_string(),
                });
                continue;
            }
        };

        match msg {
            ClientMessage::RequestMatch => state.lobby.request_match(conn_id).await?,
            ClientMessage::SubmitMove { session_id, cell } => {
                state.lobby.submit_move(conn_id, session_id, cell).await?
            }
            ClientMessage::RequestMetrics => state.lobby.request_metrics(conn_id).await?,
        }
    }
}

/// Drains the outbox onto the socket until either side closes.
async fn write_outbound<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    mut inbox: mpsc::UnboundedReceiver<ServerMessage>,
) {
    let conn_id = conn.id();
    while let Some(msg) = inbox.recv().await {
        let bytes = match state.codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode server message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}
