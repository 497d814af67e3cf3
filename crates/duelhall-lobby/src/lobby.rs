//! Lobby actor: the single task that owns the [`SessionManager`].
//!
//! Connection handlers never touch lobby state directly. They send
//! [`LobbyCommand`]s through a [`LobbyHandle`], and the actor applies them
//! one at a time in arrival order. That serialization is what keeps the
//! queue, the session table, and the memberships consistent with each
//! other when many connections act at once.

use duelhall_protocol::{ConnectionId, MetricsSnapshot, SessionId};
use tokio::sync::{mpsc, oneshot};

use crate::manager::{MoveOutcome, SessionManager};
use crate::registry::Outbox;
use crate::{LobbyConfig, LobbyError};

/// Commands sent to the lobby actor through its channel.
pub(crate) enum LobbyCommand {
    /// Register a new connection. Replies once the `welcome` is queued.
    Connect {
        conn: ConnectionId,
        outbox: Outbox,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },

    RequestMatch {
        conn: ConnectionId,
    },

    SubmitMove {
        conn: ConnectionId,
        session_id: SessionId,
        cell: i64,
    },

    /// Send a `metrics` message to the connection.
    RequestMetrics {
        conn: ConnectionId,
    },

    Disconnect {
        conn: ConnectionId,
    },

    /// Posted by the actor to itself after the finish delay.
    Finish {
        session_id: SessionId,
    },

    /// Read the metrics without going through a connection.
    GetMetrics {
        reply: oneshot::Sender<MetricsSnapshot>,
    },

    Shutdown,
}

/// Handle to the running lobby actor.
///
/// Cheap to clone. Every method fails with [`LobbyError::Unavailable`]
/// once the actor has stopped.
#[derive(Clone)]
pub struct LobbyHandle {
    sender: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    async fn send(&self, cmd: LobbyCommand) -> Result<(), LobbyError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| LobbyError::Unavailable)
    }

    /// Registers a connection. Outbound messages for it go to `outbox`.
    pub async fn connect(&self, conn: ConnectionId, outbox: Outbox) -> Result<(), LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LobbyCommand::Connect {
            conn,
            outbox,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable)?
    }

    /// Asks to be paired with an opponent (fire-and-forget).
    ///
    /// The answer arrives on the connection's outbox: `waiting`,
    /// `session_started`, or an `error_notice`.
    pub async fn request_match(&self, conn: ConnectionId) -> Result<(), LobbyError> {
        self.send(LobbyCommand::RequestMatch { conn }).await
    }

    /// Submits a move (fire-and-forget). Rejections arrive as an
    /// `error_notice` on the sender's outbox.
    pub async fn submit_move(
        &self,
        conn: ConnectionId,
        session_id: SessionId,
        cell: i64,
    ) -> Result<(), LobbyError> {
        self.send(LobbyCommand::SubmitMove {
            conn,
            session_id,
            cell,
        })
        .await
    }

    /// Asks for a `metrics` message on the connection's outbox.
    pub async fn request_metrics(&self, conn: ConnectionId) -> Result<(), LobbyError> {
        self.send(LobbyCommand::RequestMetrics { conn }).await
    }

    /// Reports that a connection closed.
    pub async fn disconnect(&self, conn: ConnectionId) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Disconnect { conn }).await
    }

    /// Returns a snapshot of the counters.
    pub async fn metrics(&self) -> Result<MetricsSnapshot, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LobbyCommand::GetMetrics { reply: reply_tx })
            .await?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable)
    }

    /// Tells the actor to stop. Commands already queued behind this one
    /// are dropped.
    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.send(LobbyCommand::Shutdown).await
    }
}

struct LobbyActor {
    manager: SessionManager,
    config: LobbyConfig,
    receiver: mpsc::Receiver<LobbyCommand>,
    /// For posting `Finish` back to ourselves. Weak, so pending finishes
    /// never keep the channel open once every handle is gone.
    self_sender: mpsc::WeakSender<LobbyCommand>,
}

impl LobbyActor {
    async fn run(mut self) {
        tracing::info!(
            finish_delay_ms = self.config.finish_delay.as_millis() as u64,
            "lobby started"
        );

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                LobbyCommand::Connect {
                    conn,
                    outbox,
                    reply,
                } => {
                    let result = self.manager.connect(conn, outbox);
                    let _ = reply.send(result);
                }
                LobbyCommand::RequestMatch { conn } => {
                    if let Err(err) = self.manager.request_match(conn) {
                        self.reject(conn, &err);
                    }
                }
                LobbyCommand::SubmitMove {
                    conn,
                    session_id,
                    cell,
                } => match self.manager.submit_move(conn, &session_id, cell) {
                    Ok(MoveOutcome::InPlay) => {}
                    Ok(MoveOutcome::Finished(session_id)) => self.schedule_finish(session_id),
                    Err(err) => self.reject(conn, &err),
                },
                LobbyCommand::RequestMetrics { conn } => {
                    self.manager.send_metrics(conn);
                }
                LobbyCommand::Disconnect { conn } => {
                    self.manager.disconnect(conn);
                }
                LobbyCommand::Finish { session_id } => {
                    self.manager.finish_session(&session_id);
                }
                LobbyCommand::GetMetrics { reply } => {
                    let _ = reply.send(self.manager.metrics());
                }
                LobbyCommand::Shutdown => {
                    tracing::info!("lobby shutting down");
                    break;
                }
            }
        }

        tracing::info!("lobby stopped");
    }

    fn reject(&self, conn: ConnectionId, err: &LobbyError) {
        tracing::debug!(%conn, kind = %err.kind(), %err, "request rejected");
        self.manager.notify_error(conn, err);
    }

    /// Arranges for `session_ended` after the configured delay.
    ///
    /// The session stays in the table until then, so a move arriving in
    /// between is rejected by the board rather than reported as unknown.
    fn schedule_finish(&mut self, session_id: SessionId) {
        let delay = self.config.finish_delay;
        if delay.is_zero() {
            self.manager.finish_session(&session_id);
            return;
        }

        let weak = self.self_sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Gone means every handle was dropped and nobody is left to notify.
            if let Some(sender) = weak.upgrade() {
                let _ = sender.send(LobbyCommand::Finish { session_id }).await;
            }
        });
    }
}

/// Spawns the lobby actor and returns a handle to it.
///
/// The command channel holds `config.channel_size` entries; callers wait
/// when it is full.
pub fn spawn_lobby(config: LobbyConfig) -> LobbyHandle {
    let (tx, rx) = mpsc::channel(config.channel_size);

    let actor = LobbyActor {
        manager: SessionManager::new(),
        self_sender: tx.downgrade(),
        config,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    LobbyHandle { sender: tx }
}
