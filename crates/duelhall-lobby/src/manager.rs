//! The session manager: matchmaking, move routing, and cleanup.
//!
//! This is where every invariant spanning queue, sessions, and
//! memberships is enforced:
//!
//! - a connection waits in the queue at most once, and never while seated;
//! - a session is created exactly once per pair, and both seats are bound
//!   in the same step;
//! - a session leaves the table exactly once, either through
//!   [`finish_session`](SessionManager::finish_session) or through a
//!   participant's [`disconnect`](SessionManager::disconnect).
//!
//! # Concurrency note
//!
//! `SessionManager` is plain data with `&mut self` methods. It is owned by
//! the lobby actor (see [`crate::spawn_lobby`]), which feeds it one event at
//! a time; nothing else holds a reference to it.

use std::collections::HashMap;

use duelhall_protocol::{ConnectionId, MetricsSnapshot, Role, ServerMessage, SessionId};

use crate::metrics::Metrics;
use crate::queue::{MatchOutcome, MatchQueue};
use crate::registry::{ConnectionRegistry, Membership, Outbox};
use crate::session::{Session, generate_session_id};
use crate::LobbyError;

const WAITING_MESSAGE: &str = "Waiting for an opponent...";
const OPPONENT_LEFT_MESSAGE: &str = "Your opponent left the game. You win!";

/// What an accepted move did to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The game goes on.
    InPlay,
    /// The move ended the game. The caller must eventually pass the id to
    /// [`SessionManager::finish_session`].
    Finished(SessionId),
}

/// Owns the matchmaking queue, the session table, the connection registry,
/// and the metrics.
#[derive(Debug, Default)]
pub struct SessionManager {
    queue: MatchQueue,
    sessions: HashMap<SessionId, Session>,
    registry: ConnectionRegistry,
    metrics: Metrics,
}

impl SessionManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and sends it a `welcome`.
    ///
    /// # Errors
    /// Returns [`LobbyError::QueueState`] if the id is already registered.
    pub fn connect(&mut self, conn: ConnectionId, outbox: Outbox) -> Result<(), LobbyError> {
        let label = self.registry.register(conn, outbox)?;
        self.metrics.connection_opened();
        tracing::info!(%conn, %label, "client connected");

        self.registry.deliver(
            conn,
            ServerMessage::Welcome {
                connection_label: label,
                metrics: self.metrics.snapshot(),
            },
        );
        Ok(())
    }

    /// Puts `conn` in the queue, or pairs it with the longest-waiting
    /// connection and starts a session.
    ///
    /// Returns the new session's id when a pairing happened.
    ///
    /// # Errors
    /// Returns [`LobbyError::QueueState`] if `conn` is not connected, is
    /// already waiting, or is already seated in a session.
    pub fn request_match(&mut self, conn: ConnectionId) -> Result<Option<SessionId>, LobbyError> {
        if !self.registry.contains(conn) {
            return Err(LobbyError::QueueState(format!("{conn} is not connected")));
        }
        if let Some(seat) = self.registry.membership(conn) {
            return Err(LobbyError::QueueState(format!(
                "already playing in session {}",
                seat.session_id
            )));
        }

        match self.queue.request_match(conn)? {
            MatchOutcome::Waiting => {
                tracing::info!(%conn, waiting = self.queue.len(), "client waiting for opponent");
                self.registry.deliver(
                    conn,
                    ServerMessage::Waiting {
                        message: WAITING_MESSAGE.to_string(),
                    },
                );
                Ok(None)
            }
            MatchOutcome::Paired(first, second) => self.on_match_found(first, second).map(Some),
        }
    }

    /// Creates a session for a matched pair. `first` plays `X`.
    fn on_match_found(
        &mut self,
        first: ConnectionId,
        second: ConnectionId,
    ) -> Result<SessionId, LobbyError> {
        // Check both seats before touching either, so a failure binds nothing.
        for conn in [first, second] {
            if !self.registry.contains(conn) || self.registry.membership(conn).is_some() {
                tracing::warn!(%conn, "matched connection cannot be seated");
                return Err(LobbyError::QueueState(format!("{conn} cannot be seated")));
            }
        }

        let session_id = generate_session_id();
        let session = Session::new(session_id.clone(), first, second);
        for role in Role::ALL {
            self.registry.bind(
                session.connection(role),
                Membership {
                    session_id: session_id.clone(),
                    role,
                },
            )?;
        }
        self.metrics.session_started();

        let state = session.snapshot();
        for role in Role::ALL {
            let conn = session.connection(role);
            let opponent_label = self
                .registry
                .label(session.connection(role.other()))
                .unwrap_or_default()
                .to_string();
            self.registry.deliver(
                conn,
                ServerMessage::SessionStarted {
                    session_id: session_id.clone(),
                    role,
                    opponent_label,
                    state: state.clone(),
                },
            );
        }

        tracing::info!(
            %session_id,
            x = %first,
            o = %second,
            "session started"
        );
        self.sessions.insert(session_id.clone(), session);
        Ok(session_id)
    }

    /// Applies a move from `conn` and broadcasts the new state.
    ///
    /// # Errors
    /// - [`LobbyError::SessionNotFound`] — `conn` holds no seat in a live
    ///   session called `session_id`
    /// - [`LobbyError::NotYourTurn`] — `conn`'s role is not the active role
    /// - [`LobbyError::IllegalMove`] — rejected by the board
    pub fn submit_move(
        &mut self,
        conn: ConnectionId,
        session_id: &SessionId,
        cell: i64,
    ) -> Result<MoveOutcome, LobbyError> {
        let role = self
            .registry
            .membership(conn)
            .filter(|seat| seat.session_id == *session_id)
            .map(|seat| seat.role)
            .ok_or_else(|| LobbyError::SessionNotFound(session_id.clone()))?;

        let session = self.sessions.get_mut(session_id).ok_or_else(|| {
            tracing::warn!(%conn, %session_id, "membership points at a missing session");
            LobbyError::SessionNotFound(session_id.clone())
        })?;

        if role != session.active_role() {
            return Err(LobbyError::NotYourTurn);
        }

        let state = session.submit_move(role, cell)?;
        tracing::debug!(%session_id, %role, cell, moves = state.move_count, "move accepted");

        for player in session.connections() {
            self.registry.deliver(
                player,
                ServerMessage::StateUpdated {
                    session_id: session_id.clone(),
                    state: state.clone(),
                },
            );
        }

        if !state.is_terminal() {
            return Ok(MoveOutcome::InPlay);
        }

        let duration = session.played_for().unwrap_or_default();
        self.metrics.session_completed(duration);
        tracing::info!(
            %session_id,
            winner = ?state.winner,
            draw = state.draw,
            moves = state.move_count,
            secs = duration.as_secs_f64(),
            "session reached a result"
        );
        Ok(MoveOutcome::Finished(session_id.clone()))
    }

    /// Sends `session_ended` to both participants and removes the session
    /// and their memberships.
    ///
    /// Returns `false` if the session was already gone.
    pub fn finish_session(&mut self, session_id: &SessionId) -> bool {
        let Some(session) = self.sessions.remove(session_id) else {
            return false;
        };

        let ended = ServerMessage::SessionEnded {
            session_id: session_id.clone(),
            winner: session.winner(),
            draw: session.is_draw(),
            move_count: session.move_count(),
            duration_secs: session.played_for().unwrap_or_default().as_secs_f64(),
        };
        for player in session.connections() {
            self.registry.deliver(player, ended.clone());
            self.registry.unbind(player, session_id);
        }

        tracing::info!(%session_id, "session closed");
        true
    }

    /// Cleans up after a closed connection.
    ///
    /// Removes it from the queue and the registry. If it was playing, the
    /// opponent is told they won and the session is removed at once. If
    /// the session had already reached a result, the pending
    /// `finish_session` still owns its removal.
    pub fn disconnect(&mut self, conn: ConnectionId) {
        if self.queue.remove_if_waiting(conn) {
            tracing::debug!(%conn, "removed from queue");
        }

        let Some(entry) = self.registry.unregister(conn) else {
            return;
        };
        self.metrics.connection_closed();
        tracing::info!(%conn, label = %entry.label, "client disconnected");

        let Some(seat) = entry.membership else {
            return;
        };
        let session_id = seat.session_id;

        let opponent = match self.sessions.get(&session_id) {
            Some(session) if session.is_terminal() => {
                tracing::debug!(%conn, %session_id, "left after the result; finish pending");
                return;
            }
            Some(session) => session.connection(seat.role.other()),
            None => {
                tracing::warn!(%conn, %session_id, "membership points at a missing session");
                return;
            }
        };

        self.sessions.remove(&session_id);
        self.registry.unbind(opponent, &session_id);
        self.registry.deliver(
            opponent,
            ServerMessage::OpponentLeft {
                session_id: session_id.clone(),
                message: OPPONENT_LEFT_MESSAGE.to_string(),
            },
        );
        self.metrics.session_abandoned();
        tracing::info!(%session_id, %opponent, "session abandoned");
    }

    /// Sends the current metrics to `conn`.
    pub fn send_metrics(&self, conn: ConnectionId) {
        self.registry.deliver(
            conn,
            ServerMessage::Metrics {
                metrics: self.metrics.snapshot(),
            },
        );
    }

    /// Reports a rejected request back to the connection that sent it.
    pub fn notify_error(&self, conn: ConnectionId, err: &LobbyError) {
        self.registry.deliver(
            conn,
            ServerMessage::ErrorNotice {
                kind: err.kind(),
                message: err.to_string(),
            },
        );
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Looks up a live session.
    pub fn session(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    /// The seat `conn` holds, if any.
    pub fn membership(&self, conn: ConnectionId) -> Option<&Membership> {
        self.registry.membership(conn)
    }

    /// Number of sessions in the table, including finished ones awaiting
    /// [`finish_session`](Self::finish_session).
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of connections in the queue.
    pub fn waiting_count(&self) -> usize {
        self.queue.len()
    }
}
