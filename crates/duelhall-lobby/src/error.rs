//! Error types for the lobby.

use duelhall_protocol::{ErrorKind, SessionId};

/// Errors produced while handling a lobby event.
///
/// All of them are local to the connection that caused them: the lobby
/// reports them back as an `error_notice` and carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// Occupied cell, out-of-range index, or a session that already ended.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// The sender's role is not the role whose turn it is.
    #[error("not your turn")]
    NotYourTurn,

    /// No live session with this id belongs to the sender. Covers stale
    /// ids and sessions that were already cleaned up.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// A matchmaking request that conflicts with the connection's state,
    /// e.g. asking twice or asking while in a session.
    #[error("queue state error: {0}")]
    QueueState(String),

    /// The lobby task is gone (shut down or panicked).
    #[error("lobby is unavailable")]
    Unavailable,
}

impl LobbyError {
    /// The category reported to clients.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IllegalMove(_) => ErrorKind::IllegalMove,
            Self::NotYourTurn => ErrorKind::NotYourTurn,
            Self::SessionNotFound(_) => ErrorKind::SessionNotFound,
            Self::QueueState(_) | Self::Unavailable => ErrorKind::QueueStateError,
        }
    }
}
