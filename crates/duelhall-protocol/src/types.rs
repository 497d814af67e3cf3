//! Wire types exchanged between clients and the duelhall server.
//!
//! Every client frame is a [`ClientMessage`] and every server frame is a
//! [`ServerMessage`]. Both are internally tagged JSON objects:
//!
//! ```text
//! { "type": "submit_move", "session_id": "18c3f...-9a1b...", "cell": 4 }
//! ```
//!
//! Connect and disconnect are not messages: the transport reports them
//! and the server turns them into lobby events.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of cells on the board (a 3×3 grid, row-major).
pub const CELL_COUNT: usize = 9;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier for a live transport connection.
///
/// Assigned by the transport when a connection is accepted and never
/// reused for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Identifier of one game session.
///
/// Session ids are handed to clients and echoed back on every move, so
/// they must not be guessable. The lobby builds them from a timestamp and
/// a random component; on the wire they are plain strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

/// One of the two turn identities in a session. Doubles as the board marker.
///
/// `X` always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    X,
    O,
}

impl Role {
    /// Both roles in turn order.
    pub const ALL: [Role; 2] = [Role::X, Role::O];

    /// Returns the role that moves after this one.
    pub fn other(self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }

    /// Index into per-role arrays (`X` = 0, `O` = 1).
    pub fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::O => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("X"),
            Self::O => f.write_str("O"),
        }
    }
}

/// Snapshot of a session's board and turn state, as broadcast to players.
///
/// `board` is row-major; `null` marks an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub board: [Option<Role>; CELL_COUNT],
    pub active_role: Role,
    pub winner: Option<Role>,
    pub draw: bool,
    pub move_count: u32,
}

impl GameState {
    /// Returns `true` once the game has a winner or is drawn.
    pub fn is_terminal(&self) -> bool {
        self.winner.is_some() || self.draw
    }
}

/// Point-in-time view of the server's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Connections accepted since the process started.
    pub total_connections: u64,
    /// Connections open right now.
    pub current_connections: u64,
    /// Highest value `current_connections` has reached.
    pub peak_connections: u64,
    /// Sessions created since the process started.
    pub sessions_created: u64,
    /// Sessions still being played.
    pub active_sessions: u64,
    /// Sessions that ended with a winner or a draw.
    pub sessions_completed: u64,
    /// Sessions that ended because a participant disconnected.
    pub sessions_abandoned: u64,
    /// Mean duration of completed sessions, in seconds.
    pub average_session_secs: f64,
}

// ---------------------------------------------------------------------------
// Errors on the wire
// ---------------------------------------------------------------------------

/// Category of an `error_notice` sent to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Occupied cell, out-of-range index, or finished session.
    IllegalMove,
    /// The sender's role is not the active role.
    NotYourTurn,
    /// Unknown or already cleaned-up session.
    SessionNotFound,
    /// Matchmaking request that conflicts with the connection's state.
    QueueStateError,
    /// The frame could not be decoded.
    BadRequest,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IllegalMove => "illegal_move",
            Self::NotYourTurn => "not_your_turn",
            Self::SessionNotFound => "session_not_found",
            Self::QueueStateError => "queue_state_error",
            Self::BadRequest => "bad_request",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Client → server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask to be paired with the next waiting client.
    RequestMatch,

    /// Place the sender's marker on `cell` (0–8, row-major).
    ///
    /// Signed so that any integer reaches the board check; out-of-range
    /// values come back as `illegal_move`, not `bad_request`.
    SubmitMove { session_id: SessionId, cell: i64 },

    /// Ask for the current metrics snapshot.
    RequestMetrics,
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame on every connection.
    Welcome {
        connection_label: String,
        metrics: MetricsSnapshot,
    },

    /// No opponent yet; the client sits in the queue.
    Waiting { message: String },

    /// A session was created. Sent to each participant with its own role.
    SessionStarted {
        session_id: SessionId,
        role: Role,
        opponent_label: String,
        state: GameState,
    },

    /// A move was accepted. Sent to both participants.
    StateUpdated {
        session_id: SessionId,
        state: GameState,
    },

    /// The session reached a winner or a draw. Sent to both participants.
    SessionEnded {
        session_id: SessionId,
        winner: Option<Role>,
        draw: bool,
        move_count: u32,
        duration_secs: f64,
    },

    /// The other participant disconnected; the receiver wins.
    OpponentLeft {
        session_id: SessionId,
        message: String,
    },

    /// A request from this client was rejected.
    ErrorNotice { kind: ErrorKind, message: String },

    /// Reply to `request_metrics`.
    Metrics { metrics: MetricsSnapshot },
}
