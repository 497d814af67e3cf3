//! Session state machine: one two-player game from first move to result.
//!
//! ```text
//!   InPlay ──(winning move)──→ Won
//!     │  ↺ (legal move, turn flips)
//!     └────(ninth move)──────→ Drawn
//! ```
//!
//! Once won or drawn, every further move is rejected.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use duelhall_protocol::{CELL_COUNT, ConnectionId, GameState, Role, SessionId};
use rand::Rng;

use crate::LobbyError;
use crate::board::Board;

/// One game between two connections.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    board: Board,
    /// Connection bound to each role, indexed by [`Role::index`].
    players: [ConnectionId; 2],
    active: Role,
    winner: Option<Role>,
    draw: bool,
    move_count: u32,
    created_at: Instant,
    /// How long the game took, set when it turns terminal.
    played_for: Option<Duration>,
}

impl Session {
    /// Starts a session. `first` plays `X` and moves first.
    pub fn new(id: SessionId, first: ConnectionId, second: ConnectionId) -> Self {
        Self {
            id,
            board: Board::new(),
            players: [first, second],
            active: Role::X,
            winner: None,
            draw: false,
            move_count: 0,
            created_at: Instant::now(),
            played_for: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The connection playing `role`.
    pub fn connection(&self, role: Role) -> ConnectionId {
        self.players[role.index()]
    }

    /// Both participants, `X` first.
    pub fn connections(&self) -> [ConnectionId; 2] {
        self.players
    }

    pub fn active_role(&self) -> Role {
        self.active
    }

    pub fn winner(&self) -> Option<Role> {
        self.winner
    }

    pub fn is_draw(&self) -> bool {
        self.draw
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    /// Returns `true` once the game is won or drawn.
    pub fn is_terminal(&self) -> bool {
        self.winner.is_some() || self.draw
    }

    /// Time from creation to the terminal move. `None` while in play.
    pub fn played_for(&self) -> Option<Duration> {
        self.played_for
    }

    /// Applies `role`'s move on `cell` and returns the resulting state.
    ///
    /// # Errors
    /// - [`LobbyError::IllegalMove`] — session over, cell out of range, or
    ///   cell occupied
    /// - [`LobbyError::NotYourTurn`] — `role` is not the active role
    ///
    /// A rejected move leaves the session untouched.
    pub fn submit_move(&mut self, role: Role, cell: i64) -> Result<GameState, LobbyError> {
        if self.is_terminal() {
            return Err(LobbyError::IllegalMove("the game is already over".into()));
        }
        if role != self.active {
            return Err(LobbyError::NotYourTurn);
        }
        let Some(cell) = usize::try_from(cell).ok().filter(|&c| c < CELL_COUNT) else {
            return Err(LobbyError::IllegalMove(format!(
                "cell must be 0-{}, got {cell}",
                CELL_COUNT - 1
            )));
        };
        if !self.board.is_free(cell) {
            return Err(LobbyError::IllegalMove(format!("cell {cell} is occupied")));
        }

        self.board.place(cell, role);
        self.move_count += 1;

        if let Some(winner) = self.board.winner() {
            self.winner = Some(winner);
        } else if self.board.is_full() {
            self.draw = true;
        }

        if self.is_terminal() {
            self.played_for = Some(self.created_at.elapsed());
        } else {
            self.active = self.active.other();
        }

        Ok(self.snapshot())
    }

    /// Current board and turn state.
    pub fn snapshot(&self) -> GameState {
        GameState {
            board: self.board.cells(),
            active_role: self.active,
            winner: self.winner,
            draw: self.draw,
            move_count: self.move_count,
        }
    }
}

/// Generates a fresh session id: hex milliseconds since the epoch, then
/// 64 random bits.
///
/// The time part keeps ids from colliding across restarts; the random part
/// makes them unguessable.
pub fn generate_session_id() -> SessionId {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let random: u64 = rand::rng().random();
    SessionId(format!("{millis:x}-{random:016x}"))
}
