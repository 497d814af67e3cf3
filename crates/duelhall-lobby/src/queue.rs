//! FIFO matchmaking queue.

use std::collections::{HashSet, VecDeque};

use duelhall_protocol::ConnectionId;

use crate::LobbyError;

/// Result of a match request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Nobody was waiting; the requester is now at the back of the queue.
    Waiting,
    /// The requester was paired with the longest-waiting connection.
    /// The requester comes first and therefore moves first.
    Paired(ConnectionId, ConnectionId),
}

/// Connections waiting for an opponent, oldest first.
///
/// A connection appears at most once. `waiting` is the order; `members`
/// is the index that enforces uniqueness and is kept in sync with it.
#[derive(Debug, Default)]
pub struct MatchQueue {
    waiting: VecDeque<ConnectionId>,
    members: HashSet<ConnectionId>,
}

impl MatchQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs `conn` with the head of the queue, or enqueues it.
    ///
    /// # Errors
    /// Returns [`LobbyError::QueueState`] if `conn` is already waiting.
    /// The queue is unchanged in that case.
    pub fn request_match(&mut self, conn: ConnectionId) -> Result<MatchOutcome, LobbyError> {
        if self.members.contains(&conn) {
            return Err(LobbyError::QueueState(format!(
                "{conn} is already waiting for an opponent"
            )));
        }

        match self.waiting.pop_front() {
            Some(head) => {
                self.members.remove(&head);
                Ok(MatchOutcome::Paired(conn, head))
            }
            None => {
                self.waiting.push_back(conn);
                self.members.insert(conn);
                Ok(MatchOutcome::Waiting)
            }
        }
    }

    /// Removes `conn` if it is waiting. Returns whether it was.
    pub fn remove_if_waiting(&mut self, conn: ConnectionId) -> bool {
        if !self.members.remove(&conn) {
            return false;
        }
        self.waiting.retain(|c| *c != conn);
        true
    }

    /// Returns `true` if `conn` is waiting.
    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.members.contains(&conn)
    }

    /// Number of waiting connections.
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    /// Returns `true` if nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}
