//! Connection registry: who is connected, how to reach them, and which
//! session (if any) they are playing in.

use std::collections::HashMap;

use duelhall_protocol::{ConnectionId, Role, ServerMessage, SessionId};
use tokio::sync::mpsc;

use crate::LobbyError;

/// Channel sender for delivering outbound messages to one connection.
///
/// The connection's writer task owns the receiving half. Sending never
/// blocks, and sending to a closed connection is a silent no-op.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// A connection's seat in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub session_id: SessionId,
    pub role: Role,
}

/// Everything the lobby knows about one connection.
#[derive(Debug)]
pub struct ClientEntry {
    /// Name shown to the opponent.
    pub label: String,
    pub outbox: Outbox,
    /// At most one session at a time.
    pub membership: Option<Membership>,
}

/// Maps each live connection to its [`ClientEntry`].
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    clients: HashMap<ConnectionId, ClientEntry>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly connected client and returns its label.
    ///
    /// # Errors
    /// Returns [`LobbyError::QueueState`] if `conn` is already registered.
    pub fn register(&mut self, conn: ConnectionId, outbox: Outbox) -> Result<String, LobbyError> {
        if self.clients.contains_key(&conn) {
            return Err(LobbyError::QueueState(format!("{conn} is already connected")));
        }
        let label = format!("guest-{}", conn.into_inner());
        self.clients.insert(
            conn,
            ClientEntry {
                label: label.clone(),
                outbox,
                membership: None,
            },
        );
        Ok(label)
    }

    /// Forgets a connection and returns what was known about it.
    pub fn unregister(&mut self, conn: ConnectionId) -> Option<ClientEntry> {
        self.clients.remove(&conn)
    }

    /// Returns `true` if `conn` is registered.
    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.clients.contains_key(&conn)
    }

    /// The label of `conn`, if registered.
    pub fn label(&self, conn: ConnectionId) -> Option<&str> {
        self.clients.get(&conn).map(|c| c.label.as_str())
    }

    /// The session seat of `conn`, if any.
    pub fn membership(&self, conn: ConnectionId) -> Option<&Membership> {
        self.clients.get(&conn)?.membership.as_ref()
    }

    /// Seats `conn` in a session.
    ///
    /// # Errors
    /// Returns [`LobbyError::QueueState`] if `conn` is unknown or already
    /// holds a membership.
    pub fn bind(&mut self, conn: ConnectionId, membership: Membership) -> Result<(), LobbyError> {
        let entry = self
            .clients
            .get_mut(&conn)
            .ok_or_else(|| LobbyError::QueueState(format!("{conn} is not connected")))?;
        if let Some(existing) = &entry.membership {
            return Err(LobbyError::QueueState(format!(
                "{conn} is already in session {}",
                existing.session_id
            )));
        }
        entry.membership = Some(membership);
        Ok(())
    }

    /// Clears `conn`'s membership if it points at `session_id`.
    ///
    /// Returns whether a membership was removed. A membership for another
    /// session is left alone.
    pub fn unbind(&mut self, conn: ConnectionId, session_id: &SessionId) -> bool {
        match self.clients.get_mut(&conn) {
            Some(entry) if entry.membership.as_ref().map(|m| &m.session_id) == Some(session_id) => {
                entry.membership = None;
                true
            }
            _ => false,
        }
    }

    /// Queues `msg` for `conn`. Unknown or closed connections are ignored.
    pub fn deliver(&self, conn: ConnectionId, msg: ServerMessage) {
        if let Some(entry) = self.clients.get(&conn) {
            let _ = entry.outbox.send(msg);
        }
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
