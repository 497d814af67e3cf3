//! Session lifecycle for duelhall.
//!
//! Connections queue for an opponent, get paired first-come first-served,
//! play one game of tic-tac-toe, and are cleaned up when the game ends or
//! someone leaves. All of it runs inside a single actor task so events are
//! applied strictly one after another.
//!
//! # Key types
//!
//! - [`spawn_lobby`] / [`LobbyHandle`] — start the actor and talk to it
//! - [`SessionManager`] — the state the actor owns and the rules it applies
//! - [`Session`] — one game's state machine
//! - [`MatchQueue`] — FIFO of connections waiting for an opponent
//! - [`ConnectionRegistry`] — outboxes, labels, and session memberships
//! - [`Metrics`] — connection and session counters
//! - [`LobbyConfig`] — finish delay and channel size

mod board;
mod config;
mod error;
mod lobby;
mod manager;
mod metrics;
mod queue;
mod registry;
mod session;

pub use board::{Board, WINNING_LINES};
pub use config::LobbyConfig;
pub use error::LobbyError;
pub use lobby::{LobbyHandle, spawn_lobby};
pub use manager::{MoveOutcome, SessionManager};
pub use metrics::Metrics;
pub use queue::{MatchOutcome, MatchQueue};
pub use registry::{ClientEntry, ConnectionRegistry, Membership, Outbox};
pub use session::{Session, generate_session_id};
