//! # Duelhall
//!
//! Matchmaking and session server for two-player, turn-based games.
//!
//! Clients connect over WebSocket, ask for a match, and are paired
//! first-come first-served into a game of tic-tac-toe. The server owns the
//! board: it validates every move, broadcasts each new state to both
//! players, announces the result, and cleans up when a player leaves.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duelhall::prelude::*;
//!
//! # async fn start() -> Result<(), DuelhallError> {
//! let server = DuelhallServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .http_bind("0.0.0.0:8081")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
pub mod http;
mod server;

pub use error::DuelhallError;
pub use server::{DEFAULT_HANDSHAKE_TIMEOUT, DuelhallServer, DuelhallServerBuilder};

/// Everything needed to start a server and talk its protocol.
pub mod prelude {
    pub use crate::{
        DEFAULT_HANDSHAKE_TIMEOUT, DuelhallError, DuelhallServer, DuelhallServerBuilder,
    };
    pub use duelhall_lobby::{LobbyConfig, LobbyError, LobbyHandle};
    pub use duelhall_protocol::{
        ClientMessage, ConnectionId, ErrorKind, GameState, MetricsSnapshot, Role, ServerMessage,
        SessionId,
    };
}
