//! Wire protocol for duelhall.
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`GameState`], …) —
//!   the frames that travel between browser and server.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how frames become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol crate knows nothing about sockets or sessions; the lobby
//! produces these types and the server encodes them.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    CELL_COUNT, ClientMessage, ConnectionId, ErrorKind, GameState, MetricsSnapshot, Role,
    ServerMessage, SessionId,
};
