//! `DuelhallServer` builder and server loop.
//!
//! This is the entry point for running a duelhall server. It ties the
//! layers together: transport → protocol → lobby, plus the optional HTTP
//! listener for health and metrics.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use duelhall_lobby::{LobbyConfig, LobbyHandle, spawn_lobby};
use duelhall_protocol::{Codec, JsonCodec};
use duelhall_transport::{Transport, WebSocketTransport};
use tokio::net::TcpListener;

use crate::DuelhallError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) lobby: LobbyHandle,
    pub(crate) codec: C,
    pub(crate) handshake_timeout: Duration,
}

/// Default time a peer gets to complete the WebSocket upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for configuring and starting a duelhall server.
///
/// # Example
///
/// ```rust,no_run
/// use duelhall::prelude::*;
///
/// # async fn start() -> Result<(), DuelhallError> {
/// let server = DuelhallServer::builder()
///     .bind("0.0.0.0:8080")
///     .http_bind("0.0.0.0:8081")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct DuelhallServerBuilder {
    bind_addr: String,
    http_addr: Option<String>,
    lobby_config: LobbyConfig,
    handshake_timeout: Duration,
}

impl DuelhallServerBuilder {
    /// Creates a new builder with default settings. No HTTP listener.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            http_addr: None,
            lobby_config: LobbyConfig::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the address the WebSocket listener binds to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Enables the HTTP health and metrics listener on `addr`.
    pub fn http_bind(mut self, addr: &str) -> Self {
        self.http_addr = Some(addr.to_string());
        self
    }

    /// Sets the lobby configuration.
    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.lobby_config = config;
        self
    }

    /// Sets how long a new peer has to finish the WebSocket upgrade before
    /// it is dropped.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listeners and starts the lobby actor.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<DuelhallServer<JsonCodec>, DuelhallError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let http = match &self.http_addr {
            Some(addr) => {
                let listener = TcpListener::bind(addr).await?;
                tracing::info!(addr = %addr, "HTTP listener bound");
                Some(listener)
            }
            None => None,
        };

        let state = Arc::new(ServerState {
            lobby: spawn_lobby(self.lobby_config),
            codec: JsonCodec,
            handshake_timeout: self.handshake_timeout,
        });

        Ok(DuelhallServer {
            transport,
            http,
            state,
        })
    }
}

impl Default for DuelhallServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound duelhall server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct DuelhallServer<C: Codec> {
    transport: WebSocketTransport,
    http: Option<TcpListener>,
    state: Arc<ServerState<C>>,
}

impl DuelhallServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> DuelhallServerBuilder {
        DuelhallServerBuilder::new()
    }
}

impl<C: Codec> DuelhallServer<C> {
    /// Returns the address the WebSocket listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the HTTP listener's address, if one was configured.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Returns a handle to the lobby this server feeds.
    pub fn lobby(&self) -> LobbyHandle {
        self.state.lobby.clone()
    }

    /// Runs the server.
    ///
    /// Spawns the HTTP listener (if any), then accepts sockets and spawns
    /// a handler task for each. The WebSocket upgrade runs inside that
    /// task, so a stalled peer never holds up the accept loop. Runs until
    /// the process is terminated.
    pub async fn run(mut self) -> Result<(), DuelhallError> {
        if let Some(listener) = self.http.take() {
            let app = crate::http::router(self.state.lobby.clone());
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!(error = %e, "HTTP listener failed");
                }
            });
        }

        tracing::info!("duelhall server running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(pending, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
