use std::time::Duration;

use clap::Parser;
use duelhall::prelude::*;
use tracing_subscriber::EnvFilter;

/// Matchmaking and tic-tac-toe session server.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// WebSocket listen address
    #[arg(long, env = "DUELHALL_BIND", default_value = "0.0.0.0:8080")]
    bind: String,

    /// HTTP listen address for /health and /metrics
    #[arg(long, env = "DUELHALL_HTTP_BIND", default_value = "0.0.0.0:8081")]
    http_bind: String,

    /// Pause between a game's final move and the end notice, in milliseconds
    #[arg(long, env = "DUELHALL_FINISH_DELAY_MS", default_value_t = 1000)]
    finish_delay_ms: u64,

    /// Time a new peer gets to complete the WebSocket upgrade, in milliseconds
    #[arg(long, env = "DUELHALL_HANDSHAKE_TIMEOUT_MS", default_value_t = 10_000)]
    handshake_timeout_ms: u64,
}

impl Args {
    fn lobby_config(&self) -> LobbyConfig {
        LobbyConfig {
            finish_delay: Duration::from_millis(self.finish_delay_ms),
            ..LobbyConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!(bind = %args.bind, http = %args.http_bind, "starting duelhall");

    let server = DuelhallServer::builder()
        .bind(&args.bind)
        .http_bind(&args.http_bind)
        .lobby_config(args.lobby_config())
        .handshake_timeout(Duration::from_millis(args.handshake_timeout_ms))
        .build()
        .await?;

    server.run().await?;
    Ok(())
}
