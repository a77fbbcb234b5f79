//! Chat Relay - Entry Point
//!
//! Loads the configuration, starts the ChatServer actor and accepts
//! connections until Ctrl-C or a `shutdown` line on the console.

use std::env;
use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chat_relay::{handle_connection, ChatServer, Config, Filter, ServerCommand};

/// Config file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config.txt";

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

/// How long connection tasks get to finish after shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!("Failed to load config {}: {}", config_path, e);
        e
    })?;

    let filter = Arc::new(Filter::new(&config.banned_phrases));
    let addr = format!("0.0.0.0:{}", config.port);

    let listener = TcpListener::bind(&addr).await?;
    info!("{} listening on {}", config.name, addr);
    info!("Banned phrases: {}", filter.phrases().join(", "));

    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let server_task = tokio::spawn(ChatServer::new(cmd_rx, filter.clone()).run());

    let mut connections = JoinSet::new();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    // Connection accept loop
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!("New connection from {}", peer);
                    let cmd_tx = cmd_tx.clone();
                    let filter = filter.clone();

                    connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, peer.to_string(), cmd_tx, filter).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            Some(finished) = connections.join_next() => {
                if let Err(e) = finished {
                    warn!("Connection task failed: {}", e);
                }
            }
        }
    }

    drop(listener);
    info!("Server stopped accepting new clients");

    let (reply, done) = oneshot::channel();
    if cmd_tx.send(ServerCommand::Shutdown { reply }).await.is_ok() {
        let _ = done.await;
    }
    drop(cmd_tx);

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("Connections still open after {:?}, aborting", SHUTDOWN_GRACE);
        connections.abort_all();
    }

    let _ = server_task.await;
    info!("Server has shut down");
    Ok(())
}

/// Resolves on Ctrl-C or a `shutdown` line typed on the console
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => {
                error!("Failed to listen for Ctrl-C: {}", e);
                future::pending::<()>().await;
            }
        }
    };

    let console = async {
        match console_shutdown().await {
            Ok(()) => info!("Shutdown command received, shutting down"),
            // Console closed without a shutdown command; rely on Ctrl-C
            Err(_) => future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = console => {}
    }
}

/// Watch stdin on a plain thread so a pending read never holds up exit
fn console_shutdown() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("shutdown") => {
                    let _ = tx.send(());
                    return;
                }
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    });
    rx
}
