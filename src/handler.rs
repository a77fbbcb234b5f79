//! Connection handler
//!
//! Frames a byte stream into lines, spawns the writer task that drains the
//! session's outbound channel, and runs the `Session` to completion.

use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::filter::Filter;
use crate::handle::{SessionHandle, OUTBOUND_BUFFER_SIZE};
use crate::server::ServerCommand;
use crate::session::Session;
use crate::types::SessionId;

/// Longest accepted inbound line, in bytes
pub const MAX_LINE_LENGTH: usize = 8192;

/// How long the writer may keep flushing after the session has ended
pub const WRITE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle a new connection
///
/// Works over any ordered byte stream: a `TcpStream` in production,
/// an in-memory duplex in tests.
pub async fn handle_connection<S>(
    stream: S,
    peer_addr: String,
    cmd_tx: mpsc::Sender<ServerCommand>,
    filter: Arc<Filter>,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let lines = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut sink = FramedWrite::new(write_half, LinesCodec::new());

    let session_id = SessionId::new();
    info!("Client {} connected from {}", session_id, peer_addr);

    // Channel for server -> client lines
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER_SIZE);
    let closer = CancellationToken::new();
    let handle = SessionHandle::new(session_id, out_tx, closer.clone());

    // Spawn write task (outbound channel -> stream)
    let mut write_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                line = out_rx.recv() => match line {
                    Some(line) => {
                        if sink.send(line).await.is_err() {
                            debug!("Write failed, ending write task for {}", session_id);
                            break;
                        }
                    }
                    None => break,
                },
                _ = closer.cancelled() => {
                    // Flush whatever was queued before the close
                    while let Ok(line) = out_rx.try_recv() {
                        if sink.send(line).await.is_err() {
                            break;
                        }
                    }
                    break;
                }
            }
        }
        let _ = SinkExt::<String>::close(&mut sink).await;
        debug!("Write task ended for {}", session_id);
    });

    let result = Session::new(handle, lines, cmd_tx, filter).run().await;

    // A peer that stopped reading can park the writer forever
    match timeout(WRITE_FLUSH_TIMEOUT, &mut write_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Write task for {} failed: {}", session_id, e),
        Err(_) => {
            warn!("Client {} is not reading, dropping unsent lines", session_id);
            write_task.abort();
        }
    }

    info!("Client {} disconnected", session_id);
    result
}
