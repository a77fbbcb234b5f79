//! Session delivery handle
//!
//! The registry never owns a connection. It stores a `SessionHandle`,
//! which can queue lines for the session's writer task and force the
//! session to close.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::error::SendError;
use crate::types::SessionId;

/// Lines a session may have queued before further lines are dropped
pub const OUTBOUND_BUFFER_SIZE: usize = 256;

/// Non-owning handle to a live session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Connection this handle belongs to
    pub id: SessionId,
    /// Server → Client line channel
    outbound: mpsc::Sender<String>,
    /// Cancelled when the connection should close
    closer: CancellationToken,
}

impl SessionHandle {
    /// Create a handle over a session's outbound channel and close token
    pub fn new(
        id: SessionId,
        outbound: mpsc::Sender<String>,
        closer: CancellationToken,
    ) -> Self {
        Self {
            id,
            outbound,
            closer,
        }
    }

    /// Queue one line for delivery
    ///
    /// Never waits. Fails if the writer has gone away (client disconnected)
    /// or if the queue is full because the client stopped reading.
    pub fn send(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.outbound.try_send(line.into()).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Force the session to close
    ///
    /// Lines already queued are still flushed by the writer.
    pub fn close(&self) {
        self.closer.cancel();
    }

    /// Check whether the session has been told to close
    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }

    /// Token the session and its writer wait on
    pub fn closer(&self) -> &CancellationToken {
        &self.closer
    }
}
