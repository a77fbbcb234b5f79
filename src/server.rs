//! ChatServer Actor implementation
//!
//! The central actor that owns the registry. Every registration,
//! deregistration, routing fan-out, enumeration and shutdown is one command
//! processed to completion before the next, which makes the actor the single
//! consistency domain for all shared state.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::filter::Filter;
use crate::handle::SessionHandle;
use crate::message::Notice;
use crate::registry::Registry;
use crate::router::{self, Delivery, RoutingRequest};

/// Commands sent from sessions to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Claim a username
    Register {
        username: String,
        handle: SessionHandle,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    /// Give a username back and announce the departure
    Leave { username: String },
    /// Route an outgoing message
    Route(RoutingRequest),
    /// Enumerate registered usernames
    ListUsers { reply: oneshot::Sender<Vec<String>> },
    /// Disconnect everyone and stop
    Shutdown { reply: oneshot::Sender<()> },
}

/// The main ChatServer actor
pub struct ChatServer {
    /// Registered sessions: username -> handle
    registry: Registry,
    /// Banned-phrase filter shared with sessions
    filter: Arc<Filter>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver and filter
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, filter: Arc<Filter>) -> Self {
        Self {
            registry: Registry::new(),
            filter,
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Processes commands until a `Shutdown` arrives or all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            if !self.handle_command(cmd) {
                break;
            }
        }

        info!("ChatServer stopped");
    }

    /// Process a single command
    ///
    /// Returns false once the actor should stop.
    fn handle_command(&mut self, cmd: ServerCommand) -> bool {
        match cmd {
            ServerCommand::Register {
                username,
                handle,
                reply,
            } => {
                let result = self.handle_register(&username, handle);
                let _ = reply.send(result);
            }
            ServerCommand::Leave { username } => {
                self.handle_leave(&username);
            }
            ServerCommand::Route(request) => {
                self.handle_route(request);
            }
            ServerCommand::ListUsers { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
            ServerCommand::Shutdown { reply } => {
                self.handle_shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    /// Handle username registration
    ///
    /// The welcome lines are queued before the reply is sent, so nothing
    /// routed to the new session can overtake `REGISTRATION_COMPLETE`.
    fn handle_register(&mut self, username: &str, handle: SessionHandle) -> Result<(), AppError> {
        let username = username.trim();
        let welcome = handle.clone();
        let others = self.registry.add(username, handle)?;

        info!("Client {} registered as '{}'", welcome.id, username);

        let _ = welcome.send(Notice::ConnectedClients);
        for other in others {
            let _ = welcome.send(other);
        }
        let _ = welcome.send(Notice::RegistrationComplete);

        router::announce(
            &self.registry,
            username,
            Notice::Joined {
                username: username.to_string(),
            },
        );
        Ok(())
    }

    /// Handle a session leaving
    fn handle_leave(&mut self, username: &str) {
        if self.registry.remove(username).is_none() {
            debug!("Leave for unregistered '{}' ignored", username);
            return;
        }
        info!("Client '{}' has disconnected", username);
        router::announce(
            &self.registry,
            username,
            Notice::Left {
                username: username.to_string(),
            },
        );
    }

    /// Handle an outgoing message
    fn handle_route(&mut self, request: RoutingRequest) {
        let sender = request.sender.clone();
        match router::route(&self.registry, &self.filter, request) {
            Delivery::Blocked => {}
            Delivery::Routed {
                delivered,
                not_found,
            } => {
                debug!("Message from '{}' delivered to {} sessions", sender, delivered);
                if !not_found.is_empty() {
                    debug!("Unknown recipients from '{}': {:?}", sender, not_found);
                }
            }
        }
    }

    /// Notify and force-disconnect every session, then clear the registry
    fn handle_shutdown(&mut self) {
        warn!("Shutting down, disconnecting {} sessions", self.registry.len());

        for (username, handle) in self.registry.iter() {
            let _ = handle.send(Notice::ShuttingDown);
            handle.close();
            debug!("Force-disconnected '{}'", username);
        }
        self.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::AddressingMode;
    use crate::handle::OUTBOUND_BUFFER_SIZE;
    use crate::types::SessionId;
    use tokio_util::sync::CancellationToken;

    fn spawn_server(filter: Filter) -> mpsc::Sender<ServerCommand> {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        tokio::spawn(ChatServer::new(cmd_rx, Arc::new(filter)).run());
        cmd_tx
    }

    fn session() -> (SessionHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
        (SessionHandle::new(SessionId::new(), tx, CancellationToken::new()), rx)
    }

    async fn register(
        cmd_tx: &mpsc::Sender<ServerCommand>,
        username: &str,
        handle: SessionHandle,
    ) -> Result<(), AppError> {
        let (reply, rx) = oneshot::channel();
        cmd_tx
            .send(ServerCommand::Register {
                username: username.to_string(),
                handle,
                reply,
            })
            .await
            .unwrap();
        rx.await.unwrap()
    }

    async fn list_users(cmd_tx: &mpsc::Sender<ServerCommand>) -> Vec<String> {
        let (reply, rx) = oneshot::channel();
        cmd_tx.send(ServerCommand::ListUsers { reply }).await.unwrap();
        rx.await.unwrap()
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_register_sends_welcome_and_announces() {
        let cmd_tx = spawn_server(Filter::default());
        let (a, mut a_rx) = session();
        let (b, mut b_rx) = session();

        register(&cmd_tx, "A", a).await.unwrap();
        register(&cmd_tx, "B", b).await.unwrap();

        assert_eq!(
            drain(&mut a_rx),
            vec!["Connected clients:", "REGISTRATION_COMPLETE", "B has joined the chat!"]
        );
        assert_eq!(
            drain(&mut b_rx),
            vec!["Connected clients:", "A", "REGISTRATION_COMPLETE"]
        );
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let cmd_tx = spawn_server(Filter::default());
        let (a, _a_rx) = session();
        let (dup, mut dup_rx) = session();

        register(&cmd_tx, "A", a).await.unwrap();
        let err = register(&cmd_tx, "A", dup).await.unwrap_err();

        assert!(matches!(err, AppError::UsernameTaken(_)));
        assert!(drain(&mut dup_rx).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_registration_has_one_winner() {
        let cmd_tx = spawn_server(Filter::default());
        let mut receivers = Vec::new();
        let mut attempts = Vec::new();

        for _ in 0..32 {
            let (handle, rx) = session();
            receivers.push(rx);
            let cmd_tx = cmd_tx.clone();
            attempts.push(tokio::spawn(async move {
                register(&cmd_tx, "same", handle).await.is_ok()
            }));
        }

        let mut winners = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(list_users(&cmd_tx).await, vec!["same"]);
    }

    #[tokio::test]
    async fn test_leave_frees_name_and_announces() {
        let cmd_tx = spawn_server(Filter::default());
        let (a, _a_rx) = session();
        let (b, mut b_rx) = session();
        register(&cmd_tx, "A", a).await.unwrap();
        register(&cmd_tx, "B", b).await.unwrap();
        drain(&mut b_rx);

        cmd_tx
            .send(ServerCommand::Leave {
                username: "A".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(list_users(&cmd_tx).await, vec!["B"]);
        assert_eq!(drain(&mut b_rx), vec!["A has left the chat!"]);

        let (again, _again_rx) = session();
        assert!(register(&cmd_tx, "A", again).await.is_ok());
    }

    #[tokio::test]
    async fn test_leave_for_unknown_name_is_silent() {
        let cmd_tx = spawn_server(Filter::default());
        let (b, mut b_rx) = session();
        register(&cmd_tx, "B", b).await.unwrap();
        drain(&mut b_rx);

        for _ in 0..2 {
            cmd_tx
                .send(ServerCommand::Leave {
                    username: "ghost".to_string(),
                })
                .await
                .unwrap();
        }

        assert_eq!(list_users(&cmd_tx).await, vec!["B"]);
        assert!(drain(&mut b_rx).is_empty());
    }

    #[tokio::test]
    async fn test_route_goes_through_filter() {
        let cmd_tx = spawn_server(Filter::new(["spam"]));
        let (a, mut a_rx) = session();
        let (b, mut b_rx) = session();
        register(&cmd_tx, "A", a).await.unwrap();
        register(&cmd_tx, "B", b).await.unwrap();
        drain(&mut a_rx);
        drain(&mut b_rx);

        for body in ["buy SPAM now", "hello"] {
            cmd_tx
                .send(ServerCommand::Route(RoutingRequest::new(
                    "A",
                    body,
                    AddressingMode::Broadcast,
                )))
                .await
                .unwrap();
        }
        list_users(&cmd_tx).await;

        assert_eq!(
            drain(&mut a_rx),
            vec!["Your message contains a banned phrase and was not delivered."]
        );
        assert_eq!(drain(&mut b_rx), vec!["A: hello"]);
    }

    #[tokio::test]
    async fn test_shutdown_notifies_closes_and_stops() {
        let cmd_tx = spawn_server(Filter::default());
        let (a, mut a_rx) = session();
        let a_closer = a.closer().clone();
        register(&cmd_tx, "A", a).await.unwrap();
        drain(&mut a_rx);

        let (reply, done) = oneshot::channel();
        cmd_tx.send(ServerCommand::Shutdown { reply }).await.unwrap();
        done.await.unwrap();

        assert!(a_closer.is_cancelled());
        assert_eq!(
            drain(&mut a_rx),
            vec!["Server is shutting down. You will be disconnected."]
        );

        let (reply, rx) = oneshot::channel();
        let sent = cmd_tx.send(ServerCommand::ListUsers { reply }).await;
        assert!(sent.is_err() || rx.await.is_err());
    }
}
