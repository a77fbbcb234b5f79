//! Per-connection session state machine
//!
//! `Connecting` → `AwaitingUsername` → `Registered` → `Closed`, never
//! backwards. The session reads lines from its own connection, turns them
//! into `ServerCommand`s for the `ChatServer` actor, and writes its own
//! prompts through its `SessionHandle`.

use std::fmt;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::LinesCodecError;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::filter::Filter;
use crate::handle::SessionHandle;
use crate::message::{MenuChoice, Notice, MENU};
use crate::router::{parse_user_list, AddressingMode, RoutingRequest};
use crate::server::ServerCommand;

/// Lifecycle state of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AwaitingUsername,
    Registered { username: String },
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => f.write_str("connecting"),
            SessionState::AwaitingUsername => f.write_str("awaiting-username"),
            SessionState::Registered { username } => write!(f, "registered({})", username),
            SessionState::Closed => f.write_str("closed"),
        }
    }
}

/// One client's session
///
/// `L` is the connection's inbound line stream.
pub struct Session<L> {
    handle: SessionHandle,
    lines: L,
    cmd_tx: mpsc::Sender<ServerCommand>,
    filter: Arc<Filter>,
    state: SessionState,
}

impl<L> Session<L>
where
    L: Stream<Item = Result<String, LinesCodecError>> + Unpin,
{
    pub fn new(
        handle: SessionHandle,
        lines: L,
        cmd_tx: mpsc::Sender<ServerCommand>,
        filter: Arc<Filter>,
    ) -> Self {
        Self {
            handle,
            lines,
            cmd_tx,
            filter,
            state: SessionState::Connecting,
        }
    }

    /// Drive the session until it closes
    ///
    /// Always ends in `Closed`, whatever the reason the loop stopped.
    pub async fn run(mut self) -> Result<(), AppError> {
        self.transition(SessionState::AwaitingUsername);

        let result = match self.register().await {
            Ok(Some(username)) => {
                self.transition(SessionState::Registered {
                    username: username.clone(),
                });
                self.command_loop(&username).await
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };

        self.close().await;
        result
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {}: {} -> {}", self.handle.id, self.state, next);
        self.state = next;
    }

    /// Next line from the client, or `None` on end-of-stream, transport
    /// failure or forced close
    async fn next_line(&mut self) -> Option<String> {
        let id = self.handle.id;
        let closer = self.handle.closer().clone();
        let lines = &mut self.lines;

        tokio::select! {
            _ = closer.cancelled() => None,
            line = lines.next() => match line {
                Some(Ok(line)) => Some(line),
                Some(Err(e)) => {
                    warn!("Read error for {}: {}", id, e);
                    None
                }
                None => None,
            },
        }
    }

    fn reply(&self, line: impl Into<String>) {
        let _ = self.handle.send(line);
    }

    /// Registration handshake
    ///
    /// Returns the claimed username, or `None` if the connection ended first.
    async fn register(&mut self) -> Result<Option<String>, AppError> {
        self.reply(Notice::UsernamePrompt);

        loop {
            let Some(line) = self.next_line().await else {
                return Ok(None);
            };
            let username = line.trim();
            if username.is_empty() {
                self.reply(Notice::UsernameEmpty);
                continue;
            }

            let (reply, response) = oneshot::channel();
            self.cmd_tx
                .send(ServerCommand::Register {
                    username: username.to_string(),
                    handle: self.handle.clone(),
                    reply,
                })
                .await
                .map_err(|_| AppError::ChannelSend)?;

            match response.await.map_err(|_| AppError::ChannelSend)? {
                Ok(()) => return Ok(Some(username.to_string())),
                Err(e) => {
                    debug!("Registration for {} rejected: {}", self.handle.id, e);
                    self.reply(Notice::try_from(e)?);
                }
            }
        }
    }

    /// Post-registration menu loop
    async fn command_loop(&mut self, username: &str) -> Result<(), AppError> {
        loop {
            for line in MENU {
                self.reply(line);
            }

            let Some(token) = self.next_line().await else {
                return Ok(());
            };

            let Some(choice) = MenuChoice::parse(&token) else {
                self.reply(Notice::InvalidOption);
                continue;
            };

            match choice {
                MenuChoice::Broadcast => {
                    let Some(body) = self.prompt(Notice::MessagePrompt).await else {
                        return Ok(());
                    };
                    self.send_message(username, body, AddressingMode::Broadcast)
                        .await?;
                }
                MenuChoice::DirectSingle => {
                    let Some(recipient) = self.prompt(Notice::RecipientPrompt).await else {
                        return Ok(());
                    };
                    let Some(body) = self.prompt(Notice::MessagePrompt).await else {
                        return Ok(());
                    };
                    let recipients = vec![recipient.trim().to_string()];
                    self.send_message(username, body, AddressingMode::Direct(recipients))
                        .await?;
                }
                MenuChoice::DirectMany => {
                    let Some(recipients) = self.prompt(Notice::RecipientsPrompt).await else {
                        return Ok(());
                    };
                    let Some(body) = self.prompt(Notice::MessagePrompt).await else {
                        return Ok(());
                    };
                    let recipients = parse_user_list(&recipients);
                    self.send_message(username, body, AddressingMode::Direct(recipients))
                        .await?;
                }
                MenuChoice::BroadcastExcluding => {
                    let Some(excluded) = self.prompt(Notice::ExclusionsPrompt).await else {
                        return Ok(());
                    };
                    let Some(body) = self.prompt(Notice::MessagePrompt).await else {
                        return Ok(());
                    };
                    let excluded = parse_user_list(&excluded);
                    self.send_message(username, body, AddressingMode::BroadcastExcluding(excluded))
                        .await?;
                }
                MenuChoice::BannedPhrases => {
                    self.reply(Notice::BannedPhrases {
                        phrases: self.filter.phrases().to_vec(),
                    });
                }
                MenuChoice::ListUsers => {
                    let (reply, response) = oneshot::channel();
                    self.cmd_tx
                        .send(ServerCommand::ListUsers { reply })
                        .await
                        .map_err(|_| AppError::ChannelSend)?;
                    let usernames = response.await.map_err(|_| AppError::ChannelSend)?;

                    self.reply(Notice::AllConnectedClients);
                    for name in usernames {
                        self.reply(name);
                    }
                }
                MenuChoice::Exit => {
                    info!("Client '{}' requested exit", username);
                    return Ok(());
                }
            }
        }
    }

    async fn prompt(&mut self, notice: Notice) -> Option<String> {
        self.reply(notice);
        self.next_line().await
    }

    /// Empty bodies are rejected here and never reach the server
    async fn send_message(
        &mut self,
        username: &str,
        body: String,
        mode: AddressingMode,
    ) -> Result<(), AppError> {
        if body.trim().is_empty() {
            self.reply(Notice::EmptyMessage);
            return Ok(());
        }

        self.cmd_tx
            .send(ServerCommand::Route(RoutingRequest::new(username, body, mode)))
            .await
            .map_err(|_| AppError::ChannelSend)
    }

    /// Enter `Closed`: close the connection and give the username back
    async fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        debug!("Session {}: {} -> {}", self.handle.id, previous, self.state);

        self.handle.close();

        if let SessionState::Registered { username } = previous {
            let _ = self
                .cmd_tx
                .send(ServerCommand::Leave {
                    username: username.clone(),
                })
                .await;
            info!("Client '{}' left", username);
        }
    }
}
