//! Line-oriented TCP Chat Relay Library
//!
//! A chat relay where every client claims a unique username and then sends
//! text lines to everyone, to chosen users, or to everyone but chosen users.
//! Messages containing configured banned phrases are dropped.
//!
//! # Features
//! - Username registration with uniqueness enforcement
//! - Broadcast, direct, multi-recipient and excluding-broadcast messages
//! - Case-insensitive banned-phrase filtering
//! - Join/leave announcements
//! - Operator-triggered shutdown that disconnects every client
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the username registry
//! - Each connection runs a `Session` task that sends commands to the server
//! - Registration, routing and shutdown never interleave because the actor
//!   processes one command at a time
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use chat_relay::{ChatServer, Filter, handle_connection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("0.0.0.0:1818").await.unwrap();
//!     let filter = Arc::new(Filter::new(["spam"]));
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatServer::new(cmd_rx, filter.clone()).run());
//!
//!     while let Ok((stream, addr)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, addr.to_string(), cmd_tx, filter.clone()));
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod handle;
pub mod handler;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use config::Config;
pub use error::{AppError, ConfigError, SendError};
pub use filter::Filter;
pub use handle::SessionHandle;
pub use handler::handle_connection;
pub use message::{MenuChoice, Notice};
pub use registry::Registry;
pub use router::{AddressingMode, Delivery, RoutingRequest};
pub use server::{ChatServer, ServerCommand};
pub use session::{Session, SessionState};
pub use types::SessionId;
