//! Error types for the chat relay
//!
//! Defines application-level errors, delivery errors and configuration errors.
//! Uses thiserror for ergonomic error definitions.

use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (session termination) and
/// user input errors (reported to the client as a text line).
#[derive(Debug, Error)]
pub enum AppError {
    /// Channel send error (fatal - server actor has stopped)
    #[error("Channel send error")]
    ChannelSend,

    /// Username was blank after trimming
    #[error("Username cannot be empty")]
    UsernameEmpty,

    /// Username is already held by another session
    #[error("Username already taken: {0}")]
    UsernameTaken(String),
}

/// Message send errors
///
/// Occurs when delivering to a session whose writer has gone away
/// or has stopped keeping up.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The session's outbound queue is full; the line was dropped
    #[error("Outbound queue full")]
    Full,
}

/// Configuration errors (fatal at startup)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The `port` value is not a valid port number
    #[error("invalid port '{value}': {source}")]
    InvalidPort {
        value: String,
        #[source]
        source: ParseIntError,
    },
}
