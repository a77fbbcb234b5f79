//! Server configuration
//!
//! Loaded once at startup from a `key=value` text file:
//!
//! ```text
//! port=1818
//! name=Lobby
//! bannedPhrases=spam,buy now
//! ```
//!
//! Unknown keys are logged and ignored. Any failure here is fatal:
//! the server must not start accepting connections.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::ConfigError;

/// Port used when the config file does not set one
pub const DEFAULT_PORT: u16 = 1818;

/// Server name used when the config file does not set one
pub const DEFAULT_NAME: &str = "chat-relay";

/// Startup configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TCP port to listen on
    pub port: u16,
    /// Display name of this server
    pub name: String,
    /// Banned phrases, trimmed and lowercased
    pub banned_phrases: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            name: DEFAULT_NAME.to_string(),
            banned_phrases: Vec::new(),
        }
    }
}

impl Config {
    /// Read and parse the config file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse config text
    ///
    /// Lines without `=`, blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                debug!("Skipping config line without '=': {}", line);
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "port" => {
                    config.port = value.parse().map_err(|source| ConfigError::InvalidPort {
                        value: value.to_string(),
                        source,
                    })?;
                }
                "name" => config.name = value.to_string(),
                "bannedPhrases" => config.banned_phrases = parse_phrases(value),
                _ => warn!("Unknown config key: {}", key),
            }
        }

        Ok(config)
    }
}

fn parse_phrases(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|phrase| phrase.trim().to_lowercase())
        .filter(|phrase| !phrase.is_empty())
        .collect()
}
