//! Username registry
//!
//! The authoritative username → session mapping. It is owned by the
//! `ChatServer` actor, so every operation here already runs inside the
//! server's single consistency domain and needs no locking of its own.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::AppError;
use crate::handle::SessionHandle;

/// Registered sessions keyed by username
///
/// Keys are unique, case-sensitive and kept in sorted order so
/// enumeration is stable.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: BTreeMap<String, SessionHandle>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `username` for `handle`
    ///
    /// Check and insert happen together. On success returns the usernames of
    /// every other registered session, taken before the insert. An existing
    /// entry is never overwritten.
    pub fn add(&mut self, username: &str, handle: SessionHandle) -> Result<Vec<String>, AppError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::UsernameEmpty);
        }
        if self.sessions.contains_key(username) {
            return Err(AppError::UsernameTaken(username.to_string()));
        }

        let others = self.snapshot();
        self.sessions.insert(username.to_string(), handle);
        debug!("Registered '{}', total sessions: {}", username, self.sessions.len());
        Ok(others)
    }

    /// Remove `username`; no-op if absent
    pub fn remove(&mut self, username: &str) -> Option<SessionHandle> {
        let removed = self.sessions.remove(username);
        if removed.is_some() {
            debug!("Removed '{}', total sessions: {}", username, self.sessions.len());
        }
        removed
    }

    /// Look up the session registered under `username`
    pub fn lookup(&self, username: &str) -> Option<&SessionHandle> {
        self.sessions.get(username)
    }

    /// All registered usernames, sorted
    pub fn snapshot(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    /// Iterate over (username, handle) pairs in username order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SessionHandle)> {
        self.sessions.iter().map(|(name, handle)| (name.as_str(), handle))
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
