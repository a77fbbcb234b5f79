//! Message routing
//!
//! Decides which sessions receive an outgoing message. Routing is always
//! invoked from inside the `ChatServer` actor, so the registry cannot change
//! while a fan-out is in progress.

use tracing::{debug, info, warn};

use crate::error::SendError;
use crate::filter::Filter;
use crate::handle::SessionHandle;
use crate::message::Notice;
use crate::registry::Registry;

/// How an outgoing message is addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressingMode {
    /// Everyone except the sender
    Broadcast,
    /// Only the listed usernames
    Direct(Vec<String>),
    /// Everyone except the sender and the listed usernames
    BroadcastExcluding(Vec<String>),
}

/// One outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRequest {
    pub sender: String,
    pub body: String,
    pub mode: AddressingMode,
}

impl RoutingRequest {
    pub fn new(sender: impl Into<String>, body: impl Into<String>, mode: AddressingMode) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            mode,
        }
    }
}

/// Result of routing one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Dropped by the filter; nobody but the sender was told
    Blocked,
    /// Fanned out to `delivered` sessions
    Routed {
        delivered: usize,
        not_found: Vec<String>,
    },
}

/// Split a comma-separated username list
///
/// Entries are trimmed; empty entries are dropped.
pub fn parse_user_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Route `request` through the filter and out to its recipients
pub fn route(registry: &Registry, filter: &Filter, request: RoutingRequest) -> Delivery {
    let RoutingRequest { sender, body, mode } = request;

    if filter.contains_banned(&body) {
        info!("Message from {} contains banned phrases and will not be delivered", sender);
        if let Some(handle) = registry.lookup(&sender) {
            deliver(&sender, handle, Notice::Blocked);
        }
        return Delivery::Blocked;
    }

    match mode {
        AddressingMode::Broadcast => {
            let line = Notice::Chat { from: sender.clone(), body };
            let delivered = fan_out(registry, &line.to_string(), |name| name != sender);
            Delivery::Routed {
                delivered,
                not_found: Vec::new(),
            }
        }
        AddressingMode::Direct(recipients) => {
            let line = Notice::Private { from: sender.clone(), body }.to_string();
            let mut delivered = 0;
            let mut not_found = Vec::new();

            for recipient in recipients.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
                match registry.lookup(recipient) {
                    Some(handle) => {
                        deliver(recipient, handle, line.as_str());
                        delivered += 1;
                    }
                    None => {
                        if let Some(handle) = registry.lookup(&sender) {
                            let notice = Notice::RecipientNotFound {
                                username: recipient.to_string(),
                            };
                            deliver(&sender, handle, notice);
                        }
                        not_found.push(recipient.to_string());
                    }
                }
            }

            Delivery::Routed { delivered, not_found }
        }
        AddressingMode::BroadcastExcluding(excluded) => {
            let line = Notice::Chat { from: sender.clone(), body };
            let delivered = fan_out(registry, &line.to_string(), |name| {
                name != sender && !excluded.iter().any(|e| e.trim() == name)
            });
            Delivery::Routed {
                delivered,
                not_found: Vec::new(),
            }
        }
    }
}

/// Deliver a presence line to every session except `subject`
///
/// Presence lines are produced by the server and are not filtered.
pub fn announce(registry: &Registry, subject: &str, notice: Notice) -> usize {
    fan_out(registry, &notice.to_string(), |name| name != subject)
}

fn fan_out(registry: &Registry, line: &str, mut include: impl FnMut(&str) -> bool) -> usize {
    let mut delivered = 0;
    for (name, handle) in registry.iter() {
        if include(name) {
            deliver(name, handle, line);
            delivered += 1;
        }
    }
    delivered
}

/// Transport failures are swallowed so one dead or stalled connection never
/// stops a fan-out
fn deliver(username: &str, handle: &SessionHandle, line: impl Into<String>) {
    match handle.send(line) {
        Ok(()) => {}
        Err(SendError::Full) => {
            warn!("Outbound queue full for {} ({}), dropping line", username, handle.id);
        }
        Err(e) => debug!("Dropping line for {} ({}): {}", username, handle.id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::OUTBOUND_BUFFER_SIZE;
    use crate::types::SessionId;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        registry: Registry,
        inboxes: Vec<(String, mpsc::Receiver<String>)>,
    }

    impl Fixture {
        fn with_users(names: &[&str]) -> Self {
            let mut registry = Registry::new();
            let mut inboxes = Vec::new();
            for name in names {
                let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER_SIZE);
                let handle = SessionHandle::new(SessionId::new(), tx, CancellationToken::new());
                registry.add(name, handle).unwrap();
                inboxes.push((name.to_string(), rx));
            }
            Self { registry, inboxes }
        }

        fn inbox(&mut self, name: &str) -> Vec<String> {
            let (_, rx) = self
                .inboxes
                .iter_mut()
                .find(|(n, _)| n == name)
                .expect("unknown user");
            let mut lines = Vec::new();
            while let Ok(line) = rx.try_recv() {
                lines.push(line);
            }
            lines
        }
    }

    #[test]
    fn test_broadcast_reaches_everyone_but_sender() {
        let mut fx = Fixture::with_users(&["A", "B", "C"]);
        let filter = Filter::new(["spam"]);

        let delivery = route(
            &fx.registry,
            &filter,
            RoutingRequest::new("A", "hello everyone", AddressingMode::Broadcast),
        );

        assert_eq!(
            delivery,
            Delivery::Routed {
                delivered: 2,
                not_found: vec![]
            }
        );
        assert!(fx.inbox("A").is_empty());
        assert_eq!(fx.inbox("B"), vec!["A: hello everyone"]);
        assert_eq!(fx.inbox("C"), vec!["A: hello everyone"]);
    }

    #[test]
    fn test_banned_message_only_notifies_sender() {
        let mut fx = Fixture::with_users(&["A", "B", "C"]);
        let filter = Filter::new(["spam"]);

        for mode in [
            AddressingMode::Broadcast,
            AddressingMode::Direct(vec!["B".to_string()]),
            AddressingMode::BroadcastExcluding(vec!["C".to_string()]),
        ] {
            let delivery = route(
                &fx.registry,
                &filter,
                RoutingRequest::new("A", "buy SPAM now", mode),
            );
            assert_eq!(delivery, Delivery::Blocked);
            assert_eq!(
                fx.inbox("A"),
                vec!["Your message contains a banned phrase and was not delivered."]
            );
            assert!(fx.inbox("B").is_empty());
            assert!(fx.inbox("C").is_empty());
        }
    }

    #[test]
    fn test_direct_partial_success() {
        let mut fx = Fixture::with_users(&["A", "B", "C"]);

        let delivery = route(
            &fx.registry,
            &Filter::default(),
            RoutingRequest::new(
                "A",
                "hi",
                AddressingMode::Direct(vec!["B".to_string(), " Z ".to_string()]),
            ),
        );

        assert_eq!(
            delivery,
            Delivery::Routed {
                delivered: 1,
                not_found: vec!["Z".to_string()]
            }
        );
        assert_eq!(fx.inbox("B"), vec!["A (private): hi"]);
        assert_eq!(fx.inbox("A"), vec!["User Z not found."]);
        assert!(fx.inbox("C").is_empty());
    }

    #[test]
    fn test_direct_counts_match_registered_recipients() {
        let mut fx = Fixture::with_users(&["A", "B", "C", "D"]);
        let recipients = parse_user_list("D, X,B,,Y , C");

        let delivery = route(
            &fx.registry,
            &Filter::default(),
            RoutingRequest::new("A", "yo", AddressingMode::Direct(recipients)),
        );

        let Delivery::Routed { delivered, not_found } = delivery else {
            panic!("unexpected block");
        };
        assert_eq!(delivered, 3);
        assert_eq!(not_found, vec!["X", "Y"]);
        assert_eq!(fx.inbox("A").len(), 2);
        assert_eq!(fx.inbox("D"), vec!["A (private): yo"]);
    }

    #[test]
    fn test_broadcast_excluding() {
        let mut fx = Fixture::with_users(&["A", "B", "C", "D"]);

        let delivery = route(
            &fx.registry,
            &Filter::default(),
            RoutingRequest::new(
                "A",
                "secret party",
                AddressingMode::BroadcastExcluding(parse_user_list("C, nobody")),
            ),
        );

        assert_eq!(
            delivery,
            Delivery::Routed {
                delivered: 2,
                not_found: vec![]
            }
        );
        assert_eq!(fx.inbox("B"), vec!["A: secret party"]);
        assert_eq!(fx.inbox("D"), vec!["A: secret party"]);
        assert!(fx.inbox("C").is_empty());
        assert!(fx.inbox("A").is_empty());
    }

    #[test]
    fn test_dead_recipient_does_not_stop_fan_out() {
        let mut fx = Fixture::with_users(&["A", "B", "C"]);
        fx.inboxes.retain(|(name, _)| name != "B");

        let delivery = route(
            &fx.registry,
            &Filter::default(),
            RoutingRequest::new("A", "still here?", AddressingMode::Broadcast),
        );

        assert!(matches!(delivery, Delivery::Routed { delivered: 2, .. }));
        assert_eq!(fx.inbox("C"), vec!["A: still here?"]);
    }

    #[test]
    fn test_full_recipient_does_not_stop_fan_out() {
        let mut fx = Fixture::with_users(&["A", "C"]);
        let (tx, mut stalled_rx) = mpsc::channel(1);
        let stalled = SessionHandle::new(SessionId::new(), tx, CancellationToken::new());
        stalled.send("backlog").unwrap();
        fx.registry.add("B", stalled).unwrap();

        let delivery = route(
            &fx.registry,
            &Filter::default(),
            RoutingRequest::new("A", "anyone there?", AddressingMode::Broadcast),
        );

        assert!(matches!(delivery, Delivery::Routed { delivered: 2, .. }));
        assert_eq!(fx.inbox("C"), vec!["A: anyone there?"]);
        assert_eq!(stalled_rx.try_recv().as_deref(), Ok("backlog"));
        assert!(stalled_rx.try_recv().is_err());
    }

    #[test]
    fn test_announce_skips_filter_and_subject() {
        let mut fx = Fixture::with_users(&["spammy", "B"]);

        let delivered = announce(
            &fx.registry,
            "spammy",
            Notice::Joined {
                username: "spammy".to_string(),
            },
        );

        assert_eq!(delivered, 1);
        assert_eq!(fx.inbox("B"), vec!["spammy has joined the chat!"]);
        assert!(fx.inbox("spammy").is_empty());
    }

    #[test]
    fn test_parse_user_list_drops_blanks() {
        assert_eq!(parse_user_list(" B ,,C, "), vec!["B", "C"]);
        assert!(parse_user_list(" , ").is_empty());
    }
}
