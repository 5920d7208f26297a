//! Relay driver.
//!
//! Maps registered peer ids to client sessions and keeps the set of logical
//! links between them. Pure logic: the runtime feeds [`RelayEvent`]s and
//! executes the returned [`RelayAction`]s.
//!
//! Links are undirected and symmetric: when `a` links to `b`, both sessions
//! see `opened` and either side may send or disconnect. Incoming links are
//! announced to the target and accepted without asking it.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use kqsp_proto::relay::{
    ClientFrame, ERROR_INVALID_FRAME, ERROR_SERVER, ERROR_UNAVAILABLE_ID, ServerFrame,
};
use tracing::{debug, info, warn};

use crate::error::RelayError;

/// Runtime-assigned session identifier.
pub type SessionId = u64;

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to
    pub bind_address: String,
    /// Maximum concurrent client sessions
    pub max_sessions: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:9000".to_string(), max_sessions: 1024 }
    }
}

/// Events the relay driver processes.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// A client socket was accepted.
    SessionAccepted {
        /// Session ID assigned by the runtime
        session: SessionId,
    },

    /// A frame arrived from a session.
    FrameReceived {
        /// Sending session
        session: SessionId,
        /// Decoded frame
        frame: ClientFrame,
    },

    /// A client socket closed.
    SessionClosed {
        /// Closed session
        session: SessionId,
    },
}

/// Actions the relay driver produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    /// Send a frame to a session.
    SendTo {
        /// Target session
        session: SessionId,
        /// Frame to send
        frame: ServerFrame,
    },

    /// Close a session.
    Close {
        /// Session to close
        session: SessionId,
        /// Reason for closure
        reason: String,
    },
}

/// Action-based relay driver.
#[derive(Debug)]
pub struct RelayDriver {
    config: RelayConfig,
    /// session → registered peer id (`None` until registered)
    sessions: HashMap<SessionId, Option<String>>,
    /// peer id → session
    ids: HashMap<String, SessionId>,
    /// peer id → linked peer ids
    links: BTreeMap<String, BTreeSet<String>>,
}

impl RelayDriver {
    /// Create a driver.
    pub fn new(config: RelayConfig) -> Self {
        Self { config, sessions: HashMap::new(), ids: HashMap::new(), links: BTreeMap::new() }
    }

    /// Configuration in use
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Number of accepted sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether a session was accepted and has not closed
    pub fn is_accepted(&self, session: SessionId) -> bool {
        self.sessions.contains_key(&session)
    }

    /// Peer id registered by a session
    pub fn peer_id(&self, session: SessionId) -> Option<&str> {
        self.sessions.get(&session).and_then(Option::as_deref)
    }

    /// Peers linked to `peer`
    pub fn links_of(&self, peer: &str) -> impl Iterator<Item = &str> {
        self.links.get(peer).into_iter().flatten().map(String::as_str)
    }

    /// Process an event and return actions to execute.
    ///
    /// # Errors
    ///
    /// - `RelayError::UnknownSession` if the event names a session that was
    ///   never accepted
    pub fn process_event(&mut self, event: RelayEvent) -> Result<Vec<RelayAction>, RelayError> {
        match event {
            RelayEvent::SessionAccepted { session } => Ok(self.handle_accepted(session)),
            RelayEvent::FrameReceived { session, frame } => self.handle_frame(session, frame),
            RelayEvent::SessionClosed { session } => self.handle_closed(session),
        }
    }

    fn handle_accepted(&mut self, session: SessionId) -> Vec<RelayAction> {
        if self.sessions.contains_key(&session) {
            warn!(session, "session accepted twice, ignoring");
            return vec![];
        }
        if self.sessions.len() >= self.config.max_sessions {
            warn!(session, max = self.config.max_sessions, "relay full, rejecting session");
            return vec![
                error_to(session, ERROR_SERVER, "relay is at capacity"),
                RelayAction::Close { session, reason: "relay is at capacity".into() },
            ];
        }

        debug!(session, "session accepted");
        self.sessions.insert(session, None);
        vec![]
    }

    fn handle_frame(
        &mut self,
        session: SessionId,
        frame: ClientFrame,
    ) -> Result<Vec<RelayAction>, RelayError> {
        let registered = self.sessions.get(&session).ok_or(RelayError::UnknownSession(session))?;

        let Some(local) = registered.clone() else {
            return Ok(match frame {
                ClientFrame::Register { id } => self.handle_register(session, id),
                ClientFrame::Connect { .. }
                | ClientFrame::Data { .. }
                | ClientFrame::Disconnect { .. } => {
                    vec![error_to(session, ERROR_INVALID_FRAME, "register first")]
                },
            });
        };

        Ok(match frame {
            ClientFrame::Register { .. } => {
                vec![error_to(session, ERROR_INVALID_FRAME, "already registered")]
            },
            ClientFrame::Connect { peer } => self.handle_connect(session, &local, peer),
            ClientFrame::Data { peer, payload } => match self.session_of_link(&local, &peer) {
                Some(target) => {
                    vec![RelayAction::SendTo {
                        session: target,
                        frame: ServerFrame::Data { peer: local, payload },
                    }]
                },
                None => vec![connection_error_to(session, peer, "no open link")],
            },
            ClientFrame::Disconnect { peer } => self.handle_disconnect(session, &local, peer),
        })
    }

    fn handle_register(&mut self, session: SessionId, id: String) -> Vec<RelayAction> {
        if id.trim().is_empty() {
            return vec![error_to(session, ERROR_INVALID_FRAME, "empty peer id")];
        }
        if self.ids.contains_key(&id) {
            info!(session, %id, "peer id unavailable");
            return vec![error_to(session, ERROR_UNAVAILABLE_ID, &format!("ID \"{id}\" is taken"))];
        }

        info!(session, %id, "peer registered");
        self.ids.insert(id.clone(), session);
        self.sessions.insert(session, Some(id.clone()));
        vec![RelayAction::SendTo { session, frame: ServerFrame::Registered { id } }]
    }

    fn handle_connect(
        &mut self,
        session: SessionId,
        local: &str,
        peer: String,
    ) -> Vec<RelayAction> {
        if peer == local {
            return vec![connection_error_to(session, peer, "cannot connect to self")];
        }
        let Some(&target) = self.ids.get(&peer) else {
            return vec![connection_error_to(session, peer, "peer unavailable")];
        };
        if self.links_of(local).any(|linked| linked == peer) {
            return vec![connection_error_to(session, peer, "already linked")];
        }

        info!(from = local, to = %peer, "link opened");
        self.links.entry(local.to_owned()).or_default().insert(peer.clone());
        self.links.entry(peer.clone()).or_default().insert(local.to_owned());

        vec![
            RelayAction::SendTo {
                session: target,
                frame: ServerFrame::Incoming { peer: local.to_owned() },
            },
            RelayAction::SendTo {
                session: target,
                frame: ServerFrame::Opened { peer: local.to_owned() },
            },
            RelayAction::SendTo { session, frame: ServerFrame::Opened { peer } },
        ]
    }

    fn handle_disconnect(
        &mut self,
        session: SessionId,
        local: &str,
        peer: String,
    ) -> Vec<RelayAction> {
        let Some(target) = self.session_of_link(local, &peer) else {
            return vec![connection_error_to(session, peer, "no open link")];
        };

        self.unlink(local, &peer);
        info!(from = local, to = %peer, "link closed");
        vec![
            RelayAction::SendTo {
                session: target,
                frame: ServerFrame::Closed { peer: local.to_owned() },
            },
            RelayAction::SendTo { session, frame: ServerFrame::Closed { peer } },
        ]
    }

    fn handle_closed(&mut self, session: SessionId) -> Result<Vec<RelayAction>, RelayError> {
        let registered = self.sessions.remove(&session).ok_or(RelayError::UnknownSession(session))?;
        let Some(local) = registered else {
            debug!(session, "unregistered session closed");
            return Ok(vec![]);
        };

        self.ids.remove(&local);
        let linked = self.links.remove(&local).unwrap_or_default();
        info!(session, id = %local, links = linked.len(), "peer left");

        let mut actions = Vec::with_capacity(linked.len());
        for peer in linked {
            if let Some(peers) = self.links.get_mut(&peer) {
                peers.remove(&local);
                if peers.is_empty() {
                    self.links.remove(&peer);
                }
            }
            if let Some(&target) = self.ids.get(&peer) {
                actions.push(RelayAction::SendTo {
                    session: target,
                    frame: ServerFrame::Closed { peer: local.clone() },
                });
            }
        }
        Ok(actions)
    }

    fn session_of_link(&self, local: &str, peer: &str) -> Option<SessionId> {
        if !self.links_of(local).any(|linked| linked == peer) {
            return None;
        }
        self.ids.get(peer).copied()
    }

    fn unlink(&mut self, a: &str, b: &str) {
        for (from, to) in [(a, b), (b, a)] {
            if let Some(peers) = self.links.get_mut(from) {
                peers.remove(to);
                if peers.is_empty() {
                    self.links.remove(from);
                }
            }
        }
    }
}

fn error_to(session: SessionId, kind: &str, message: &str) -> RelayAction {
    RelayAction::SendTo {
        session,
        frame: ServerFrame::Error { kind: kind.to_owned(), message: message.to_owned() },
    }
}

fn connection_error_to(session: SessionId, peer: String, message: &str) -> RelayAction {
    RelayAction::SendTo {
        session,
        frame: ServerFrame::ConnectionError { peer, message: message.to_owned() },
    }
}

#[cfg(test)]
mod tests {
    use kqsp_proto::WirePayload;

    use super::*;

    fn driver() -> RelayDriver {
        RelayDriver::new(RelayConfig::default())
    }

    fn accept_and_register(driver: &mut RelayDriver, session: SessionId, id: &str) {
        driver.process_event(RelayEvent::SessionAccepted { session }).unwrap();
        driver
            .process_event(RelayEvent::FrameReceived {
                session,
                frame: ClientFrame::Register { id: id.into() },
            })
            .unwrap();
    }

    fn frame(driver: &mut RelayDriver, session: SessionId, frame: ClientFrame) -> Vec<RelayAction> {
        driver.process_event(RelayEvent::FrameReceived { session, frame }).unwrap()
    }

    fn sent_to(session: SessionId, frame: ServerFrame) -> RelayAction {
        RelayAction::SendTo { session, frame }
    }

    #[test]
    fn register_replies_with_id() {
        let mut driver = driver();
        driver.process_event(RelayEvent::SessionAccepted { session: 1 }).unwrap();

        let actions = frame(&mut driver, 1, ClientFrame::Register { id: "a".into() });

        assert_eq!(actions, vec![sent_to(1, ServerFrame::Registered { id: "a".into() })]);
        assert_eq!(driver.peer_id(1), Some("a"));
    }

    #[test]
    fn duplicate_id_is_unavailable() {
        let mut driver = driver();
        accept_and_register(&mut driver, 1, "a");
        driver.process_event(RelayEvent::SessionAccepted { session: 2 }).unwrap();

        let actions = frame(&mut driver, 2, ClientFrame::Register { id: "a".into() });

        assert!(matches!(
            actions.as_slice(),
            [RelayAction::SendTo { session: 2, frame: ServerFrame::Error { kind, .. } }]
                if kind == ERROR_UNAVAILABLE_ID
        ));
        assert_eq!(driver.peer_id(2), None);
    }

    #[test]
    fn frames_before_register_are_invalid() {
        let mut driver = driver();
        driver.process_event(RelayEvent::SessionAccepted { session: 1 }).unwrap();

        let actions = frame(&mut driver, 1, ClientFrame::Connect { peer: "b".into() });

        assert!(matches!(
            actions.as_slice(),
            [RelayAction::SendTo { frame: ServerFrame::Error { kind, .. }, .. }]
                if kind == ERROR_INVALID_FRAME
        ));
    }

    #[test]
    fn connect_opens_both_ends() {
        let mut driver = driver();
        accept_and_register(&mut driver, 1, "a");
        accept_and_register(&mut driver, 2, "b");

        let actions = frame(&mut driver, 1, ClientFrame::Connect { peer: "b".into() });

        assert_eq!(actions, vec![
            sent_to(2, ServerFrame::Incoming { peer: "a".into() }),
            sent_to(2, ServerFrame::Opened { peer: "a".into() }),
            sent_to(1, ServerFrame::Opened { peer: "b".into() }),
        ]);
        assert_eq!(driver.links_of("b").collect::<Vec<_>>(), ["a"]);
    }

    #[test]
    fn connect_to_unknown_peer_fails() {
        let mut driver = driver();
        accept_and_register(&mut driver, 1, "a");

        let actions = frame(&mut driver, 1, ClientFrame::Connect { peer: "ghost".into() });

        assert!(matches!(
            actions.as_slice(),
            [RelayAction::SendTo { session: 1, frame: ServerFrame::ConnectionError { .. } }]
        ));
    }

    #[test]
    fn data_is_forwarded_with_sender_id() {
        let mut driver = driver();
        accept_and_register(&mut driver, 1, "a");
        accept_and_register(&mut driver, 2, "b");
        frame(&mut driver, 1, ClientFrame::Connect { peer: "b".into() });
        let payload = WirePayload::Binary(vec![1, 2, 3]);

        let actions =
            frame(&mut driver, 2, ClientFrame::Data { peer: "a".into(), payload: payload.clone() });

        assert_eq!(actions, vec![sent_to(1, ServerFrame::Data { peer: "b".into(), payload })]);
    }

    #[test]
    fn data_without_link_is_refused() {
        let mut driver = driver();
        accept_and_register(&mut driver, 1, "a");
        accept_and_register(&mut driver, 2, "b");

        let actions = frame(&mut driver, 1, ClientFrame::Data {
            peer: "b".into(),
            payload: WirePayload::Text("{}".into()),
        });

        assert!(matches!(
            actions.as_slice(),
            [RelayAction::SendTo { session: 1, frame: ServerFrame::ConnectionError { .. } }]
        ));
    }

    #[test]
    fn session_close_closes_its_links() {
        let mut driver = driver();
        accept_and_register(&mut driver, 1, "a");
        accept_and_register(&mut driver, 2, "b");
        accept_and_register(&mut driver, 3, "c");
        frame(&mut driver, 1, ClientFrame::Connect { peer: "b".into() });
        frame(&mut driver, 3, ClientFrame::Connect { peer: "a".into() });

        let actions = driver.process_event(RelayEvent::SessionClosed { session: 1 }).unwrap();

        assert_eq!(actions, vec![
            sent_to(2, ServerFrame::Closed { peer: "a".into() }),
            sent_to(3, ServerFrame::Closed { peer: "a".into() }),
        ]);
        assert_eq!(driver.links_of("b").count(), 0);
        assert_eq!(driver.peer_id(1), None);
    }

    #[test]
    fn released_id_can_be_reused() {
        let mut driver = driver();
        accept_and_register(&mut driver, 1, "a");
        driver.process_event(RelayEvent::SessionClosed { session: 1 }).unwrap();

        accept_and_register(&mut driver, 2, "a");
        assert_eq!(driver.peer_id(2), Some("a"));
    }

    #[test]
    fn disconnect_notifies_both_sides() {
        let mut driver = driver();
        accept_and_register(&mut driver, 1, "a");
        accept_and_register(&mut driver, 2, "b");
        frame(&mut driver, 1, ClientFrame::Connect { peer: "b".into() });

        let actions = frame(&mut driver, 2, ClientFrame::Disconnect { peer: "a".into() });

        assert_eq!(actions, vec![
            sent_to(1, ServerFrame::Closed { peer: "b".into() }),
            sent_to(2, ServerFrame::Closed { peer: "a".into() }),
        ]);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut driver = RelayDriver::new(RelayConfig { max_sessions: 1, ..Default::default() });
        driver.process_event(RelayEvent::SessionAccepted { session: 1 }).unwrap();

        let actions = driver.process_event(RelayEvent::SessionAccepted { session: 2 }).unwrap();

        assert!(actions.contains(&RelayAction::Close {
            session: 2,
            reason: "relay is at capacity".into()
        }));
        assert_eq!(driver.session_count(), 1);
    }

    #[test]
    fn repeated_accept_keeps_registration() {
        let mut driver = driver();
        accept_and_register(&mut driver, 1, "alice");

        let actions = driver.process_event(RelayEvent::SessionAccepted { session: 1 }).unwrap();

        assert!(actions.is_empty());
        assert_eq!(driver.peer_id(1), Some("alice"));
    }

    #[test]
    fn unknown_session_is_an_error() {
        let mut driver = driver();
        assert!(matches!(
            driver.process_event(RelayEvent::SessionClosed { session: 9 }),
            Err(RelayError::UnknownSession(9))
        ));
    }
}
