//! In-memory network of peers around a relay driver.
//!
//! `SimNetwork` wires several [`SessionManager`]s to one [`RelayDriver`]
//! without sockets. Session actions become relay frames through the same
//! [`action_to_frame`] / [`frame_to_event`] mapping the TCP transport uses,
//! and frames sit in per-peer inboxes until [`SimNetwork::run_until_idle`]
//! delivers them. Each inbox drains in arrival order.

use std::collections::VecDeque;

use kqsp_client::{
    DisplayAddress, PeerId, SessionAction, SessionConfig, SessionError, SessionEvent,
    SessionManager,
    bridge::{action_to_frame, frame_to_event},
};
use kqsp_proto::relay::{ClientFrame, ServerFrame};
use kqsp_relay::{RelayAction, RelayConfig, RelayDriver, RelayEvent, SessionId};

use crate::SimEnv;

/// Upper bound on frames delivered by one `run_until_idle` call.
const MAX_DELIVERIES: usize = 10_000;

/// One simulated peer.
pub struct SimPeer {
    /// Relay session carrying this peer's frames
    pub session_id: SessionId,
    /// The peer's session state machine
    pub session: SessionManager,
    /// Every action the session produced, in order
    pub log: Vec<SessionAction>,
    inbox: VecDeque<ServerFrame>,
    online: bool,
}

impl SimPeer {
    /// Chat text delivered to this peer as `(from, text)`.
    pub fn texts(&self) -> Vec<(String, String)> {
        self.log
            .iter()
            .filter_map(|action| match action {
                SessionAction::DeliverText { from, text } => Some((from.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }

    /// Whether the peer is still attached to the relay.
    pub fn is_online(&self) -> bool {
        self.online
    }
}

/// Relay plus peers, driven step by step.
pub struct SimNetwork {
    env: SimEnv,
    relay: RelayDriver,
    peers: Vec<SimPeer>,
    next_session: SessionId,
}

impl SimNetwork {
    /// Empty network with a seeded environment.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, RelayConfig::default())
    }

    /// Empty network with a custom relay configuration.
    pub fn with_config(seed: u64, config: RelayConfig) -> Self {
        Self {
            env: SimEnv::with_seed(seed),
            relay: RelayDriver::new(config),
            peers: Vec::new(),
            next_session: 1,
        }
    }

    /// Add a peer with a generated identity and register it with the relay.
    ///
    /// Returns the peer's index.
    pub fn add_peer(&mut self) -> Result<usize, String> {
        let display = DisplayAddress::generate(&self.env);
        let id = PeerId::generate(&self.env, &display);
        self.add_peer_as(display, id, SessionConfig::default())
    }

    /// Add a peer with an explicit identity.
    pub fn add_peer_as(
        &mut self,
        display: DisplayAddress,
        id: PeerId,
        config: SessionConfig,
    ) -> Result<usize, String> {
        let session_id = self.next_session;
        self.next_session += 1;

        let index = self.peers.len();
        self.peers.push(SimPeer {
            session_id,
            session: SessionManager::new(display, config),
            log: Vec::new(),
            inbox: VecDeque::new(),
            online: true,
        });

        self.relay_event(RelayEvent::SessionAccepted { session: session_id })?;
        self.relay_event(RelayEvent::FrameReceived {
            session: session_id,
            frame: ClientFrame::Register { id: id.into_string() },
        })?;
        self.run_until_idle()?;
        Ok(index)
    }

    /// Access a peer.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn peer(&self, index: usize) -> &SimPeer {
        &self.peers[index]
    }

    /// Number of peers ever added.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Local peer id of a peer, once registered.
    pub fn peer_id(&self, index: usize) -> Option<PeerId> {
        self.peers.get(index).and_then(|p| p.session.local_id().cloned())
    }

    /// Current group secret of a peer.
    pub fn secret(&self, index: usize) -> Option<[u8; 32]> {
        self.peers.get(index).and_then(|p| p.session.group_secret()).map(|k| *k.as_bytes())
    }

    /// Feed an application intent to a peer and route what it produces.
    ///
    /// The outer error reports a harness failure, the inner one the
    /// session's rejection of the intent.
    pub fn intent(
        &mut self,
        index: usize,
        event: SessionEvent,
    ) -> Result<Result<(), SessionError>, String> {
        let peer = self.peers.get_mut(index).ok_or_else(|| format!("no peer {index}"))?;
        match peer.session.handle(event) {
            Ok(actions) => {
                self.route(index, actions)?;
                Ok(Ok(()))
            },
            Err(e) => Ok(Err(e)),
        }
    }

    /// Connect peer `from` to peer `to` and settle the network.
    pub fn connect(&mut self, from: usize, to: usize) -> Result<(), String> {
        let target = self.peer_id(to).ok_or_else(|| format!("peer {to} has no identity"))?;
        self.intent(from, SessionEvent::Connect { peer: target })?
            .map_err(|e| format!("connect rejected: {e}"))?;
        self.run_until_idle()
    }

    /// Broadcast text from a peer and settle the network.
    pub fn send_text(&mut self, from: usize, text: &str) -> Result<(), String> {
        self.intent(from, SessionEvent::SendText { text: text.to_owned() })?
            .map_err(|e| format!("send rejected: {e}"))?;
        self.run_until_idle()
    }

    /// Deliver a transport event straight to a peer, bypassing the relay.
    pub fn inject(&mut self, index: usize, event: SessionEvent) -> Result<(), String> {
        let peer = self.peers.get_mut(index).ok_or_else(|| format!("no peer {index}"))?;
        let actions = peer.session.handle(event).map_err(|e| e.to_string())?;
        self.route(index, actions)
    }

    /// Drop a peer's relay session, as if its process died.
    pub fn crash(&mut self, index: usize) -> Result<(), String> {
        let peer = self.peers.get_mut(index).ok_or_else(|| format!("no peer {index}"))?;
        peer.online = false;
        peer.inbox.clear();
        let session = peer.session_id;

        self.relay_event(RelayEvent::SessionClosed { session })?;
        self.run_until_idle()
    }

    /// Deliver queued frames until every inbox is empty.
    pub fn run_until_idle(&mut self) -> Result<(), String> {
        for _ in 0..MAX_DELIVERIES {
            let Some(index) = self.peers.iter().position(|p| !p.inbox.is_empty()) else {
                return Ok(());
            };
            let Some(frame) = self.peers.get_mut(index).and_then(|p| p.inbox.pop_front()) else {
                continue;
            };
            self.inject(index, frame_to_event(frame))?;
        }
        Err(format!("network did not settle after {MAX_DELIVERIES} deliveries"))
    }

    fn route(&mut self, index: usize, actions: Vec<SessionAction>) -> Result<(), String> {
        let Some(peer) = self.peers.get(index) else {
            return Err(format!("no peer {index}"));
        };
        let (session, online) = (peer.session_id, peer.online);

        for action in actions {
            if online && let Some(frame) = action_to_frame(&action) {
                self.relay_event(RelayEvent::FrameReceived { session, frame })?;
            }
            if let Some(peer) = self.peers.get_mut(index) {
                peer.log.push(action);
            }
        }
        Ok(())
    }

    fn relay_event(&mut self, event: RelayEvent) -> Result<(), String> {
        let actions = self.relay.process_event(event).map_err(|e| e.to_string())?;
        for action in actions {
            match action {
                RelayAction::SendTo { session, frame } => {
                    if let Some(peer) =
                        self.peers.iter_mut().find(|p| p.session_id == session && p.online)
                    {
                        peer.inbox.push_back(frame);
                    }
                },
                RelayAction::Close { session, reason } => {
                    tracing::debug!(session, %reason, "relay closed simulated session");
                    if let Some(peer) = self.peers.iter_mut().find(|p| p.session_id == session) {
                        peer.online = false;
                    }
                },
            }
        }
        Ok(())
    }

    /// The relay driver, for inspecting links.
    pub fn relay(&self) -> &RelayDriver {
        &self.relay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peers_register_with_generated_ids() {
        let mut net = SimNetwork::new(1);
        let a = net.add_peer().unwrap();
        let b = net.add_peer().unwrap();

        let a_id = net.peer_id(a).unwrap();
        let b_id = net.peer_id(b).unwrap();
        assert_ne!(a_id, b_id);
        assert!(a_id.as_str().starts_with("kqsp-cli-"));
        assert_eq!(net.relay().session_count(), 2);
    }

    #[test]
    fn same_seed_same_identities() {
        let mut one = SimNetwork::new(9);
        let mut two = SimNetwork::new(9);
        one.add_peer().unwrap();
        two.add_peer().unwrap();

        assert_eq!(one.peer_id(0), two.peer_id(0));
    }

    #[test]
    fn taken_id_closes_identity() {
        let mut net = SimNetwork::new(1);
        let display = DisplayAddress::from_octets([1, 2, 3, 4]);
        let id = PeerId::from("kqsp-cli-1-2-3-4-same");

        net.add_peer_as(display, id.clone(), SessionConfig::default()).unwrap();
        let second = net.add_peer_as(display, id, SessionConfig::default()).unwrap();

        assert!(net.peer(second).log.contains(&SessionAction::DestroyIdentity));
        assert!(net.peer_id(second).is_none());
        assert!(net.secret(second).is_none());
    }
}
