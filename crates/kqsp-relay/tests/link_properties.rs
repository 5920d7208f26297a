//! Property tests for the relay's link table.
//!
//! Random connect, disconnect, close and rejoin sequences over a handful of
//! peers must keep links symmetric and limited to live registered peers.

use kqsp_proto::{
    WirePayload,
    relay::{ClientFrame, ServerFrame},
};
use kqsp_relay::{RelayAction, RelayConfig, RelayDriver, RelayEvent, SessionId};
use proptest::prelude::*;

const PEERS: usize = 4;

#[derive(Debug, Clone, Copy)]
enum Op {
    Connect(usize, usize),
    Disconnect(usize, usize),
    Send(usize, usize),
    Close(usize),
    Rejoin(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..PEERS, 0..PEERS).prop_map(|(a, b)| Op::Connect(a, b)),
        1 => (0..PEERS, 0..PEERS).prop_map(|(a, b)| Op::Disconnect(a, b)),
        2 => (0..PEERS, 0..PEERS).prop_map(|(a, b)| Op::Send(a, b)),
        1 => (0..PEERS).prop_map(Op::Close),
        1 => (0..PEERS).prop_map(Op::Rejoin),
    ]
}

fn name(peer: usize) -> String {
    format!("p{peer}")
}

struct Harness {
    driver: RelayDriver,
    sessions: [Option<SessionId>; PEERS],
    next_session: SessionId,
}

impl Harness {
    fn new() -> Self {
        let mut harness = Self {
            driver: RelayDriver::new(RelayConfig::default()),
            sessions: [None; PEERS],
            next_session: 1,
        };
        for peer in 0..PEERS {
            harness.join(peer);
        }
        harness
    }

    fn join(&mut self, peer: usize) {
        let session = self.next_session;
        self.next_session += 1;
        self.driver.process_event(RelayEvent::SessionAccepted { session }).unwrap();
        let frame = ClientFrame::Register { id: name(peer) };
        self.driver.process_event(RelayEvent::FrameReceived { session, frame }).unwrap();
        self.sessions[peer] = Some(session);
    }

    fn frame(&mut self, peer: usize, frame: ClientFrame) -> Option<Vec<RelayAction>> {
        let session = self.sessions[peer]?;
        Some(self.driver.process_event(RelayEvent::FrameReceived { session, frame }).unwrap())
    }

    fn linked(&self, a: usize, b: usize) -> bool {
        self.driver.links_of(&name(a)).any(|peer| peer == name(b))
    }

    fn apply(&mut self, op: Op) {
        match op {
            Op::Connect(a, b) => {
                self.frame(a, ClientFrame::Connect { peer: name(b) });
            },
            Op::Disconnect(a, b) => {
                self.frame(a, ClientFrame::Disconnect { peer: name(b) });
            },
            Op::Send(a, b) => {
                let was_linked = self.linked(a, b);
                let payload = WirePayload::Text("ping".into());
                let Some(actions) = self.frame(a, ClientFrame::Data { peer: name(b), payload })
                else {
                    return;
                };
                let forwarded = actions.iter().any(|action| {
                    matches!(
                        action,
                        RelayAction::SendTo { session, frame: ServerFrame::Data { peer, .. } }
                            if Some(*session) == self.sessions[b] && *peer == name(a)
                    )
                });
                assert_eq!(forwarded, was_linked, "data {a}->{b} forwarded={forwarded}");
            },
            Op::Close(peer) => {
                if let Some(session) = self.sessions[peer].take() {
                    self.driver.process_event(RelayEvent::SessionClosed { session }).unwrap();
                }
            },
            Op::Rejoin(peer) => {
                if self.sessions[peer].is_none() {
                    self.join(peer);
                }
            },
        }
    }

    fn check_invariants(&self) {
        for a in 0..PEERS {
            let links: Vec<String> = self.driver.links_of(&name(a)).map(str::to_owned).collect();
            if self.sessions[a].is_none() {
                assert!(links.is_empty(), "closed peer p{a} still has links {links:?}");
            }
            for b in 0..PEERS {
                assert_eq!(self.linked(a, b), self.linked(b, a), "asymmetric link p{a}/p{b}");
            }
            assert!(!self.linked(a, a), "p{a} linked to itself");
        }
        let live = self.sessions.iter().flatten().count();
        assert_eq!(self.driver.session_count(), live);
    }
}

proptest! {
    #[test]
    fn links_stay_symmetric(ops in prop::collection::vec(op(), 0..60)) {
        let mut harness = Harness::new();
        for op in ops {
            harness.apply(op);
            harness.check_invariants();
        }
    }

    #[test]
    fn rejoined_peer_starts_unlinked(a in 0..PEERS, b in 0..PEERS) {
        prop_assume!(a != b);
        let mut harness = Harness::new();
        harness.apply(Op::Connect(a, b));
        prop_assert!(harness.linked(a, b));

        harness.apply(Op::Close(b));
        harness.apply(Op::Rejoin(b));
        prop_assert!(!harness.linked(a, b));
        let session = harness.sessions[b].unwrap();
        let expected = name(b);
        prop_assert_eq!(harness.driver.peer_id(session), Some(expected.as_str()));
    }
}
