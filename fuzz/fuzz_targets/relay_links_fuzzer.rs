//! Fuzz target for the relay's session and link tables
//!
//! Drives [`RelayDriver`] with arbitrary accept, frame and close sequences,
//! including frames from unknown or unregistered sessions.
//!
//! # Invariants
//!
//! - Links are symmetric: `a` lists `b` exactly when `b` lists `a`
//! - No peer is linked to itself
//! - Data is only forwarded to the session registered for the target id
//! - NEVER panic on any event order

#![no_main]

use arbitrary::Arbitrary;
use kqsp_proto::{
    WirePayload,
    relay::{ClientFrame, ServerFrame},
};
use kqsp_relay::{RelayAction, RelayConfig, RelayDriver, RelayEvent, SessionId};
use libfuzzer_sys::fuzz_target;

const IDS: [&str; 4] = ["a", "b", "c", ""];

#[derive(Debug, Arbitrary)]
enum Op {
    Accept { session: u8 },
    Register { session: u8, id: u8 },
    Connect { session: u8, peer: u8 },
    Data { session: u8, peer: u8, payload: Vec<u8> },
    Disconnect { session: u8, peer: u8 },
    Close { session: u8 },
}

fn id(index: u8) -> String {
    IDS[usize::from(index) % IDS.len()].to_owned()
}

fn session(index: u8) -> SessionId {
    SessionId::from(index % 8)
}

fuzz_target!(|ops: Vec<Op>| {
    let mut driver = RelayDriver::new(RelayConfig { max_sessions: 6, ..RelayConfig::default() });

    for op in ops {
        let mut data_target = None;
        let event = match op {
            Op::Accept { session: n } => RelayEvent::SessionAccepted { session: session(n) },
            Op::Register { session: n, id: index } => RelayEvent::FrameReceived {
                session: session(n),
                frame: ClientFrame::Register { id: id(index) },
            },
            Op::Connect { session: n, peer } => RelayEvent::FrameReceived {
                session: session(n),
                frame: ClientFrame::Connect { peer: id(peer) },
            },
            Op::Data { session: n, peer, payload } => {
                let target = id(peer);
                data_target = Some(target.clone());
                let payload = WirePayload::Binary(payload);
                RelayEvent::FrameReceived {
                    session: session(n),
                    frame: ClientFrame::Data { peer: target, payload },
                }
            },
            Op::Disconnect { session: n, peer } => RelayEvent::FrameReceived {
                session: session(n),
                frame: ClientFrame::Disconnect { peer: id(peer) },
            },
            Op::Close { session: n } => RelayEvent::SessionClosed { session: session(n) },
        };

        let Ok(actions) = driver.process_event(event) else {
            continue;
        };

        if let Some(target) = data_target {
            for action in &actions {
                if let RelayAction::SendTo { session, frame: ServerFrame::Data { .. } } = action {
                    assert_eq!(driver.peer_id(*session), Some(target.as_str()));
                }
            }
        }

        for a in IDS {
            let links: Vec<String> = driver.links_of(a).map(str::to_owned).collect();
            assert!(!links.iter().any(|peer| peer == a), "{a} linked to itself");
            for b in &links {
                assert!(driver.links_of(b).any(|peer| peer == a), "asymmetric link {a}/{b}");
            }
        }
    }
});
