//! Mapping between relay frames and session events/actions.
//!
//! Pure functions shared by the TCP transport and the simulation harness.

use kqsp_core::PeerId;
use kqsp_proto::relay::{ClientFrame, ServerFrame};

use crate::event::{IdentityErrorKind, SessionAction, SessionEvent};

/// Translate a relay frame into the session event it reports.
pub fn frame_to_event(frame: ServerFrame) -> SessionEvent {
    match frame {
        ServerFrame::Registered { id } => SessionEvent::IdentityOpened { id: PeerId::from(id) },
        ServerFrame::Error { kind, message } => {
            SessionEvent::IdentityError { kind: IdentityErrorKind::parse(&kind), message }
        },
        ServerFrame::Incoming { peer } => {
            SessionEvent::IncomingConnection { peer: PeerId::from(peer) }
        },
        ServerFrame::Opened { peer } => SessionEvent::ConnectionOpened { peer: PeerId::from(peer) },
        ServerFrame::Data { peer, payload } => {
            SessionEvent::DataReceived { peer: PeerId::from(peer), payload }
        },
        ServerFrame::Closed { peer } => SessionEvent::ConnectionClosed { peer: PeerId::from(peer) },
        ServerFrame::ConnectionError { peer, message } => {
            SessionEvent::ConnectionError { peer: PeerId::from(peer), message }
        },
    }
}

/// Relay frame that carries out a session action, if the action touches the
/// relay at all.
pub fn action_to_frame(action: &SessionAction) -> Option<ClientFrame> {
    match action {
        SessionAction::Connect { peer, .. } => {
            Some(ClientFrame::Connect { peer: peer.as_str().to_owned() })
        },
        SessionAction::Disconnect { peer } => {
            Some(ClientFrame::Disconnect { peer: peer.as_str().to_owned() })
        },
        SessionAction::Send { peer, payload } => {
            Some(ClientFrame::Data { peer: peer.as_str().to_owned(), payload: payload.clone() })
        },
        SessionAction::DestroyIdentity
        | SessionAction::Notify(_)
        | SessionAction::DeliverText { .. }
        | SessionAction::DeliverAudio { .. }
        | SessionAction::DeliverFile { .. }
        | SessionAction::ProtectedFileReceived(_) => None,
    }
}
