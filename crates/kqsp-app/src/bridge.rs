//! Session-to-Application translation layer.
//!
//! The [`Bridge`] wraps the [`kqsp_client::SessionManager`] and adapts it to
//! the application lifecycle.
//!
//! # Responsibilities
//!
//! - Converts [`crate::AppAction`]s into session intents.
//! - Accumulates outgoing relay frames to be sent by the driver in the next
//!   I/O cycle.
//! - Converts session actions back into [`crate::AppEvent`]s for the App.
//! - Tries passwords on protected files with the session's cipher.

use kqsp_client::{
    Cipher, DecodeError, DisplayAddress, FileTransferCodec, SessionAction, SessionConfig,
    SessionError, SessionEvent, SessionManager, XorCipher, bridge::action_to_frame,
};
use kqsp_proto::relay::ClientFrame;

use crate::{AppAction, AppEvent, PeerEntry};

/// Bridge between App and session logic.
pub struct Bridge<C: Cipher = XorCipher> {
    session: SessionManager<C>,
    outgoing: Vec<ClientFrame>,
    destroyed: bool,
}

impl Bridge {
    /// Create a bridge over a fresh session with the default cipher.
    pub fn new(display: DisplayAddress, config: SessionConfig) -> Self {
        Self::with_session(SessionManager::new(display, config))
    }
}

impl<C: Cipher> Bridge<C> {
    /// Wrap an existing session.
    pub fn with_session(session: SessionManager<C>) -> Self {
        Self { session, outgoing: Vec::new(), destroyed: false }
    }

    /// The wrapped session.
    pub fn session(&self) -> &SessionManager<C> {
        &self.session
    }

    /// Whether the session asked for the identity to be destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Feed a transport event into the session.
    pub fn handle_session_event(&mut self, event: SessionEvent) -> Vec<AppEvent> {
        let result = self.session.handle(event);
        self.handle_session_result(result)
    }

    /// Process an App action and return resulting App events.
    pub fn process_app_action(&mut self, action: AppAction) -> Vec<AppEvent> {
        match action {
            AppAction::Connect { peer } => {
                let result = self.session.handle(SessionEvent::Connect { peer });
                self.handle_session_result(result)
            },
            AppAction::Disconnect { peer } => {
                let result = self.session.handle(SessionEvent::Disconnect { peer });
                self.handle_session_result(result)
            },
            AppAction::SendText { text } => {
                let result = self.session.handle(SessionEvent::SendText { text: text.clone() });
                let mut events = self.handle_session_result(result);
                if !events.iter().any(|e| matches!(e, AppEvent::Error { .. })) {
                    events.push(AppEvent::TextSent { text });
                }
                events
            },
            AppAction::ListPeers => vec![AppEvent::Peers(self.peer_entries())],
            AppAction::UnlockFile { file, password } => {
                match FileTransferCodec::try_password(self.session.cipher(), &file, &password) {
                    Ok(data) => vec![AppEvent::FileUnlocked { data }],
                    Err(DecodeError::WrongPassword) => vec![AppEvent::WrongPassword],
                    Err(err) => vec![AppEvent::FileDropped { reason: err.to_string() }],
                }
            },
            AppAction::Render
            | AppAction::Quit
            | AppAction::SendFile { .. }
            | AppAction::SaveFile { .. } => vec![],
        }
    }

    /// Send file contents read by the driver.
    pub fn send_file(
        &mut self,
        filename: String,
        data: Vec<u8>,
        password: Option<String>,
    ) -> Vec<AppEvent> {
        let protected = password.as_deref().is_some_and(|p| !p.is_empty());
        let result = self.session.handle(SessionEvent::SendFile {
            filename: filename.clone(),
            data,
            password,
        });
        let mut events = self.handle_session_result(result);
        if !events.iter().any(|e| matches!(e, AppEvent::Error { .. })) {
            events.push(AppEvent::FileSent { filename, protected });
        }
        events
    }

    /// Tear the identity down.
    pub fn destroy(&mut self) -> Vec<AppEvent> {
        let result = self.session.handle(SessionEvent::Destroy);
        self.handle_session_result(result)
    }

    /// Take pending outgoing frames.
    pub fn take_outgoing(&mut self) -> Vec<ClientFrame> {
        std::mem::take(&mut self.outgoing)
    }

    fn peer_entries(&self) -> Vec<PeerEntry> {
        let open = self
            .session
            .registry()
            .iter()
            .map(|c| PeerEntry { peer: c.peer().clone(), open: true });
        let connecting = self
            .session
            .pending_peers()
            .map(|peer| PeerEntry { peer: peer.clone(), open: false });
        open.chain(connecting).collect()
    }

    fn handle_session_result(
        &mut self,
        result: Result<Vec<SessionAction>, SessionError>,
    ) -> Vec<AppEvent> {
        match result {
            Ok(actions) => self.process_session_actions(actions),
            Err(e) => vec![AppEvent::Error { message: e.to_string() }],
        }
    }

    fn process_session_actions(&mut self, actions: Vec<SessionAction>) -> Vec<AppEvent> {
        let mut events = Vec::new();

        for action in actions {
            if let Some(frame) = action_to_frame(&action) {
                self.outgoing.push(frame);
                continue;
            }

            match action {
                SessionAction::DestroyIdentity => {
                    tracing::debug!("session requested identity teardown");
                    self.destroyed = true;
                },
                SessionAction::Notify(notice) => events.push(AppEvent::Notice(notice)),
                SessionAction::DeliverText { from, text } => {
                    events.push(AppEvent::TextReceived { from, text });
                },
                SessionAction::DeliverAudio { from, mime_type, data } => {
                    events.push(AppEvent::AudioReceived { from, mime_type, data });
                },
                SessionAction::DeliverFile { from, filename, data } => {
                    events.push(AppEvent::FileReceived { from, filename, data });
                },
                SessionAction::ProtectedFileReceived(file) => {
                    events.push(AppEvent::ProtectedFileReceived(file));
                },
                SessionAction::Connect { .. }
                | SessionAction::Disconnect { .. }
                | SessionAction::Send { .. } => {},
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use kqsp_client::{IncomingFile, Notice, PeerId, WirePayload};

    use super::*;

    const LOCAL: &str = "kqsp-cli-10-0-0-1-aaaa";
    const REMOTE: &str = "kqsp-cli-10-0-0-2-bbbb";

    fn bridge() -> Bridge {
        Bridge::new(DisplayAddress::from_octets([10, 0, 0, 1]), SessionConfig::default())
    }

    fn connected() -> Bridge {
        let mut bridge = bridge();
        bridge.handle_session_event(SessionEvent::IdentityOpened { id: PeerId::from(LOCAL) });
        bridge.handle_session_event(SessionEvent::ConnectionOpened { peer: PeerId::from(REMOTE) });
        bridge
    }

    #[test]
    fn identity_ready_reaches_app() {
        let mut bridge = bridge();
        let events =
            bridge.handle_session_event(SessionEvent::IdentityOpened { id: PeerId::from(LOCAL) });

        assert!(matches!(
            events.as_slice(),
            [AppEvent::Notice(Notice::IdentityReady { display, .. })] if display == "K(10.0.0.1)"
        ));
    }

    #[test]
    fn send_text_queues_frame_and_echoes() {
        let mut bridge = connected();
        let events = bridge.process_app_action(AppAction::SendText { text: "hi".into() });

        assert_eq!(events, vec![AppEvent::TextSent { text: "hi".into() }]);
        let frames = bridge.take_outgoing();
        assert!(matches!(
            frames.as_slice(),
            [ClientFrame::Data { peer, payload: WirePayload::Text(_) }] if peer == REMOTE
        ));
        assert!(bridge.take_outgoing().is_empty());
    }

    #[test]
    fn disconnect_queues_relay_frame() {
        let mut bridge = connected();

        let peer = PeerId::from(REMOTE);
        let events = bridge.process_app_action(AppAction::Disconnect { peer });

        assert_eq!(bridge.take_outgoing(), vec![ClientFrame::Disconnect { peer: REMOTE.into() }]);
        assert!(matches!(
            events.as_slice(),
            [AppEvent::Notice(Notice::PeerDisconnected { connections: 0, .. })]
        ));
        assert!(bridge.session().registry().is_empty());
    }

    #[test]
    fn send_without_links_is_an_error() {
        let mut bridge = bridge();
        bridge.handle_session_event(SessionEvent::IdentityOpened { id: PeerId::from(LOCAL) });

        let events = bridge.process_app_action(AppAction::SendText { text: "hi".into() });

        assert!(matches!(events.as_slice(), [AppEvent::Error { .. }]));
        assert!(bridge.take_outgoing().is_empty());
    }

    #[test]
    fn connect_queues_relay_frame() {
        let mut bridge = bridge();
        bridge.handle_session_event(SessionEvent::IdentityOpened { id: PeerId::from(LOCAL) });

        bridge.process_app_action(AppAction::Connect { peer: PeerId::from(REMOTE) });

        assert_eq!(bridge.take_outgoing(), vec![ClientFrame::Connect { peer: REMOTE.into() }]);
        let peers = bridge.process_app_action(AppAction::ListPeers);
        assert_eq!(peers, vec![AppEvent::Peers(vec![PeerEntry {
            peer: PeerId::from(REMOTE),
            open: false
        }])]);
    }

    #[test]
    fn file_send_echoes_protection() {
        let mut bridge = connected();
        let events = bridge.send_file("a.txt".into(), b"abc".to_vec(), Some("pw".into()));

        assert_eq!(events, vec![AppEvent::FileSent { filename: "a.txt".into(), protected: true }]);
        assert_eq!(bridge.take_outgoing().len(), 1);
    }

    #[test]
    fn unlock_checks_password() {
        let bridge_cipher = XorCipher;
        let envelope = FileTransferCodec::encode_file(
            &bridge_cipher,
            b"top secret",
            None,
            Some("pw"),
            "s.txt",
            "K(1.1.1.1)",
        );
        let file = IncomingFile::from_envelope(&envelope).unwrap();
        let mut bridge = bridge();

        let retry = AppAction::UnlockFile { file: file.clone(), password: "no".into() };
        let wrong = bridge.process_app_action(retry);
        let right =
            bridge.process_app_action(AppAction::UnlockFile { file, password: "pw".into() });

        assert_eq!(wrong, vec![AppEvent::WrongPassword]);
        assert_eq!(right, vec![AppEvent::FileUnlocked { data: b"top secret".to_vec() }]);
    }

    #[test]
    fn destroy_marks_bridge() {
        let mut bridge = connected();
        let events = bridge.destroy();

        assert!(bridge.is_destroyed());
        assert_eq!(events, vec![AppEvent::Notice(Notice::IdentityClosed)]);
    }
}
