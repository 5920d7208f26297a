//! Session lifecycle manager.
//!
//! Owns the local identity state, the connection registry, the pending
//! (not yet open) links and the group secret. Every registry mutation is
//! immediately followed by re-deriving the secret from a snapshot taken
//! under the same `&mut self`, so the published secret always matches the
//! registry.
//!
//! # Identity State Machine
//!
//! ```text
//! ┌───────────────┐ identity-open ┌───────────────┐ disconnected ┌───────────────┐
//! │ Uninitialized │──────────────>│ SignalingOpen │─────────────>│ SignalingLost │
//! └───────────────┘               └───────────────┘<─────────────└───────────────┘
//!                                         │          identity-open       │
//!                                         │ closed / unavailable-id      │
//!                                         ↓                              │
//!                                 ┌─────────────────┐                    │
//!                                 │ SignalingClosed │<───────────────────┘
//!                                 └─────────────────┘
//! ```
//!
//! While `SignalingLost`, established links keep working and sends are
//! allowed. `SignalingClosed` is terminal.

use std::collections::BTreeMap;

use kqsp_core::{
    Connection, ConnectionHandle, ConnectionRegistry, DisplayAddress, Direction, PeerId,
};
use kqsp_crypto::{Cipher, KeyDeriver, SecretKey, XorCipher};
use kqsp_proto::{Envelope, WirePayload};
use tracing::{debug, info, warn};

use crate::{
    codec::{DecodedMessage, MessageCodec},
    error::{DecodeError, SessionError},
    event::{IdentityErrorKind, Notice, SessionAction, SessionEvent},
    file_transfer::{FileOutcome, FileTransferCodec, IncomingFile, PromptRequest},
};

/// Local identity state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    /// No peer id yet; nothing can be sent
    Uninitialized,
    /// Signaling connected
    SignalingOpen,
    /// Signaling dropped, transport reconnecting; links still usable
    SignalingLost,
    /// Identity destroyed; terminal
    SignalingClosed,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Send file and audio envelopes as CBOR binary rather than JSON text.
    ///
    /// Text envelopes are always JSON.
    pub binary_payloads: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { binary_payloads: true }
    }
}

/// Session state machine.
///
/// Generic over the payload [`Cipher`] so a stronger construction can
/// replace the XOR keystream without touching this type.
#[derive(Debug)]
pub struct SessionManager<C: Cipher = XorCipher> {
    config: SessionConfig,
    cipher: C,
    display: DisplayAddress,
    identity: IdentityState,
    local_id: Option<PeerId>,
    registry: ConnectionRegistry,
    pending: BTreeMap<PeerId, Connection>,
    keys: KeyDeriver,
    next_handle: u64,
}

impl SessionManager<XorCipher> {
    /// Create a session using the XOR keystream.
    pub fn new(display: DisplayAddress, config: SessionConfig) -> Self {
        Self::with_cipher(display, config, XorCipher)
    }
}

impl<C: Cipher> SessionManager<C> {
    /// Create a session with a specific cipher.
    pub fn with_cipher(display: DisplayAddress, config: SessionConfig, cipher: C) -> Self {
        Self {
            config,
            cipher,
            display,
            identity: IdentityState::Uninitialized,
            local_id: None,
            registry: ConnectionRegistry::new(),
            pending: BTreeMap::new(),
            keys: KeyDeriver::new(),
            next_handle: 0,
        }
    }

    /// Current identity state
    #[must_use]
    pub fn identity_state(&self) -> IdentityState {
        self.identity
    }

    /// Local peer id, once assigned
    #[must_use]
    pub fn local_id(&self) -> Option<&PeerId> {
        self.local_id.as_ref()
    }

    /// Local display address
    #[must_use]
    pub fn display_address(&self) -> DisplayAddress {
        self.display
    }

    /// Open links
    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Links requested or announced but not yet open
    pub fn pending_peers(&self) -> impl Iterator<Item = &PeerId> {
        self.pending.keys()
    }

    /// Currently published group secret
    #[must_use]
    pub fn group_secret(&self) -> Option<&SecretKey> {
        self.keys.current()
    }

    /// Payload cipher
    #[must_use]
    pub fn cipher(&self) -> &C {
        &self.cipher
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Only application intents fail. Transport events always succeed and
    /// report problems as [`Notice`]s.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        match event {
            SessionEvent::IdentityOpened { id } => Ok(self.handle_identity_opened(id)),
            SessionEvent::IdentityDisconnected => Ok(self.handle_identity_disconnected()),
            SessionEvent::IdentityClosed => Ok(self.handle_identity_closed()),
            SessionEvent::IdentityError { kind, message } => {
                Ok(self.handle_identity_error(kind, message))
            },
            SessionEvent::IncomingConnection { peer } => Ok(self.handle_incoming(peer)),
            SessionEvent::ConnectionOpened { peer } => Ok(self.handle_connection_opened(peer)),
            SessionEvent::DataReceived { peer, payload } => Ok(self.handle_data(&peer, &payload)),
            SessionEvent::ConnectionClosed { peer } => {
                Ok(self.handle_connection_ended(peer, None))
            },
            SessionEvent::ConnectionError { peer, message } => {
                Ok(self.handle_connection_ended(peer, Some(message)))
            },
            SessionEvent::Connect { peer } => self.handle_connect(peer),
            SessionEvent::Disconnect { peer } => self.handle_disconnect(peer),
            SessionEvent::SendText { text } => self.handle_send_text(&text),
            SessionEvent::SendFile { filename, data, password } => {
                self.handle_send_file(&filename, &data, password.as_deref())
            },
            SessionEvent::SendAudio { mime_type, data } => {
                self.handle_send_audio(&mime_type, &data)
            },
            SessionEvent::Destroy => Ok(self.handle_destroy()),
        }
    }

    fn handle_identity_opened(&mut self, id: PeerId) -> Vec<SessionAction> {
        match self.identity {
            IdentityState::SignalingClosed => {
                return vec![ignored(format!("identity {id} opened after close"))];
            },
            IdentityState::SignalingLost if self.local_id.as_ref() == Some(&id) => {
                info!(%id, pending = self.pending.len(), "signaling restored");
                self.identity = IdentityState::SignalingOpen;
                let mut actions = vec![SessionAction::Notify(Notice::SignalingRestored)];
                actions.extend(self.drop_pending("signaling restored before the link opened"));
                return actions;
            },
            IdentityState::SignalingOpen if self.local_id.as_ref() == Some(&id) => {
                return vec![ignored(format!("identity {id} already open"))];
            },
            IdentityState::Uninitialized
            | IdentityState::SignalingOpen
            | IdentityState::SignalingLost => {},
        }

        info!(%id, display = %self.display, "identity open");
        self.registry.bind_local(id.clone());
        self.pending.remove(&id);
        self.local_id = Some(id.clone());
        self.identity = IdentityState::SignalingOpen;
        self.rederive();

        vec![SessionAction::Notify(Notice::IdentityReady { id, display: self.display.to_string() })]
    }

    fn handle_identity_disconnected(&mut self) -> Vec<SessionAction> {
        if self.identity != IdentityState::SignalingOpen {
            return vec![];
        }
        warn!("signaling lost");
        self.identity = IdentityState::SignalingLost;
        vec![SessionAction::Notify(Notice::SignalingLost)]
    }

    fn handle_identity_closed(&mut self) -> Vec<SessionAction> {
        if self.identity == IdentityState::SignalingClosed {
            return vec![];
        }
        self.teardown();
        vec![SessionAction::Notify(Notice::IdentityClosed)]
    }

    fn handle_identity_error(
        &mut self,
        kind: IdentityErrorKind,
        message: String,
    ) -> Vec<SessionAction> {
        warn!(%kind, %message, "signaling error");
        let mut actions =
            vec![SessionAction::Notify(Notice::IdentityError { kind: kind.clone(), message })];

        if kind.is_terminal() {
            if self.identity != IdentityState::SignalingClosed {
                self.teardown();
                actions.push(SessionAction::DestroyIdentity);
            }
        } else if kind.is_signaling_loss() && self.identity == IdentityState::SignalingOpen {
            self.identity = IdentityState::SignalingLost;
            actions.push(SessionAction::Notify(Notice::SignalingLost));
        }
        actions
    }

    fn handle_incoming(&mut self, peer: PeerId) -> Vec<SessionAction> {
        if !self.identity_usable() {
            return vec![ignored(format!("incoming connection from {peer} without identity"))];
        }
        if let Some(reason) = self.link_conflict(&peer) {
            return vec![ignored(format!("incoming connection from {peer}: {reason}"))];
        }

        info!(%peer, "incoming connection");
        let handle = self.allocate_handle();
        let connection = Connection::new(peer.clone(), handle, Direction::Inbound);
        self.pending.insert(peer.clone(), connection);
        vec![SessionAction::Notify(Notice::IncomingPeer { peer })]
    }

    fn handle_connection_opened(&mut self, peer: PeerId) -> Vec<SessionAction> {
        if !self.identity_usable() {
            return vec![ignored(format!("connection to {peer} opened without identity"))];
        }

        let mut connection = match self.pending.remove(&peer) {
            Some(connection) => connection,
            None => {
                if let Some(reason) = self.link_conflict(&peer) {
                    return vec![ignored(format!("connection to {peer} opened: {reason}"))];
                }
                let handle = self.allocate_handle();
                Connection::new(peer.clone(), handle, Direction::Inbound)
            },
        };

        if let Err(err) = connection.mark_open().and_then(|()| self.registry.insert(connection)) {
            warn!(%peer, %err, "open link rejected");
            return vec![ignored(err.to_string())];
        }

        self.rederive();
        info!(%peer, connections = self.registry.len(), "peer connected");
        vec![SessionAction::Notify(Notice::PeerConnected {
            peer,
            connections: self.registry.len(),
        })]
    }

    fn handle_connection_ended(
        &mut self,
        peer: PeerId,
        error: Option<String>,
    ) -> Vec<SessionAction> {
        if self.registry.remove(peer.as_str()).is_some() {
            self.rederive();
            info!(%peer, connections = self.registry.len(), "peer disconnected");
            let notice = match error {
                Some(message) => Notice::ConnectionFailed { peer, message },
                None => Notice::PeerDisconnected { peer, connections: self.registry.len() },
            };
            return vec![SessionAction::Notify(notice)];
        }

        if self.pending.remove(&peer).is_some() {
            debug!(%peer, "pending link discarded");
            let message = error.unwrap_or_else(|| "closed before opening".to_string());
            return vec![SessionAction::Notify(Notice::ConnectionFailed { peer, message })];
        }

        vec![]
    }

    fn handle_data(&mut self, peer: &PeerId, payload: &WirePayload) -> Vec<SessionAction> {
        if !self.registry.has(peer.as_str()) {
            return vec![ignored(format!("data from unconnected peer {peer}"))];
        }

        match self.decode_payload(payload) {
            Ok(action) => vec![action],
            Err(error) => {
                warn!(%peer, %error, "decode failed");
                vec![SessionAction::Notify(Notice::DecodeFailed { peer: peer.clone(), error })]
            },
        }
    }

    fn decode_payload(&self, payload: &WirePayload) -> Result<SessionAction, DecodeError> {
        let envelope = payload.decode()?;
        let secret = self.keys.current();

        match MessageCodec::decode(&self.cipher, &envelope, secret)? {
            DecodedMessage::Text { from, text } => Ok(SessionAction::DeliverText { from, text }),
            DecodedMessage::System { from, text } => {
                Ok(SessionAction::Notify(Notice::PeerSystemMessage { from, text }))
            },
            DecodedMessage::Audio { from, mime_type, data } => {
                Ok(SessionAction::DeliverAudio { from, mime_type, data })
            },
            DecodedMessage::File(file) if file.protected => {
                Ok(SessionAction::ProtectedFileReceived(file))
            },
            DecodedMessage::File(file) => self.decode_unprotected_file(file, secret),
        }
    }

    fn decode_unprotected_file(
        &self,
        file: IncomingFile,
        secret: Option<&SecretKey>,
    ) -> Result<SessionAction, DecodeError> {
        let mut never = |_: &PromptRequest<'_>| None;
        match FileTransferCodec::decode_file(&self.cipher, &file, secret, &mut never)? {
            FileOutcome::Decrypted(data) => {
                Ok(SessionAction::DeliverFile { from: file.from, filename: file.filename, data })
            },
            FileOutcome::Cancelled => Err(DecodeError::Malformed {
                reason: "unprotected file asked for a password".into(),
            }),
        }
    }

    fn handle_connect(&mut self, peer: PeerId) -> Result<Vec<SessionAction>, SessionError> {
        if !self.identity_usable() {
            return Err(SessionError::IdentityNotReady { state: self.identity });
        }
        if self.local_id.as_ref() == Some(&peer) {
            return Err(SessionError::SelfConnection);
        }
        if self.registry.has(peer.as_str()) || self.pending.contains_key(&peer) {
            return Err(SessionError::AlreadyConnected { peer: peer.into_string() });
        }

        info!(%peer, "connecting");
        let handle = self.allocate_handle();
        let connection = Connection::new(peer.clone(), handle, Direction::Outbound);
        self.pending.insert(peer.clone(), connection);
        Ok(vec![SessionAction::Connect { peer, handle }])
    }

    fn handle_disconnect(&mut self, peer: PeerId) -> Result<Vec<SessionAction>, SessionError> {
        if !self.identity_usable() {
            return Err(SessionError::IdentityNotReady { state: self.identity });
        }

        if self.registry.remove(peer.as_str()).is_some() {
            self.rederive();
            let connections = self.registry.len();
            info!(%peer, connections, "disconnected");
            return Ok(vec![
                SessionAction::Disconnect { peer: peer.clone() },
                SessionAction::Notify(Notice::PeerDisconnected { peer, connections }),
            ]);
        }

        if self.pending.remove(&peer).is_some() {
            debug!(%peer, "pending link abandoned");
            return Ok(vec![SessionAction::Disconnect { peer }]);
        }

        Err(SessionError::NotConnected { peer: peer.into_string() })
    }

    fn handle_send_text(&self, text: &str) -> Result<Vec<SessionAction>, SessionError> {
        let secret = self.check_can_send()?;
        let envelope =
            MessageCodec::encode_text(&self.cipher, text, Some(secret), &self.display.to_string());
        self.broadcast(&envelope, false)
    }

    fn handle_send_file(
        &self,
        filename: &str,
        data: &[u8],
        password: Option<&str>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let secret = self.check_can_send()?;
        let envelope = FileTransferCodec::encode_file(
            &self.cipher,
            data,
            Some(secret),
            password,
            filename,
            &self.display.to_string(),
        );
        self.broadcast(&envelope, self.config.binary_payloads)
    }

    fn handle_send_audio(
        &self,
        mime_type: &str,
        data: &[u8],
    ) -> Result<Vec<SessionAction>, SessionError> {
        let secret = self.check_can_send()?;
        let envelope = MessageCodec::encode_audio(
            &self.cipher,
            mime_type,
            data,
            Some(secret),
            &self.display.to_string(),
        );
        self.broadcast(&envelope, self.config.binary_payloads)
    }

    fn handle_destroy(&mut self) -> Vec<SessionAction> {
        if self.identity == IdentityState::SignalingClosed {
            return vec![];
        }
        self.teardown();
        vec![SessionAction::DestroyIdentity, SessionAction::Notify(Notice::IdentityClosed)]
    }

    /// Gate for every outgoing payload. Runs before any cipher work.
    fn check_can_send(&self) -> Result<&SecretKey, SessionError> {
        match self.identity {
            IdentityState::Uninitialized => return Err(SessionError::KeyUnavailable),
            IdentityState::SignalingClosed => {
                return Err(SessionError::IdentityNotReady { state: self.identity });
            },
            IdentityState::SignalingOpen | IdentityState::SignalingLost => {},
        }
        if self.registry.is_empty() {
            return Err(SessionError::NoConnections);
        }
        self.keys.current().ok_or(SessionError::KeyUnavailable)
    }

    fn broadcast(
        &self,
        envelope: &Envelope,
        binary: bool,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let payload = WirePayload::encode(envelope, binary)?;
        debug!(
            kind = %envelope.kind,
            size = payload.len(),
            peers = self.registry.len(),
            "broadcast"
        );

        Ok(self
            .registry
            .iter()
            .filter(|connection| connection.is_open())
            .map(|connection| SessionAction::Send {
                peer: connection.peer().clone(),
                payload: payload.clone(),
            })
            .collect())
    }

    fn rederive(&mut self) {
        let Some(local) = self.local_id.as_ref() else {
            self.keys.clear();
            return;
        };

        let peers = self.registry.peer_ids().map(PeerId::as_str);
        match self.keys.rederive(local.as_str(), peers) {
            Ok(secret) => {
                debug!(
                    members = self.registry.len() + 1,
                    fingerprint = %secret.fingerprint(),
                    "group secret derived"
                );
            },
            Err(err) => warn!(%err, "group secret derivation failed, group is keyless"),
        }
    }

    fn teardown(&mut self) {
        let dropped = self.registry.drain().len() + self.pending.len();
        self.pending.clear();
        self.keys.clear();
        self.identity = IdentityState::SignalingClosed;
        info!(dropped, "identity closed");
    }

    /// Forget links that never opened, reporting each as failed.
    fn drop_pending(&mut self, reason: &str) -> Vec<SessionAction> {
        std::mem::take(&mut self.pending)
            .into_keys()
            .map(|peer| {
                debug!(%peer, reason, "pending link dropped");
                SessionAction::Notify(Notice::ConnectionFailed { peer, message: reason.to_owned() })
            })
            .collect()
    }

    fn identity_usable(&self) -> bool {
        matches!(self.identity, IdentityState::SignalingOpen | IdentityState::SignalingLost)
    }

    fn link_conflict(&self, peer: &PeerId) -> Option<&'static str> {
        if self.local_id.as_ref() == Some(peer) {
            Some("own peer id")
        } else if self.registry.has(peer.as_str()) {
            Some("already connected")
        } else if self.pending.contains_key(peer) {
            Some("already connecting")
        } else {
            None
        }
    }

    fn allocate_handle(&mut self) -> ConnectionHandle {
        let handle = ConnectionHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

fn ignored(reason: String) -> SessionAction {
    debug!(%reason, "event ignored");
    SessionAction::Notify(Notice::Ignored { reason })
}
