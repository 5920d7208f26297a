//! Session events and actions.

use std::fmt;

use kqsp_core::{ConnectionHandle, PeerId};
use kqsp_proto::WirePayload;

use crate::{error::DecodeError, file_transfer::IncomingFile};

/// Category of a signaling failure reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityErrorKind {
    /// Requested peer id is taken. Terminal.
    UnavailableId,
    /// Signaling connection dropped.
    Network,
    /// Signaling server failed.
    ServerError,
    /// Anything else, kept verbatim.
    Other(String),
}

impl IdentityErrorKind {
    /// Parse the transport's error type string.
    pub fn parse(kind: &str) -> Self {
        match kind {
            "unavailable-id" => Self::UnavailableId,
            "network" => Self::Network,
            "server-error" => Self::ServerError,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Whether the identity cannot recover from this error.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::UnavailableId)
    }

    /// Whether this error means signaling is lost but may come back.
    #[must_use]
    pub fn is_signaling_loss(&self) -> bool {
        matches!(self, Self::Network | Self::ServerError)
    }
}

impl fmt::Display for IdentityErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnavailableId => f.write_str("unavailable-id"),
            Self::Network => f.write_str("network"),
            Self::ServerError => f.write_str("server-error"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

/// Events the caller feeds into the session.
///
/// Transport notifications and application intents share one queue, so the
/// session observes them in a single total order.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Signaling is up and the transport assigned the local peer id.
    IdentityOpened {
        /// Local peer id
        id: PeerId,
    },

    /// Signaling connection dropped. The transport is reconnecting.
    IdentityDisconnected,

    /// Local identity destroyed. Terminal.
    IdentityClosed,

    /// Signaling error.
    IdentityError {
        /// Parsed error category
        kind: IdentityErrorKind,
        /// Transport's message
        message: String,
    },

    /// A remote peer is opening a link to us.
    IncomingConnection {
        /// Remote peer id
        peer: PeerId,
    },

    /// A link (either direction) is open for traffic.
    ConnectionOpened {
        /// Remote peer id
        peer: PeerId,
    },

    /// Payload arrived on a link.
    DataReceived {
        /// Sending peer id
        peer: PeerId,
        /// Raw payload
        payload: WirePayload,
    },

    /// A link closed.
    ConnectionClosed {
        /// Remote peer id
        peer: PeerId,
    },

    /// A link failed.
    ConnectionError {
        /// Remote peer id
        peer: PeerId,
        /// Transport's message
        message: String,
    },

    /// Application wants to open a link.
    Connect {
        /// Target peer id
        peer: PeerId,
    },

    /// Application wants to close a link.
    Disconnect {
        /// Peer id of the link to close
        peer: PeerId,
    },

    /// Application wants to send chat text to every open link.
    SendText {
        /// Plaintext
        text: String,
    },

    /// Application wants to send a file to every open link.
    SendFile {
        /// File name shown to receivers
        filename: String,
        /// File contents
        data: Vec<u8>,
        /// Optional password. Empty means unprotected.
        password: Option<String>,
    },

    /// Application wants to send an audio clip to every open link.
    SendAudio {
        /// Media type, e.g. `audio/webm`
        mime_type: String,
        /// Encoded audio
        data: Vec<u8>,
    },

    /// Application is shutting down the identity.
    Destroy,
}

/// User-facing status line produced by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Identity established.
    IdentityReady {
        /// Local peer id
        id: PeerId,
        /// Local display address
        display: String,
    },
    /// Signaling lost; data links stay up.
    SignalingLost,
    /// Signaling came back.
    SignalingRestored,
    /// Identity destroyed.
    IdentityClosed,
    /// Signaling error.
    IdentityError {
        /// Error category
        kind: IdentityErrorKind,
        /// Transport's message
        message: String,
    },
    /// A peer is connecting to us.
    IncomingPeer {
        /// Remote peer id
        peer: PeerId,
    },
    /// Link open and the group re-keyed.
    PeerConnected {
        /// Remote peer id
        peer: PeerId,
        /// Open links after the change
        connections: usize,
    },
    /// Link closed and the group re-keyed.
    PeerDisconnected {
        /// Remote peer id
        peer: PeerId,
        /// Open links after the change
        connections: usize,
    },
    /// Link could not be opened or failed.
    ConnectionFailed {
        /// Remote peer id
        peer: PeerId,
        /// Transport's message
        message: String,
    },
    /// A transport event was ignored as inconsistent with session state.
    Ignored {
        /// What was ignored and why
        reason: String,
    },
    /// A received payload could not be decoded.
    DecodeFailed {
        /// Sending peer id
        peer: PeerId,
        /// Decode failure
        error: DecodeError,
    },
    /// A peer sent a system message.
    PeerSystemMessage {
        /// Sender display address
        from: String,
        /// Deciphered text
        text: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentityReady { id, display } => {
                write!(f, "Ready. Your K(addr): {display}  Peer ID: {id}")
            },
            Self::SignalingLost => f.write_str("Disconnected from signaling server, reconnecting"),
            Self::SignalingRestored => f.write_str("Reconnected to signaling server"),
            Self::IdentityClosed => f.write_str("Connection destroyed"),
            Self::IdentityError { kind, message } => write!(f, "Error ({kind}): {message}"),
            Self::IncomingPeer { peer } => write!(f, "Incoming connection from {peer}"),
            Self::PeerConnected { peer, connections } => {
                write!(f, "Connected to {peer} ({connections} connected)")
            },
            Self::PeerDisconnected { peer, connections } => {
                write!(f, "Connection closed with {peer} ({connections} connected)")
            },
            Self::ConnectionFailed { peer, message } => {
                write!(f, "Connection error with {peer}: {message}")
            },
            Self::Ignored { reason } => write!(f, "Ignored: {reason}"),
            Self::DecodeFailed { peer, error } => {
                write!(f, "Could not decode message from {peer}: {error}")
            },
            Self::PeerSystemMessage { from, text } => write!(f, "{from}: {text}"),
        }
    }
}

/// Actions the session produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open a transport link.
    Connect {
        /// Target peer id
        peer: PeerId,
        /// Handle allocated for the link
        handle: ConnectionHandle,
    },

    /// Close a transport link.
    Disconnect {
        /// Remote peer id
        peer: PeerId,
    },

    /// Send a payload over an open link.
    Send {
        /// Destination peer id
        peer: PeerId,
        /// Encoded envelope
        payload: WirePayload,
    },

    /// Destroy the local identity and every link.
    DestroyIdentity,

    /// Show a status line.
    Notify(Notice),

    /// Deliver deciphered chat text.
    DeliverText {
        /// Sender display address
        from: String,
        /// Plaintext (lossy UTF-8)
        text: String,
    },

    /// Deliver a deciphered audio clip.
    DeliverAudio {
        /// Sender display address
        from: String,
        /// Media type
        mime_type: String,
        /// Audio bytes
        data: Vec<u8>,
    },

    /// Deliver a deciphered unprotected file.
    DeliverFile {
        /// Sender display address
        from: String,
        /// File name as sent
        filename: String,
        /// File contents
        data: Vec<u8>,
    },

    /// A password-protected file arrived. The caller prompts for the
    /// password and decodes it with [`crate::FileTransferCodec`].
    ProtectedFileReceived(IncomingFile),
}
