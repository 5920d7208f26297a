//! Session and decode errors.

use kqsp_crypto::CipherError;
use kqsp_proto::ProtocolError;
use thiserror::Error;

use crate::session::IdentityState;

/// A rejected application intent.
///
/// Returned from [`crate::SessionManager::handle`] only for intents
/// (connect, send, destroy). Transport-side failures never surface here;
/// they become [`crate::Notice`]s.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No group secret is available: the local identity has not been
    /// established, or derivation failed.
    #[error("group key unavailable: identity not established")]
    KeyUnavailable,

    /// There is no open connection to send to.
    #[error("no open connections")]
    NoConnections,

    /// The identity is not in a state that allows this intent.
    #[error("identity not ready ({state:?})")]
    IdentityNotReady {
        /// State at the time of the intent
        state: IdentityState,
    },

    /// A link to this peer is already open or being opened.
    #[error("already connected or connecting to {peer}")]
    AlreadyConnected {
        /// Target peer id
        peer: String,
    },

    /// The target is the local peer id.
    #[error("cannot connect to yourself")]
    SelfConnection,

    /// Envelope could not be encoded for the wire.
    #[error("encoding failed: {0}")]
    Protocol(#[from] ProtocolError),

    /// No link to this peer is open or being opened.
    #[error("not connected to {peer}")]
    NotConnected {
        /// Target peer id
        peer: String,
    },
}

/// Failure to decode a received envelope.
///
/// Never fatal: the session reports it and carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Envelope type tag is not one this peer handles.
    #[error("unhandled message type {kind:?}")]
    UnhandledType {
        /// Tag as received
        kind: String,
    },

    /// Password-derived key did not reveal the magic header.
    #[error("wrong password")]
    WrongPassword,

    /// Envelope is missing a field its type requires, or the field is unusable.
    #[error("malformed envelope: {reason}")]
    Malformed {
        /// What was wrong
        reason: String,
    },

    /// Payload could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    /// Cipher rejected the ciphertext.
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

impl From<ProtocolError> for DecodeError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::MissingField(_) | ProtocolError::NotLatin1 { .. } => {
                Self::Malformed { reason: err.to_string() }
            },
            other => Self::Protocol(other),
        }
    }
}
