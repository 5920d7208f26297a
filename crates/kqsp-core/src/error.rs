//! Error types for connection bookkeeping.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors from the connection state machine, registry and identity parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: String,
    },

    /// The local peer tried to register a link to itself
    #[error("cannot connect to own peer id {peer}")]
    SelfConnection {
        /// The local peer id
        peer: String,
    },

    /// A link to this peer is already registered
    #[error("peer {peer} is already connected")]
    AlreadyRegistered {
        /// The duplicate peer id
        peer: String,
    },

    /// User input did not contain a peer id
    #[error("invalid peer id: {input:?}")]
    InvalidPeerId {
        /// Raw input as typed
        input: String,
    },
}
