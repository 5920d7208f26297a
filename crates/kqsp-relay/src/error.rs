//! Relay error types.

use kqsp_proto::ProtocolError;
use thiserror::Error;

use crate::driver::SessionId;

/// Errors that can occur in the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration error (invalid bind address, zero capacity).
    ///
    /// Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket failure.
    ///
    /// Fatal for the affected session only, unless raised while binding.
    #[error("transport error: {0}")]
    Transport(String),

    /// Frame could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Event referenced a session the driver never accepted.
    ///
    /// Indicates a runtime bug.
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
