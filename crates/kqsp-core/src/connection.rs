//! Per-link state machine.
//!
//! One [`Connection`] exists per remote peer link, from the moment a connect
//! is requested (or an incoming request arrives) until the link closes. Only
//! links in [`ConnectionState::Open`] belong in the registry.
//!
//! # State Machine
//!
//! ```text
//! ┌────────────┐  transport open  ┌──────┐
//! │ Connecting │─────────────────>│ Open │
//! └────────────┘                  └──────┘
//!       │                             │
//!       │ close / error               │ close / error
//!       ↓                             ↓
//!   ┌────────┐                   ┌────────┐
//!   │ Closed │                   │ Closed │
//!   └────────┘                   └────────┘
//! ```
//!
//! `Closed` is terminal. A closed connection object is discarded; a later
//! reconnect to the same peer starts a fresh one.

use std::fmt;

use crate::{error::ConnectionError, identity::PeerId};

/// Opaque handle the transport uses to address one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionHandle(pub u64);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Requested, transport has not reported open yet
    Connecting,
    /// Transport reported open, traffic may flow
    Open,
    /// Closed by either side or failed
    Closed,
}

/// Who initiated the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local connect request
    Outbound,
    /// Remote peer connected to us
    Inbound,
}

/// Link to one remote peer.
#[derive(Debug, Clone)]
pub struct Connection<H = ConnectionHandle> {
    peer: PeerId,
    handle: H,
    direction: Direction,
    state: ConnectionState,
}

impl<H> Connection<H> {
    /// Create a link in [`ConnectionState::Connecting`].
    pub fn new(peer: PeerId, handle: H, direction: Direction) -> Self {
        Self { peer, handle, direction, state: ConnectionState::Connecting }
    }

    /// Remote peer id
    #[must_use]
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Transport handle
    #[must_use]
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Who initiated the link
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether traffic may flow.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Transport reported the link open.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if not in `Connecting`
    pub fn mark_open(&mut self) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::Connecting {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "open".to_string(),
            });
        }
        self.state = ConnectionState::Open;
        Ok(())
    }

    /// Close the link, from any state. Returns the state it was in.
    pub fn close(&mut self) -> ConnectionState {
        std::mem::replace(&mut self.state, ConnectionState::Closed)
    }
}
