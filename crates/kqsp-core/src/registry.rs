//! Registry of open peer links.
//!
//! Keyed by [`PeerId`] in a `BTreeMap`, so [`ConnectionRegistry::snapshot`]
//! is already in the order group secret derivation needs. The registry is
//! owned by a single session; there is no interior locking and no way to
//! mutate it except through `&mut self`, which makes every snapshot a
//! consistent point-in-time view.
//!
//! # Invariants
//!
//! - Never holds an entry for the bound local peer id.
//! - At most one entry per peer id.
//! - Every entry is a connection in [`crate::ConnectionState::Open`].

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    connection::{Connection, ConnectionHandle, Direction},
    error::ConnectionError,
    identity::PeerId,
};

/// Open links by remote peer id.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry<H = ConnectionHandle> {
    local: Option<PeerId>,
    entries: BTreeMap<PeerId, Connection<H>>,
}

impl<H> Default for ConnectionRegistry<H> {
    fn default() -> Self {
        Self { local: None, entries: BTreeMap::new() }
    }
}

impl<H> ConnectionRegistry<H> {
    /// Create an empty registry with no local id bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the local peer id. Any entry with that id is dropped.
    pub fn bind_local(&mut self, local: PeerId) {
        self.entries.remove(&local);
        self.local = Some(local);
    }

    /// The bound local peer id.
    #[must_use]
    pub fn local(&self) -> Option<&PeerId> {
        self.local.as_ref()
    }

    /// Register an open link.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::SelfConnection` if `peer` is the local id
    /// - `ConnectionError::AlreadyRegistered` if `peer` already has an entry
    pub fn add(
        &mut self,
        peer: PeerId,
        handle: H,
        direction: Direction,
    ) -> Result<(), ConnectionError> {
        let mut connection = Connection::new(peer, handle, direction);
        connection.mark_open()?;
        self.insert(connection)
    }

    /// Register a link that has just transitioned to open.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if `connection` is not open
    /// - `ConnectionError::SelfConnection` if its peer is the local id
    /// - `ConnectionError::AlreadyRegistered` if its peer already has an entry
    pub fn insert(&mut self, connection: Connection<H>) -> Result<(), ConnectionError> {
        if !connection.is_open() {
            return Err(ConnectionError::InvalidState {
                state: connection.state(),
                operation: "register".to_string(),
            });
        }
        if self.local.as_ref() == Some(connection.peer()) {
            return Err(ConnectionError::SelfConnection { peer: connection.peer().to_string() });
        }
        if self.entries.contains_key(connection.peer()) {
            return Err(ConnectionError::AlreadyRegistered { peer: connection.peer().to_string() });
        }

        self.entries.insert(connection.peer().clone(), connection);
        Ok(())
    }

    /// Remove and close the link to `peer`.
    ///
    /// Returns the removed connection, now in [`crate::ConnectionState::Closed`].
    pub fn remove(&mut self, peer: &str) -> Option<Connection<H>> {
        let mut connection = self.entries.remove(peer)?;
        connection.close();
        Some(connection)
    }

    /// Whether `peer` has an entry.
    #[must_use]
    pub fn has(&self, peer: &str) -> bool {
        self.entries.contains_key(peer)
    }

    /// Entry for `peer`.
    #[must_use]
    pub fn get(&self, peer: &str) -> Option<&Connection<H>> {
        self.entries.get(peer)
    }

    /// Sorted set of registered peer ids.
    #[must_use]
    pub fn snapshot(&self) -> BTreeSet<PeerId> {
        self.entries.keys().cloned().collect()
    }

    /// Registered peer ids in order, without cloning.
    pub fn peer_ids(&self) -> impl Iterator<Item = &PeerId> {
        self.entries.keys()
    }

    /// Entries in peer id order.
    pub fn iter(&self) -> impl Iterator<Item = &Connection<H>> {
        self.entries.values()
    }

    /// Remove and close every link.
    pub fn drain(&mut self) -> Vec<Connection<H>> {
        let entries = std::mem::take(&mut self.entries);
        entries
            .into_values()
            .map(|mut connection| {
                connection.close();
                connection
            })
            .collect()
    }

    /// Number of registered links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no links are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
