//! Peer identities.
//!
//! A peer has two names. The [`PeerId`] is what the transport routes on and
//! what goes into the group secret. The [`DisplayAddress`] is a short label
//! shown to humans and stamped on outgoing messages as the sender. Display
//! addresses may collide and are never used for routing.

use std::{borrow::Borrow, fmt};

use crate::{env::Environment, error::ConnectionError};

/// Prefix of generated peer ids.
pub const PEER_ID_PREFIX: &str = "kqsp-cli";

const SUFFIX_LEN: usize = 4;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Transport-level peer identifier.
///
/// Opaque and unique per running process. Ordered by UTF-8 bytes, which is
/// the order used for group secret derivation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap an identifier assigned by the transport.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id of the form `kqsp-cli-a-b-c-d-xxxx`.
    ///
    /// `a.b.c.d` are the octets of `display`, `xxxx` is a random base-36
    /// suffix that separates processes which drew the same octets.
    pub fn generate<E: Environment>(env: &E, display: &DisplayAddress) -> Self {
        let mut raw = [0u8; SUFFIX_LEN];
        env.random_bytes(&mut raw);
        let suffix: String =
            raw.iter().map(|b| char::from(BASE36[usize::from(*b) % BASE36.len()])).collect();

        let [a, b, c, d] = display.octets();
        Self(format!("{PEER_ID_PREFIX}-{a}-{b}-{c}-{d}-{suffix}"))
    }

    /// Parse a connect target typed or pasted by a user.
    ///
    /// Surrounding whitespace is trimmed and a `K( … )` wrapper is removed.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidPeerId` if nothing remains
    pub fn parse_target(input: &str) -> Result<Self, ConnectionError> {
        let trimmed = input.trim();
        let unwrapped = trimmed
            .strip_prefix("K(")
            .and_then(|rest| rest.strip_suffix(')'))
            .map_or(trimmed, str::trim);

        if unwrapped.is_empty() {
            return Err(ConnectionError::InvalidPeerId { input: input.to_owned() });
        }
        Ok(Self(unwrapped.to_owned()))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PeerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Human-facing sender label, rendered `K(a.b.c.d)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayAddress([u8; 4]);

impl DisplayAddress {
    /// Build from four octets.
    pub fn from_octets(octets: [u8; 4]) -> Self {
        Self(octets)
    }

    /// Draw four random octets.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let mut octets = [0u8; 4];
        env.random_bytes(&mut octets);
        Self(octets)
    }

    /// The four octets.
    #[must_use]
    pub fn octets(&self) -> [u8; 4] {
        self.0
    }
}

impl fmt::Display for DisplayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "K({a}.{b}.{c}.{d})")
    }
}
