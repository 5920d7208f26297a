//! KQSP protocol core.
//!
//! Sans-IO building blocks shared by every peer:
//!
//! - [`Environment`]: injected randomness, so identities are reproducible
//!   under a seeded simulation.
//! - [`PeerId`] and [`DisplayAddress`]: the routing identifier assigned at
//!   startup and the human-facing `K(a.b.c.d)` label.
//! - [`Connection`]: the per-link `Connecting → Open → Closed` state machine.
//! - [`ConnectionRegistry`]: the set of open links, keyed by peer id, whose
//!   snapshot feeds group secret derivation.
//!
//! Nothing in this crate performs I/O or holds keys.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;
pub mod identity;
pub mod registry;

pub use connection::{Connection, ConnectionHandle, ConnectionState, Direction};
pub use env::Environment;
pub use error::ConnectionError;
pub use identity::{DisplayAddress, PeerId};
pub use registry::ConnectionRegistry;
