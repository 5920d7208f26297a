//! KQSP relay.
//!
//! Stands in for the signaling service peers use to find each other and
//! carries their traffic over logical links. Clients speak line-delimited
//! JSON frames ([`kqsp_proto::relay`]) over TCP.
//!
//! # Architecture
//!
//! [`RelayDriver`] follows the Sans-IO pattern: it maps events to actions
//! and owns the peer id and link tables. [`RelayServer`] executes those
//! actions with Tokio sockets.
//!
//! The relay sees every payload in transit. It never holds key material, so
//! what it observes is exactly what any on-path observer sees.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod driver;
mod error;
mod server;

pub use driver::{RelayAction, RelayConfig, RelayDriver, RelayEvent, SessionId};
pub use error::RelayError;
pub use server::RelayServer;
