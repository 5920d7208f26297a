//! Deterministic simulation harness for KQSP testing.
//!
//! Seeded implementations of the Environment and Driver traits plus an
//! in-memory relay network, for reproducible multi-peer tests without
//! sockets.
//!
//! - [`SimEnv`]: seeded randomness, so identities repeat per seed
//! - [`SimNetwork`]: peers and a relay driver exchanging frames in memory
//! - [`SimDriver`]: scripted [`kqsp_app::Driver`] for runtime tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_driver;
pub mod sim_env;
pub mod sim_network;

pub use sim_driver::{SimDriver, SimDriverError};
pub use sim_env::SimEnv;
pub use sim_network::{SimNetwork, SimPeer};
