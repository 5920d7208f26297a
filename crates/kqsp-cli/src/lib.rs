//! Terminal client for KQSP group chat
//!
//! A thin shell over [`kqsp_app::Driver`] that provides terminal and relay
//! I/O. All orchestration logic lives in the generic [`kqsp_app::Runtime`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod system_env;
pub mod terminal;

pub use config::ClientConfig;
pub use kqsp_app::{App, Bridge, Driver, Runtime};
pub use system_env::SystemEnv;
pub use terminal::{TerminalDriver, TerminalError};
