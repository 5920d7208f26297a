//! Application layer for KQSP chat
//!
//! Pure state machines and generic runtime for UI and session orchestration,
//! enabling deterministic simulation testing with the same code that runs in
//! the terminal client.
//!
//! # Components
//!
//! - [`App`]: transcript state machine (commands, password prompts, echo)
//! - [`Bridge`]: session bridge (translates App actions to session events)
//! - [`Driver`]: trait for platform-specific I/O abstraction
//! - [`Runtime`]: generic orchestration loop using Driver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod app;
mod bridge;
mod command;
mod driver;
mod event;
mod runtime;
mod state;

pub use action::AppAction;
pub use app::App;
pub use bridge::Bridge;
pub use command::{Command, CommandError, HELP};
pub use driver::{Driver, DriverEvent};
pub use event::AppEvent;
pub use runtime::Runtime;
pub use state::{LineKind, PeerEntry, TranscriptLine, audio_extension, safe_filename};
