//! Client
//!
//! Action-based session state machine for KQSP group chat. Tracks the local
//! identity, the set of open peer links and the group secret derived from
//! that set, and turns application intents into ciphered envelopes.
//!
//! # Architecture
//!
//! Sans-IO, like [`kqsp_core`]. The caller feeds [`SessionEvent`]s (transport
//! notifications and application intents) into [`SessionManager::handle`]
//! one at a time and executes the returned [`SessionAction`]s. Because
//! events are processed strictly in order by one owner, every group secret
//! published for a registry change is in place before the next event is
//! decoded.
//!
//! # Components
//!
//! - [`SessionManager`]: identity lifecycle, connection registry, keying
//! - [`MessageCodec`]: text, system and audio envelopes
//! - [`FileTransferCodec`]: file envelopes, optional password key and
//!   magic-header check
//! - [`SessionEvent`] / [`SessionAction`]: the state machine's inputs and
//!   outputs
//! - [`bridge`]: relay frame to event, and action to relay frame
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides
//! [`transport::connect`], a TCP client for the line-delimited relay that
//! translates relay frames into [`SessionEvent`]s.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bridge;
mod codec;
mod error;
mod event;
mod file_transfer;
mod session;

#[cfg(feature = "transport")]
pub mod transport;

pub use codec::{DecodedMessage, MessageCodec};
pub use error::{DecodeError, SessionError};
pub use event::{IdentityErrorKind, Notice, SessionAction, SessionEvent};
pub use file_transfer::{
    FileOutcome, FileTransferCodec, IncomingFile, PasswordPrompt, PromptRequest,
};
pub use kqsp_core::{ConnectionHandle, DisplayAddress, Environment, PeerId};
pub use kqsp_crypto::{Cipher, SecretKey, XorCipher};
pub use kqsp_proto::WirePayload;
pub use session::{IdentityState, SessionConfig, SessionManager};
