//! KQSP wire formats.
//!
//! Everything that crosses a process boundary is defined here:
//!
//! - [`Envelope`]: the peer-to-peer chat message. Text ciphertext travels as a
//!   Latin-1 string (one char per byte) so transports that only move text
//!   keep every byte value; file and audio ciphertext travel as raw bytes.
//! - [`WirePayload`]: what a transport actually carries for one envelope.
//!   Either a JSON string or a binary buffer (CBOR, with a JSON-over-UTF-8
//!   fallback for binary-only transports).
//! - [`relay`]: line-delimited JSON frames between a client and the minimal
//!   relay that stands in for the signaling service.
//!
//! This crate is pure data. It never looks inside ciphertext and knows
//! nothing about keys.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod envelope;
mod errors;
pub mod latin1;
pub mod relay;
mod wire;

pub use envelope::{Envelope, MAX_ENVELOPE_SIZE, MessageType};
pub use errors::{ProtocolError, Result};
pub use wire::WirePayload;
