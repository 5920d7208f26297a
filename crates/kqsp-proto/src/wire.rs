//! Transport payload carrier.

use serde::{Deserialize, Serialize};

use crate::{envelope::Envelope, errors::Result};

/// One envelope as a transport moves it.
///
/// Text transports carry the JSON string. Binary-capable transports carry
/// CBOR, which keeps file and audio bytes compact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "body", rename_all = "lowercase")]
pub enum WirePayload {
    /// JSON envelope text.
    Text(String),
    /// Binary envelope: CBOR, or JSON bytes from a binary-only transport.
    Binary(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl WirePayload {
    /// Encode an envelope, as CBOR when `binary` is set and JSON otherwise.
    pub fn encode(envelope: &Envelope, binary: bool) -> Result<Self> {
        if binary {
            envelope.to_cbor().map(Self::Binary)
        } else {
            envelope.to_json().map(Self::Text)
        }
    }

    /// Parse the carried envelope.
    ///
    /// Binary payloads are tried as CBOR first. If that fails and the bytes
    /// are valid UTF-8, they are parsed as JSON.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::JsonDecode` for unparseable text
    /// - `ProtocolError::CborDecode` for binary that is neither CBOR nor JSON
    /// - `ProtocolError::PayloadTooLarge` for oversized input
    pub fn decode(&self) -> Result<Envelope> {
        match self {
            Self::Text(json) => Envelope::from_json(json),
            Self::Binary(bytes) => Envelope::from_cbor(bytes).or_else(|cbor_err| {
                match std::str::from_utf8(bytes) {
                    Ok(json) => Envelope::from_json(json).map_err(|_| cbor_err),
                    Err(_) => Err(cbor_err),
                }
            }),
        }
    }

    /// Carried size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(json) => json.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Whether nothing is carried.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
