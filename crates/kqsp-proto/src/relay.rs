//! Relay frames.
//!
//! The relay stands in for the signaling service: it maps registered peer
//! ids to client sessions and forwards [`WirePayload`]s over logical links.
//! Frames are JSON objects, one per line, tagged by `op`.
//!
//! ```text
//! client                      relay                      peer
//!   │ register{id}             │                          │
//!   │─────────────────────────►│                          │
//!   │◄──────── registered{id}  │                          │
//!   │ connect{peer}            │                          │
//!   │─────────────────────────►│ incoming{peer}           │
//!   │                          │─────────────────────────►│
//!   │◄──────────── opened{peer}│                          │
//!   │ data{peer,payload}       │ data{peer,payload}       │
//!   │─────────────────────────►│─────────────────────────►│
//! ```

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    envelope::MAX_ENVELOPE_SIZE,
    errors::{ProtocolError, Result},
    wire::WirePayload,
};

/// Longest relay line accepted, including framing overhead.
///
/// JSON renders binary payloads as number arrays, so this allows up to four
/// text bytes per payload byte.
pub const MAX_LINE_SIZE: usize = MAX_ENVELOPE_SIZE * 4 + 1024;

/// Relay error kind: the requested id is already registered.
pub const ERROR_UNAVAILABLE_ID: &str = "unavailable-id";
/// Relay error kind: the relay is at capacity.
pub const ERROR_SERVER: &str = "server-error";
/// Relay error kind: the frame is not valid in the current state.
pub const ERROR_INVALID_FRAME: &str = "invalid-frame";

/// Client to relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// Claim a peer id for this session.
    Register {
        /// Requested peer id
        id: String,
    },
    /// Open a link to another registered peer.
    Connect {
        /// Target peer id
        peer: String,
    },
    /// Forward a payload over an open link.
    Data {
        /// Destination peer id
        peer: String,
        /// Opaque payload
        payload: WirePayload,
    },
    /// Close a link.
    Disconnect {
        /// Peer id of the link to close
        peer: String,
    },
}

/// Relay to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// Registration accepted.
    Registered {
        /// Registered peer id
        id: String,
    },
    /// Session-level failure.
    Error {
        /// Machine-readable kind (`unavailable-id`, `server-error`, ...)
        kind: String,
        /// Human-readable detail
        message: String,
    },
    /// A remote peer opened a link to this session.
    Incoming {
        /// Remote peer id
        peer: String,
    },
    /// A link is open for traffic (both ends receive this).
    Opened {
        /// Remote peer id
        peer: String,
    },
    /// Payload forwarded from a remote peer.
    Data {
        /// Sending peer id
        peer: String,
        /// Opaque payload
        payload: WirePayload,
    },
    /// A link closed.
    Closed {
        /// Remote peer id
        peer: String,
    },
    /// A link could not be opened or failed.
    ConnectionError {
        /// Remote peer id
        peer: String,
        /// Human-readable detail
        message: String,
    },
}

/// Encode a frame as one JSON line, newline included.
pub fn encode_line<T: Serialize>(frame: &T) -> Result<String> {
    let mut line =
        serde_json::to_string(frame).map_err(|e| ProtocolError::JsonEncode(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Decode one JSON line. Surrounding whitespace is ignored.
///
/// # Errors
///
/// - `ProtocolError::PayloadTooLarge` if the line exceeds [`MAX_LINE_SIZE`]
/// - `ProtocolError::JsonDecode` if the line is not a valid frame
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T> {
    if line.len() > MAX_LINE_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size: line.len(), max: MAX_LINE_SIZE });
    }
    serde_json::from_str(line.trim()).map_err(|e| ProtocolError::JsonDecode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_line_shape() {
        let frame = ClientFrame::Register { id: "kqsp-cli-1-2-3-4-abcd".into() };
        let line = encode_line(&frame).unwrap();
        assert_eq!(line, "{\"op\":\"register\",\"id\":\"kqsp-cli-1-2-3-4-abcd\"}\n");
    }

    #[test]
    fn connection_error_uses_kebab_case_op() {
        let line = encode_line(&ServerFrame::ConnectionError {
            peer: "b".into(),
            message: "peer not found".into(),
        })
        .unwrap();
        assert!(line.starts_with("{\"op\":\"connection-error\""), "{line}");
    }

    #[test]
    fn data_frame_round_trips() {
        let frame = ServerFrame::Data {
            peer: "a".into(),
            payload: WirePayload::Binary(vec![1, 2, 3]),
        };
        let decoded: ServerFrame = decode_line(&encode_line(&frame).unwrap()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn unknown_op_is_rejected() {
        let err = decode_line::<ClientFrame>(r#"{"op":"pair","id":"x"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::JsonDecode(_)));
    }
}
