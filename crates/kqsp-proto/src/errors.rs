//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from encoding or decoding wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// JSON serialization failed.
    #[error("JSON encoding failed: {0}")]
    JsonEncode(String),

    /// JSON input could not be parsed into the expected shape.
    #[error("JSON decoding failed: {0}")]
    JsonDecode(String),

    /// CBOR serialization failed.
    #[error("CBOR encoding failed: {0}")]
    CborEncode(String),

    /// CBOR input could not be parsed into the expected shape.
    #[error("CBOR decoding failed: {0}")]
    CborDecode(String),

    /// Encoded input exceeds the size limit.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Actual size in bytes
        size: usize,
        /// Maximum allowed size in bytes
        max: usize,
    },

    /// A Latin-1 carrier string contained a character above U+00FF.
    #[error("character U+{code:04X} at index {index} is not Latin-1")]
    NotLatin1 {
        /// Offending code point
        code: u32,
        /// Character index within the string
        index: usize,
    },

    /// A field required by the envelope type is absent.
    #[error("envelope field `{0}` is missing")]
    MissingField(&'static str),
}
