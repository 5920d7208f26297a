//! Latin-1 byte carrier.
//!
//! Maps each byte to the char with the same code point (U+0000..=U+00FF) and
//! back. Lets arbitrary ciphertext ride inside a JSON string field.

use crate::errors::{ProtocolError, Result};

/// Render bytes as a string of one char per byte.
pub fn encode(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Recover bytes from a carrier string.
///
/// # Errors
///
/// - `ProtocolError::NotLatin1` if any char is above U+00FF
pub fn decode(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .enumerate()
        .map(|(index, ch)| {
            u8::try_from(u32::from(ch))
                .map_err(|_| ProtocolError::NotLatin1 { code: u32::from(ch), index })
        })
        .collect()
}
