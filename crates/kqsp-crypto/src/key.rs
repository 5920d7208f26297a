//! Fixed-size secret key material.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of every derived key in bytes (SHA-256 output).
pub const SECRET_KEY_SIZE: usize = 32;

/// A 32-byte symmetric key.
///
/// Used both for the membership-derived group secret and for
/// password-derived file keys. The bytes are zeroized on drop and never
/// printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; SECRET_KEY_SIZE]);

impl SecretKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_SIZE] {
        &self.0
    }

    /// Short non-secret fingerprint for logs (first 4 bytes, hex).
    ///
    /// Peers that derived the same secret print the same fingerprint, which
    /// makes membership divergence visible without leaking the key.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl AsRef<[u8]> for SecretKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretKey").field(&"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let key = SecretKey::from_bytes([0xAB; SECRET_KEY_SIZE]);
        let rendered = format!("{key:?}");

        assert!(!rendered.contains("ab"), "key bytes leaked: {rendered}");
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn fingerprint_is_first_four_bytes() {
        let mut bytes = [0u8; SECRET_KEY_SIZE];
        bytes[..4].copy_from_slice(&[0x04, 0x73, 0xef, 0x2d]);

        assert_eq!(SecretKey::from_bytes(bytes).fingerprint(), "0473ef2d");
    }
}
