//! Error types for keying and cipher operations.

use thiserror::Error;

/// Errors from [`crate::Cipher`] implementations.
///
/// The XOR keystream never fails. The variant exists for authenticated
/// ciphers that can reject a ciphertext.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Ciphertext failed authentication or has an invalid layout.
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Why the ciphertext was rejected
        reason: String,
    },
}

/// Errors from group secret derivation.
///
/// Not expected for any string input. Callers treat the group as keyless and
/// refuse outgoing traffic when this happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyDerivationError {
    /// Member list could not be serialized to its canonical form.
    #[error("member list serialization failed: {0}")]
    Serialization(String),
}
