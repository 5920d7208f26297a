//! Symmetric payload cipher.

use crate::error::CipherError;

/// A symmetric transform applied to every outgoing payload.
///
/// `key = None` (or an empty key) means "no group key": implementations must
/// return the input unchanged so that a keyless peer can still exchange
/// plaintext with peers that are equally keyless.
pub trait Cipher {
    /// Encrypt `plaintext` under `key`.
    fn encrypt(&self, key: Option<&[u8]>, plaintext: &[u8]) -> Vec<u8>;

    /// Decrypt `ciphertext` under `key`.
    ///
    /// Unauthenticated ciphers never fail: a wrong key yields wrong bytes.
    fn decrypt(&self, key: Option<&[u8]>, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// Repeating-key XOR keystream.
///
/// Byte `i` of the output is `data[i] ^ key[i % key.len()]`. Involutive, so
/// encryption and decryption are the same operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XorCipher;

impl Cipher for XorCipher {
    fn encrypt(&self, key: Option<&[u8]>, plaintext: &[u8]) -> Vec<u8> {
        apply(plaintext, key)
    }

    fn decrypt(&self, key: Option<&[u8]>, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        Ok(apply(ciphertext, key))
    }
}

/// XOR `data` with `key` repeated to the length of `data`.
///
/// Returns `data` unchanged when `key` is absent or empty. Output length
/// always equals input length.
pub fn apply(data: &[u8], key: Option<&[u8]>) -> Vec<u8> {
    match key {
        Some(key) if !key.is_empty() => {
            data.iter().zip(key.iter().cycle()).map(|(byte, k)| byte ^ k).collect()
        },
        _ => data.to_vec(),
    }
}
