//! KQSP Cryptographic Primitives
//!
//! Keying building blocks for KQSP group chat. Pure functions with
//! deterministic outputs: the same member set always yields the same group
//! secret, on every peer, regardless of the order members joined in.
//!
//! # Key Lifecycle
//!
//! There is exactly one current group secret per peer. It is replaced (never
//! merged or versioned) every time the local view of the membership changes.
//!
//! ```text
//! {local id} ∪ {connected peer ids}
//!        │
//!        ▼
//! sort + dedupe → JSON array (compact)
//!        │
//!        ▼
//! SHA-256 → Group Secret (32 bytes)
//!        │
//!        ▼
//! Cipher → payload ciphertext
//! ```
//!
//! Password-protected files bypass the group secret: the file key is the
//! SHA-256 digest of the password, and a 4-byte [`FILE_MAGIC`] header lets the
//! receiver detect a wrong password.
//!
//! # Security
//!
//! The default [`XorCipher`] is a repeating-key XOR keystream with no nonce
//! and no authentication tag. It is kept for wire compatibility with existing
//! peers and carries known weaknesses:
//!
//! - Two ciphertexts under the same secret leak the XOR of their plaintexts.
//! - The group secret is a hash of identifiers that are exchanged in the
//!   clear, so anyone who knows the member list can derive it.
//! - A wrong key produces garbage plaintext for text messages, not an error.
//!
//! Everything above the [`Cipher`] trait is written against the trait, so an
//! authenticated construction can replace [`XorCipher`] without touching the
//! session or codec layers.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cipher;
mod derivation;
mod error;
mod key;

pub use cipher::{Cipher, XorCipher, apply};
pub use derivation::{
    FILE_MAGIC, KeyDeriver, canonical_member_list, derive_group_secret, derive_password_key,
};
pub use error::{CipherError, KeyDerivationError};
pub use key::{SECRET_KEY_SIZE, SecretKey};
