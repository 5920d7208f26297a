//! Production Environment implementation using the OS RNG.
//!
//! `SystemEnv` draws display addresses and peer id suffixes from getrandom.
//! Truly random, not reproducible: tests use the seeded harness environment
//! instead.

use kqsp_core::Environment;

/// Production environment using cryptographic RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. A client without functioning randomness
/// cannot pick an identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}
