//! Group secret and password key derivation using SHA-256

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::{
    error::KeyDerivationError,
    key::{SECRET_KEY_SIZE, SecretKey},
};

/// Literal prepended to password-protected file plaintext before encryption.
///
/// Only checks that the password-derived key is correct. It is not a MAC.
pub const FILE_MAGIC: [u8; 4] = *b"KQSP";

/// Canonical member list: the sorted, deduplicated union of `local_id` and
/// `peer_ids`, serialized as a compact JSON array of strings.
///
/// Sorting is by UTF-8 byte order. Duplicates (including a peer id equal to
/// `local_id`) collapse to one entry.
pub fn canonical_member_list<'a, I>(
    local_id: &'a str,
    peer_ids: I,
) -> Result<String, KeyDerivationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let members: BTreeSet<&str> = std::iter::once(local_id).chain(peer_ids).collect();
    let members: Vec<&str> = members.into_iter().collect();

    serde_json::to_string(&members).map_err(|e| KeyDerivationError::Serialization(e.to_string()))
}

/// Derive the group secret for a member set.
///
/// `SHA-256(canonical_member_list(local_id, peer_ids))`. Every peer holding
/// the same set of identifiers computes the same secret regardless of the
/// order in which they connected.
pub fn derive_group_secret<'a, I>(
    local_id: &'a str,
    peer_ids: I,
) -> Result<SecretKey, KeyDerivationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let canonical = canonical_member_list(local_id, peer_ids)?;
    Ok(digest(canonical.as_bytes()))
}

/// Derive a file key from a user-supplied password: `SHA-256(password)`.
pub fn derive_password_key(password: &str) -> SecretKey {
    digest(password.as_bytes())
}

fn digest(input: &[u8]) -> SecretKey {
    let hash = Sha256::digest(input);
    let mut bytes = [0u8; SECRET_KEY_SIZE];
    bytes.copy_from_slice(&hash);
    SecretKey::from_bytes(bytes)
}

/// Holder of the single current group secret.
///
/// The secret is `None` until the local identity is known and is replaced
/// wholesale on every [`KeyDeriver::rederive`]. There is no history: a
/// message encrypted under a previous secret is undecodable once the secret
/// moves on.
#[derive(Debug, Default)]
pub struct KeyDeriver {
    current: Option<SecretKey>,
}

impl KeyDeriver {
    /// Create a deriver with no secret.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure derivation. Equivalent to [`derive_group_secret`].
    pub fn derive<'a, I>(local_id: &'a str, peer_ids: I) -> Result<SecretKey, KeyDerivationError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        derive_group_secret(local_id, peer_ids)
    }

    /// Recompute and publish the secret for a membership snapshot.
    ///
    /// On failure the published secret is cleared, leaving the group keyless
    /// until the next successful derivation.
    pub fn rederive<'a, I>(
        &mut self,
        local_id: &'a str,
        peer_ids: I,
    ) -> Result<&SecretKey, KeyDerivationError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        match derive_group_secret(local_id, peer_ids) {
            Ok(secret) => Ok(&*self.current.insert(secret)),
            Err(err) => {
                self.current = None;
                Err(err)
            },
        }
    }

    /// The currently published secret.
    pub fn current(&self) -> Option<&SecretKey> {
        self.current.as_ref()
    }

    /// Drop the published secret.
    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_list_is_sorted_compact_json() {
        let list = canonical_member_list("b", ["c", "a"]).unwrap();
        assert_eq!(list, r#"["a","b","c"]"#);
    }

    #[test]
    fn canonical_list_dedupes_local_id() {
        let list = canonical_member_list("a", ["a", "b"]).unwrap();
        assert_eq!(list, r#"["a","b"]"#);
    }

    #[test]
    fn canonical_list_escapes_quotes() {
        let list = canonical_member_list("x\"y", []).unwrap();
        assert_eq!(list, r#"["x\"y"]"#);
    }

    #[test]
    fn derive_is_deterministic() {
        let first = derive_group_secret("alice", ["bob", "carol"]).unwrap();
        let second = derive_group_secret("alice", ["bob", "carol"]).unwrap();

        assert_eq!(first, second, "same inputs must produce same output");
    }

    #[test]
    fn derive_ignores_which_member_is_local() {
        let at_a = derive_group_secret("a", ["b"]).unwrap();
        let at_b = derive_group_secret("b", ["a"]).unwrap();

        assert_eq!(at_a, at_b);
    }

    #[test]
    fn password_key_differs_from_group_secret_of_same_string() {
        let password = derive_password_key("a");
        let group = derive_group_secret("a", []).unwrap();

        assert_ne!(password, group);
    }

    #[test]
    fn deriver_starts_keyless() {
        assert!(KeyDeriver::new().current().is_none());
    }

    #[test]
    fn rederive_replaces_secret() {
        let mut deriver = KeyDeriver::new();

        let two = deriver.rederive("a", ["b"]).unwrap().clone();
        let three = deriver.rederive("a", ["b", "c"]).unwrap().clone();

        assert_ne!(two, three);
        assert_eq!(deriver.current(), Some(&three));
    }

    #[test]
    fn clear_drops_secret() {
        let mut deriver = KeyDeriver::new();
        deriver.rederive("a", []).unwrap();

        deriver.clear();

        assert!(deriver.current().is_none());
    }
}
