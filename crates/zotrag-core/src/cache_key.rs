//! Deterministic cache keys.
//!
//! A [`CacheKey`] is the blake3 digest of one or more identifiers, rendered
//! as 64 lowercase hex characters. Each identifier is hashed with a length
//! prefix, so `("a_b", "c")` and `("a", "b_c")` map to different keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed-length key addressing one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a (parent record, attachment) pair.
    ///
    /// Callers guarantee both identifiers are non-empty.
    #[must_use]
    pub fn derive(parent_id: &str, attachment_id: &str) -> Self {
        Self::from_parts(&[parent_id, attachment_id])
    }

    /// Key for a single identifier, used by per-document stages.
    #[must_use]
    pub fn for_id(id: &str) -> Self {
        Self::from_parts(&[id])
    }

    fn from_parts(parts: &[&str]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    /// The hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use uuid::Uuid;

    #[test]
    fn test_derive_is_deterministic() {
        let a = CacheKey::derive("ABCD1234", "EFGH5678");
        let b = CacheKey::derive("ABCD1234", "EFGH5678");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_is_fixed_length_hex() {
        let key = CacheKey::derive("P", "A");
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(CacheKey::for_id("P").as_str().len(), 64);
    }

    #[test]
    fn test_order_of_identifiers_matters() {
        assert_ne!(CacheKey::derive("P1", "A1"), CacheKey::derive("A1", "P1"));
    }

    #[test]
    fn test_separator_ambiguity_does_not_collide() {
        assert_ne!(CacheKey::derive("a_b", "c"), CacheKey::derive("a", "b_c"));
    }

    #[test]
    fn test_single_id_key_differs_from_pair_key() {
        assert_ne!(CacheKey::for_id("P1"), CacheKey::derive("P1", ""));
    }

    #[test]
    fn test_sampled_pairs_are_distinct_and_stable() {
        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            let parent = Uuid::new_v4().simple().to_string();
            let attachment = Uuid::new_v4().simple().to_string();
            let key = CacheKey::derive(&parent, &attachment);
            assert_eq!(key, CacheKey::derive(&parent, &attachment));
            assert!(seen.insert(key), "collision for ({parent}, {attachment})");
        }
    }

    #[test]
    fn test_display_matches_as_str() {
        let key = CacheKey::for_id("ITEM");
        assert_eq!(key.to_string(), key.as_str());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let key = CacheKey::for_id("ITEM");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{key}\""));
    }
}
