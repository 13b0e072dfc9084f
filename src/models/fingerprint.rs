use std::fmt;

use sha2::{Digest, Sha256};

/// Digest length in bytes; fingerprints are rendered as twice as many hex characters.
const DIGEST_BYTES: usize = 16;

/// Dedup identity of one feed item: a 128-bit digest, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest of `parts` concatenated, namespaced by `salt`.
    pub fn compute<'a>(salt: &str, parts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(b"\0");
        for part in parts {
            hasher.update(part.as_bytes());
        }
        Fingerprint(hex::encode(&hasher.finalize()[..DIGEST_BYTES]))
    }

    /// Wraps a value read back from the store.
    pub fn from_stored(hex: String) -> Self {
        Fingerprint(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Fingerprint(value.to_string())
    }
}
