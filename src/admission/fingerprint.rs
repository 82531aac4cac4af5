use std::fmt;

use base64::Engine;
use sha2::{Digest, Sha256};

/// One-way token derived from a caller's network identity.
///
/// Fixed length (43 chars, URL-safe base64 of a SHA-256 digest). The raw
/// identity is never stored or logged; only this value is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub const LEN: usize = 43;

    pub fn derive(salt: &str, raw_identity: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update([0u8]);
        hasher.update(raw_identity.trim().as_bytes());
        let digest = hasher.finalize();
        Self(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest))
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
