//! Pseudo-anonymous caller identity
//!
//! Raw IPs are never stored; votes and posts carry a salted SHA-256 digest
//! instead. This is for coarse deduplication only, not authentication.

use sha2::{Digest, Sha256};

/// Hex characters kept from the digest
const HASH_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct IdentityHasher {
    salt: String,
}

impl IdentityHasher {
    pub fn new(salt: &str) -> Self {
        Self {
            salt: salt.to_string(),
        }
    }

    pub fn hash(&self, ip: &str) -> String {
        let ip = ip.trim();
        let ip = if ip.is_empty() { "unknown" } else { ip };

        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(b":");
        hasher.update(ip.as_bytes());
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(HASH_LEN);
        digest
    }
}
