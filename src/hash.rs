// src/hash.rs

//! Configurable hashing for package identities and export checksums
//!
//! Two algorithms are supported:
//! - **SHA-256**: cryptographic, used for package identity fingerprints
//!   (must be stable across processes and machines)
//! - **XXH3-128**: fast non-cryptographic hash, used for export content
//!   checksums where only change detection matters

use sha2::{Digest, Sha256};
use std::fmt;
use xxhash_rust::xxh3::xxh3_128;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// SHA-256, 256-bit cryptographic hash
    #[default]
    Sha256,
    /// XXH3, 128-bit non-cryptographic hash
    Xxh3,
}

impl HashAlgorithm {
    /// Hash output length as a hex string
    #[inline]
    pub const fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Xxh3 => 32,
        }
    }

    /// Algorithm name
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Xxh3 => "xxh3",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A hash value paired with its algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hash {
    /// Algorithm used
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest
    pub value: String,
}

impl Hash {
    /// Digest as a hex string slice
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

/// Hash a byte slice with the given algorithm
pub fn hash_bytes(algorithm: HashAlgorithm, content: &[u8]) -> Hash {
    let value = match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(content);
            hex::encode(hasher.finalize())
        }
        HashAlgorithm::Xxh3 => format!("{:032x}", xxh3_128(content)),
    };
    Hash { algorithm, value }
}

/// Convenience: SHA-256 hex digest of a byte slice
pub fn sha256(content: &[u8]) -> String {
    hash_bytes(HashAlgorithm::Sha256, content).value
}

/// Convenience: XXH3-128 hex digest of a byte slice
pub fn xxh3(content: &[u8]) -> String {
    hash_bytes(HashAlgorithm::Xxh3, content).value
}
