//! Per-chunk checksum verification.
//!
//! Producers may attach a `checksum` to each chunk. The default policy is
//! [`Advisory`]: the value is carried through but never enforced. Hosts
//! that control their producer can opt into [`Sha3Verifier`], which
//! checks the lowercase hex SHA3-256 of the encoded fragment whenever a
//! checksum is present.

use sha3::{Digest, Sha3_256};

use super::chunk::Chunk;

/// Checksum verification policy applied before a chunk is stored.
pub trait ChecksumVerifier: Send + Sync {
    /// Return `false` to reject the chunk.
    fn verify(&self, chunk: &Chunk) -> bool;
}

/// Accepts every chunk, with or without a checksum.
#[derive(Debug, Clone, Copy, Default)]
pub struct Advisory;

impl ChecksumVerifier for Advisory {
    fn verify(&self, _chunk: &Chunk) -> bool {
        true
    }
}

/// Enforces `checksum == hex(sha3_256(data))` when a checksum is present.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha3Verifier;

impl ChecksumVerifier for Sha3Verifier {
    fn verify(&self, chunk: &Chunk) -> bool {
        match &chunk.checksum {
            Some(expected) => expected.eq_ignore_ascii_case(&fragment_checksum(&chunk.data)),
            None => true,
        }
    }
}

/// Lowercase hex SHA3-256 of an encoded fragment.
pub fn fragment_checksum(data: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}
