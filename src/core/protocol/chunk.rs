//! Chunk records and receipt tracking.
//!
//! Each scanned symbol carries one chunk:
//! - stream_id: groups chunks belonging to one logical transfer
//! - sequence: zero-based position within the stream
//! - total: declared chunk count for the stream
//! - data: base64 fragment of the transport-encoded payload
//! - checksum: optional per-chunk integrity value
//!
//! The receiver tracks which indices it holds with a [`ChunkBitmap`] and
//! keeps the fragments themselves in an ordered map.

use serde::{Deserialize, Serialize};

/// A validated, normalized chunk produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Stream id, trimmed and non-empty.
    pub stream_id: String,
    /// Zero-based index within the stream.
    pub sequence: u32,
    /// Declared number of chunks in the stream (> 0).
    pub total: u32,
    /// Transport-encoded fragment (non-empty).
    pub data: String,
    /// Optional integrity value supplied by the producer.
    pub checksum: Option<String>,
}

/// Canonical wire representation emitted by the producer, one per symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireChunk {
    pub id: String,
    pub seq: u32,
    pub total: u32,
    pub data: String,
    pub checksum: Option<String>,
}

impl WireChunk {
    /// Serialize to the JSON text that goes into a symbol.
    pub fn to_json(&self) -> String {
        // A struct of strings and integers cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<Chunk> for WireChunk {
    fn from(chunk: Chunk) -> Self {
        Self {
            id: chunk.stream_id,
            seq: chunk.sequence,
            total: chunk.total,
            data: chunk.data,
            checksum: chunk.checksum,
        }
    }
}

/// Presence bitmap for received chunk indices.
///
/// Words are allocated up to the highest index seen rather than up to
/// `total_chunks`, so a symbol declaring an enormous total costs nothing
/// until chunks near the end actually arrive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkBitmap {
    /// Number of total chunks.
    pub total_chunks: u32,
    /// Bit vector: bit i is set if chunk i has been received.
    bits: Vec<u64>,
    /// Cached popcount.
    count: u32,
}

impl ChunkBitmap {
    pub fn new(total_chunks: u32) -> Self {
        Self {
            total_chunks,
            bits: Vec::new(),
            count: 0,
        }
    }

    /// Mark a chunk as received. Returns `false` if it was already set
    /// or lies outside the stream.
    pub fn set(&mut self, index: u32) -> bool {
        if index >= self.total_chunks || self.is_set(index) {
            return false;
        }
        let word = (index / 64) as usize;
        if word >= self.bits.len() {
            self.bits.resize(word + 1, 0);
        }
        self.bits[word] |= 1u64 << (index % 64);
        self.count += 1;
        true
    }

    /// Check if a chunk has been received.
    pub fn is_set(&self, index: u32) -> bool {
        if index >= self.total_chunks {
            return false;
        }
        self.bits
            .get((index / 64) as usize)
            .is_some_and(|w| (w >> (index % 64)) & 1 == 1)
    }

    /// Count of received chunks.
    pub fn received_count(&self) -> u32 {
        self.count
    }

    /// Check if all chunks have been received.
    pub fn is_complete(&self) -> bool {
        self.count == self.total_chunks
    }

    /// Ascending list of indices in `[0, total_chunks)` not yet received.
    ///
    /// Recomputed on every call; O(total_chunks).
    pub fn missing_chunks(&self) -> Vec<u32> {
        (0..self.total_chunks)
            .filter(|i| !self.is_set(*i))
            .collect()
    }
}
