//! Stream protocol error types.
//!
//! Every failure is returned to the immediate caller as a value. None of
//! them mutate assembler state: a rejected chunk leaves its stream (and
//! every other stream) exactly as it was.

use thiserror::Error;

use crate::core::pipeline::assembler::Progress;

/// Field-level validation failures for a decoded chunk record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidField {
    /// Stream id missing or empty after trimming.
    #[error("stream id is missing or empty")]
    EmptyStreamId,

    /// Sequence or total missing, not numeric, or not finite.
    #[error("sequence and total must be finite numbers")]
    NonFiniteNumber,

    /// Payload fragment missing or not a non-empty string.
    #[error("data must be a non-empty string")]
    EmptyData,

    /// Sequence is negative, fractional or out of range.
    #[error("sequence must be a non-negative integer")]
    InvalidSequence,

    /// Total is zero, negative, fractional or out of range.
    #[error("total must be a positive integer")]
    InvalidTotal,
}

/// Chunk Parser errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Raw text is not a well-formed structured record.
    #[error("malformed chunk: {reason}")]
    Malformed {
        /// Why deserialization failed.
        reason: String,
    },

    /// Record parsed but failed field validation.
    #[error("invalid chunk format: {0}")]
    InvalidFormat(#[from] InvalidField),
}

/// Errors from ingesting one raw chunk into the assembler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    /// The raw payload could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Declared total conflicts with the total fixed for the stream.
    #[error("total mismatch for stream {stream_id}: expected {expected}, got {got}")]
    Mismatch {
        /// Stream the chunk claimed to belong to.
        stream_id: String,
        /// Total fixed when the stream was first observed.
        expected: u32,
        /// Total declared by the rejected chunk.
        got: u32,
    },

    /// Sequence index lies outside `[0, total)`.
    #[error("sequence {sequence} out of range for stream {stream_id} with {total} chunks")]
    SequenceOutOfRange {
        /// Stream the chunk claimed to belong to.
        stream_id: String,
        /// Offending sequence index.
        sequence: u32,
        /// Declared total.
        total: u32,
    },

    /// A checksum verifier rejected the fragment.
    #[error("checksum mismatch for stream {stream_id} at sequence {sequence}")]
    ChecksumMismatch {
        /// Stream the chunk claimed to belong to.
        stream_id: String,
        /// Sequence index of the rejected chunk.
        sequence: u32,
    },
}

/// Reconstruction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructError {
    /// No stream is tracked under this id.
    #[error("unknown stream: {stream_id}")]
    NotFound {
        /// Requested stream id.
        stream_id: String,
    },

    /// Not every chunk has been received.
    #[error("stream incomplete: {} of {} chunks received", .progress.received, .progress.total)]
    Incomplete {
        /// Receipt state at the time of the request.
        progress: Progress,
    },

    /// A fragment is absent even though the stream reported complete.
    #[error("missing chunk at sequence {sequence}")]
    MissingChunk {
        /// First absent sequence index.
        sequence: u32,
    },

    /// The concatenated fragments are not valid base64.
    #[error("transport decode failed: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Producer-side errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// An empty payload cannot produce a non-empty fragment.
    #[error("cannot encode empty payload")]
    EmptyPayload,

    /// Fragment size must be at least one character.
    #[error("fragment size must be greater than zero")]
    ZeroFragmentSize,

    /// Payload would need more chunks than a sequence index can address.
    #[error("payload needs {chunks} chunks, more than the protocol can index")]
    TooManyChunks {
        /// Number of fragments the payload would need.
        chunks: usize,
    },
}
