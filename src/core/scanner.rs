//! Scan session: optical decoder → assembler → reconstruction.
//!
//! The optical decoder is an external collaborator. It is consumed through
//! [`FrameDecoder`], which turns one captured frame into the text of one
//! symbol, reports that no symbol was present, or fails. A [`ScanSession`]
//! owns one [`StreamAssembler`] for its whole lifetime and turns each frame
//! into a [`ScanEvent`] for the surrounding UI.
//!
//! ```text
//! frame ──► FrameDecoder ──► text ──► StreamAssembler ──► ScanEvent
//!               │                          │
//!               └─ NotFound / Decoder      └─ complete? ──► reconstruct
//! ```

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::pipeline::{ChunkResult, Reconstruction, StreamAssembler};
use crate::core::protocol::{ChunkError, ReconstructError};

/// Decode-layer failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The frame contained no readable symbol.
    #[error("no symbol found in frame")]
    NotFound,

    /// Any other decoder failure.
    #[error("decoder failure: {0}")]
    Decoder(String),
}

/// One-frame-at-a-time symbol decoder.
pub trait FrameDecoder {
    type Frame: ?Sized;

    /// Decode one frame into the text of one symbol.
    fn decode(&mut self, frame: &Self::Frame) -> Result<String, FrameError>;
}

/// Decoder for frames that already carry symbol text, one per line, as
/// printed by command-line barcode readers.
///
/// A leading symbology tag such as `QR-Code:` is stripped. Blank lines
/// carry no symbol.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFrameDecoder;

impl FrameDecoder for TextFrameDecoder {
    type Frame = [u8];

    fn decode(&mut self, frame: &[u8]) -> Result<String, FrameError> {
        let text = std::str::from_utf8(frame)
            .map_err(|e| FrameError::Decoder(format!("frame is not valid UTF-8: {e}")))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(FrameError::NotFound);
        }
        Ok(strip_symbology(text).to_owned())
    }
}

/// `QR-Code:{...}` → `{...}`; anything else is returned unchanged.
fn strip_symbology(text: &str) -> &str {
    if text.starts_with('{') {
        return text;
    }
    match text.split_once(':') {
        Some((tag, rest))
            if !tag.is_empty()
                && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') =>
        {
            rest.trim_start()
        }
        _ => text,
    }
}

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// The decoder found no symbol.
    NoSymbol,
    /// A chunk was accepted or recognised as a duplicate.
    Chunk(ChunkResult),
    /// The chunk completed its stream and the payload was reconstructed.
    Completed {
        result: ChunkResult,
        reconstruction: Reconstruction,
    },
    /// The symbol text was rejected by the protocol.
    Rejected(ChunkError),
    /// The stream completed but could not be reconstructed.
    ReconstructFailed {
        stream_id: String,
        error: ReconstructError,
    },
    /// The decoder itself failed; distinct from protocol errors.
    Transport { reason: String },
}

/// Per-session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub frames: u64,
    pub symbols: u64,
    pub accepted: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub completed: u64,
    pub transport_errors: u64,
}

/// One capture session with an explicit lifetime.
pub struct ScanSession<D: FrameDecoder> {
    decoder: D,
    assembler: StreamAssembler,
    stats: ScanStats,
    /// Streams already reported as completed.
    reported: HashSet<String>,
}

impl<D: FrameDecoder> ScanSession<D> {
    pub fn new(decoder: D, assembler: StreamAssembler) -> Self {
        Self {
            decoder,
            assembler,
            stats: ScanStats::default(),
            reported: HashSet::new(),
        }
    }

    /// Decode and ingest one frame.
    pub fn handle_frame(&mut self, frame: &D::Frame) -> ScanEvent {
        self.stats.frames += 1;

        let text = match self.decoder.decode(frame) {
            Ok(text) => text,
            Err(FrameError::NotFound) => return ScanEvent::NoSymbol,
            Err(FrameError::Decoder(reason)) => {
                self.stats.transport_errors += 1;
                warn!(event = "frame_decode_failed", reason = %reason, "Decoder failed");
                return ScanEvent::Transport { reason };
            }
        };
        self.stats.symbols += 1;

        let result = match self.assembler.process_chunk(&text) {
            Ok(result) => result,
            Err(e) => {
                self.stats.rejected += 1;
                debug!(event = "symbol_rejected", error = %e, "Symbol rejected");
                return ScanEvent::Rejected(e);
            }
        };

        if result.is_duplicate() {
            self.stats.duplicates += 1;
            return ScanEvent::Chunk(result);
        }
        self.stats.accepted += 1;

        if !result.is_complete || self.reported.contains(&result.stream_id) {
            return ScanEvent::Chunk(result);
        }

        match self.assembler.reconstruct(&result.stream_id) {
            Ok(reconstruction) => {
                self.stats.completed += 1;
                self.reported.insert(result.stream_id.clone());
                info!(
                    event = "stream_reconstructed",
                    stream_id = %result.stream_id,
                    size = reconstruction.size,
                    chunks = reconstruction.chunks,
                    duration_ms = reconstruction.duration.as_millis() as u64,
                    "Stream reconstructed"
                );
                ScanEvent::Completed {
                    result,
                    reconstruction,
                }
            }
            Err(error) => ScanEvent::ReconstructFailed {
                stream_id: result.stream_id,
                error,
            },
        }
    }

    /// Drop one stream, e.g. to recover from a total mismatch.
    pub fn clear_stream(&mut self, stream_id: &str) {
        self.assembler.clear_stream(stream_id);
        self.reported.remove(stream_id);
    }

    /// Forget all streams and counters (user-initiated restart).
    pub fn reset(&mut self) {
        self.assembler.clear_all();
        self.reported.clear();
        self.stats = ScanStats::default();
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn assembler(&self) -> &StreamAssembler {
        &self.assembler
    }

    /// End the session, returning its assembler.
    pub fn into_assembler(self) -> StreamAssembler {
        self.assembler
    }
}
