//! Stream Assembler: per-stream chunk accumulation and reconstruction.
//!
//! The assembler owns a map of stream id → [`StreamState`]. A stream is
//! created by its first valid chunk, mutated only by later chunks with the
//! same id, and dropped only by [`StreamAssembler::clear_stream`] or
//! [`StreamAssembler::clear_all`]. Completed streams stay queryable and can
//! be reconstructed any number of times.
//!
//! # Ingest rules
//!
//! 1. Unknown id: a stream is created with `total` fixed to the chunk's
//!    declared total.
//! 2. Known id, different total: rejected as a mismatch, stream untouched.
//! 3. Sequence already held: reported as a duplicate, nothing changes.
//! 4. Sequence at or past the declared total: rejected, nothing changes.
//! 5. Otherwise the fragment is stored and the presence bitmap updated.
//!
//! # Concurrency
//!
//! All operations are synchronous and take `&mut self`. Hosts that share one
//! assembler between decode loops wrap it in a [`SharedAssembler`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::pipeline::transport;
use crate::core::protocol::checksum::{Advisory, ChecksumVerifier};
use crate::core::protocol::{parse, Chunk, ChunkBitmap, ChunkError, ReconstructError};

// ── Public types ───────────────────────────────────────────────────────────────

/// Point-in-time receipt summary for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Distinct chunks received.
    pub received: u32,
    /// Declared chunk count.
    pub total: u32,
    /// `round(received / total * 100)`.
    pub percentage: u8,
    /// Indices not yet received, ascending.
    ///
    /// Built in full for every snapshot, one `u32` per outstanding index.
    /// A chunk declaring a total near `u32::MAX` therefore costs gigabytes
    /// here; hosts that accept untrusted symbols should clear such streams
    /// or truncate the list before display.
    pub missing: Vec<u32>,
}

/// Whether an ingested chunk was new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Accepted,
    Duplicate,
}

/// Outcome of ingesting one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkResult {
    pub status: ChunkStatus,
    pub stream_id: String,
    pub sequence: u32,
    pub is_complete: bool,
    pub progress: Progress,
}

impl ChunkResult {
    pub fn is_duplicate(&self) -> bool {
        self.status == ChunkStatus::Duplicate
    }
}

/// A reconstructed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    /// Decoded payload bytes.
    pub data: Vec<u8>,
    /// Payload length in bytes.
    pub size: usize,
    /// Number of chunks the payload was assembled from.
    pub chunks: u32,
    /// Time since the stream's first chunk was observed.
    pub duration: Duration,
}

impl Reconstruction {
    /// The payload as UTF-8 text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

// ── Stream state ───────────────────────────────────────────────────────────────

/// Assembly state for one stream id.
#[derive(Debug, Clone)]
struct StreamState {
    /// Fixed by the first chunk.
    total: u32,
    /// sequence → encoded fragment.
    chunks: BTreeMap<u32, String>,
    /// Presence set over `[0, total)`.
    received: ChunkBitmap,
    started_at: Instant,
}

impl StreamState {
    fn new(total: u32) -> Self {
        Self {
            total,
            chunks: BTreeMap::new(),
            received: ChunkBitmap::new(total),
            started_at: Instant::now(),
        }
    }

    fn progress(&self) -> Progress {
        let received = self.received.received_count();
        Progress {
            received,
            total: self.total,
            percentage: percentage(received, self.total),
            missing: self.received.missing_chunks(),
        }
    }
}

/// Round-half-up integer percentage; exactly 100 when complete.
fn percentage(received: u32, total: u32) -> u8 {
    if total == 0 || received >= total {
        return 100;
    }
    let (r, t) = (u64::from(received), u64::from(total));
    ((r * 200 + t) / (2 * t)) as u8
}

// ── Assembler ──────────────────────────────────────────────────────────────────

/// Owns every stream tracked during one scanning session.
pub struct StreamAssembler {
    streams: HashMap<String, StreamState>,
    verifier: Box<dyn ChecksumVerifier>,
}

impl Default for StreamAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StreamAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAssembler")
            .field("streams", &self.streams.len())
            .finish_non_exhaustive()
    }
}

impl StreamAssembler {
    /// Create an empty assembler with advisory (unenforced) checksums.
    pub fn new() -> Self {
        Self::with_verifier(Box::new(Advisory))
    }

    /// Create an empty assembler with a custom checksum policy.
    pub fn with_verifier(verifier: Box<dyn ChecksumVerifier>) -> Self {
        Self {
            streams: HashMap::new(),
            verifier,
        }
    }

    /// Parse a raw symbol payload and ingest it.
    ///
    /// A parse failure is returned as `ChunkError::Parse` and has no
    /// effect on any stream.
    pub fn process_chunk(&mut self, raw: &str) -> Result<ChunkResult, ChunkError> {
        let chunk = parse(raw).map_err(|e| {
            debug!(event = "chunk_rejected", error = %e, "Rejected unparseable symbol");
            e
        })?;
        self.ingest(chunk)
    }

    /// Ingest an already-parsed chunk.
    pub fn ingest(&mut self, chunk: Chunk) -> Result<ChunkResult, ChunkError> {
        if let Some(stream) = self.streams.get(&chunk.stream_id) {
            if stream.total != chunk.total {
                warn!(
                    event = "stream_total_mismatch",
                    stream_id = %chunk.stream_id,
                    expected = stream.total,
                    got = chunk.total,
                    "Chunk total conflicts with stream"
                );
                return Err(ChunkError::Mismatch {
                    stream_id: chunk.stream_id,
                    expected: stream.total,
                    got: chunk.total,
                });
            }

            if stream.received.is_set(chunk.sequence) {
                debug!(
                    event = "duplicate_chunk",
                    stream_id = %chunk.stream_id,
                    seq = chunk.sequence,
                    "Duplicate chunk ignored"
                );
                return Ok(ChunkResult {
                    status: ChunkStatus::Duplicate,
                    is_complete: stream.received.is_complete(),
                    progress: stream.progress(),
                    stream_id: chunk.stream_id,
                    sequence: chunk.sequence,
                });
            }
        }

        if chunk.sequence >= chunk.total {
            debug!(
                event = "chunk_out_of_range",
                stream_id = %chunk.stream_id,
                seq = chunk.sequence,
                total = chunk.total,
                "Chunk sequence past declared total"
            );
            return Err(ChunkError::SequenceOutOfRange {
                stream_id: chunk.stream_id,
                sequence: chunk.sequence,
                total: chunk.total,
            });
        }

        if !self.verifier.verify(&chunk) {
            warn!(
                event = "checksum_mismatch",
                stream_id = %chunk.stream_id,
                seq = chunk.sequence,
                "Chunk failed checksum verification"
            );
            return Err(ChunkError::ChecksumMismatch {
                stream_id: chunk.stream_id,
                sequence: chunk.sequence,
            });
        }

        let Chunk {
            stream_id,
            sequence,
            total,
            data,
            ..
        } = chunk;

        let stream = self.streams.entry(stream_id.clone()).or_insert_with(|| {
            info!(
                event = "stream_started",
                stream_id = %stream_id,
                total = total,
                "New stream observed"
            );
            StreamState::new(total)
        });

        stream.received.set(sequence);
        stream.chunks.insert(sequence, data);

        let is_complete = stream.received.is_complete();
        let progress = stream.progress();

        debug!(
            event = "chunk_accepted",
            stream_id = %stream_id,
            seq = sequence,
            received = progress.received,
            total = progress.total,
            "Chunk stored"
        );
        if is_complete {
            info!(
                event = "stream_complete",
                stream_id = %stream_id,
                total = total,
                elapsed_ms = stream.started_at.elapsed().as_millis() as u64,
                "All chunks received"
            );
        }

        Ok(ChunkResult {
            status: ChunkStatus::Accepted,
            stream_id,
            sequence,
            is_complete,
            progress,
        })
    }

    /// Receipt summary for a stream, or `None` if the id is unknown.
    pub fn progress(&self, stream_id: &str) -> Option<Progress> {
        self.streams.get(stream_id).map(StreamState::progress)
    }

    /// Whether every chunk of a known stream has been received.
    pub fn is_complete(&self, stream_id: &str) -> bool {
        self.streams
            .get(stream_id)
            .is_some_and(|s| s.received.is_complete())
    }

    /// Concatenate the stream's fragments in sequence order and decode.
    ///
    /// Non-destructive: the stream stays tracked and can be reconstructed
    /// again with identical results.
    pub fn reconstruct(&self, stream_id: &str) -> Result<Reconstruction, ReconstructError> {
        let stream = self
            .streams
            .get(stream_id)
            .ok_or_else(|| ReconstructError::NotFound {
                stream_id: stream_id.to_owned(),
            })?;

        if !stream.received.is_complete() {
            return Err(ReconstructError::Incomplete {
                progress: stream.progress(),
            });
        }

        let mut encoded = String::new();
        for sequence in 0..stream.total {
            let fragment = stream
                .chunks
                .get(&sequence)
                .ok_or(ReconstructError::MissingChunk { sequence })?;
            encoded.push_str(fragment);
        }

        let data = transport::decode(&encoded).map_err(|e| {
            warn!(
                event = "stream_decode_failed",
                stream_id = %stream_id,
                error = %e,
                "Concatenated fragments are not valid base64"
            );
            ReconstructError::Decode(e)
        })?;

        Ok(Reconstruction {
            size: data.len(),
            data,
            chunks: stream.total,
            duration: stream.started_at.elapsed(),
        })
    }

    /// Forget one stream. No-op if it is not tracked.
    pub fn clear_stream(&mut self, stream_id: &str) {
        if self.streams.remove(stream_id).is_some() {
            debug!(event = "stream_cleared", stream_id = %stream_id, "Stream cleared");
        }
    }

    /// Forget every stream.
    pub fn clear_all(&mut self) {
        let count = self.streams.len();
        self.streams.clear();
        debug!(event = "streams_cleared", count = count, "All streams cleared");
    }

    /// Ids of every tracked stream, sorted.
    pub fn stream_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.streams.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

// ── Shared handle ──────────────────────────────────────────────────────────────

/// Clonable handle serializing access to one assembler.
///
/// Every call holds the lock for the whole ingest, so concurrent decode
/// loops cannot interleave the mismatch, duplicate and insert steps.
#[derive(Clone, Default, Debug)]
pub struct SharedAssembler {
    inner: Arc<Mutex<StreamAssembler>>,
}

impl SharedAssembler {
    pub fn new(assembler: StreamAssembler) -> Self {
        Self {
            inner: Arc::new(Mutex::new(assembler)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamAssembler> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn process_chunk(&self, raw: &str) -> Result<ChunkResult, ChunkError> {
        self.lock().process_chunk(raw)
    }

    pub fn progress(&self, stream_id: &str) -> Option<Progress> {
        self.lock().progress(stream_id)
    }

    pub fn is_complete(&self, stream_id: &str) -> bool {
        self.lock().is_complete(stream_id)
    }

    pub fn reconstruct(&self, stream_id: &str) -> Result<Reconstruction, ReconstructError> {
        self.lock().reconstruct(stream_id)
    }

    pub fn clear_stream(&self, stream_id: &str) {
        self.lock().clear_stream(stream_id);
    }

    pub fn clear_all(&self) {
        self.lock().clear_all();
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::transport::encode;
    use crate::core::protocol::checksum::{fragment_checksum, Sha3Verifier};
    use crate::core::protocol::{InvalidField, ParseError};

    fn wire(id: &str, seq: u32, total: u32, data: &str) -> String {
        format!(r#"{{"id":"{id}","seq":{seq},"total":{total},"data":"{data}","checksum":null}}"#)
    }

    /// "Hello, World!" split into 5-byte pieces, each base64-encoded.
    fn hello_chunks() -> Vec<String> {
        ["Hello", ", Wor", "ld!"]
            .iter()
            .enumerate()
            .map(|(i, part)| wire("hello", i as u32, 3, &encode(part.as_bytes())))
            .collect()
    }

    #[test]
    fn test_out_of_order_scenario() {
        let chunks = hello_chunks();
        let mut asm = StreamAssembler::new();

        let r = asm.process_chunk(&chunks[1]).unwrap();
        assert_eq!(r.status, ChunkStatus::Accepted);
        assert!(!r.is_complete);
        assert_eq!(r.progress.received, 1);

        let r = asm.process_chunk(&chunks[0]).unwrap();
        assert_eq!(r.progress.received, 2);
        assert_eq!(r.progress.total, 3);
        assert_eq!(r.progress.missing, vec![2]);
        assert_eq!(r.progress.percentage, 67);

        let r = asm.process_chunk(&chunks[2]).unwrap();
        assert!(r.is_complete);
        assert_eq!(r.progress.percentage, 100);
        assert!(r.progress.missing.is_empty());

        let out = asm.reconstruct("hello").unwrap();
        assert_eq!(out.text(), Some("Hello, World!"));
        assert_eq!(out.size, 13);
        assert_eq!(out.chunks, 3);
    }

    #[test]
    fn test_duplicate_keeps_original_data() {
        let mut asm = StreamAssembler::new();
        asm.process_chunk(&wire("d", 0, 3, "QUFB")).unwrap();

        let r = asm.process_chunk(&wire("d", 0, 3, "QkJC")).unwrap();
        assert!(r.is_duplicate());
        assert_eq!(r.progress.received, 1);

        asm.process_chunk(&wire("d", 1, 3, "QkJC")).unwrap();
        asm.process_chunk(&wire("d", 2, 3, "Q0ND")).unwrap();
        assert_eq!(asm.reconstruct("d").unwrap().data, b"AAABBBCCC");
    }

    #[test]
    fn test_empty_id_is_invalid_format() {
        let mut asm = StreamAssembler::new();
        let err = asm
            .process_chunk(r#"{"id":"","seq":0,"total":1,"data":"QQ=="}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ChunkError::Parse(ParseError::InvalidFormat(InvalidField::EmptyStreamId))
        );
        assert!(asm.is_empty());
    }

    #[test]
    fn test_unknown_stream_not_found() {
        let asm = StreamAssembler::new();
        assert_eq!(
            asm.reconstruct("unknown-id").unwrap_err(),
            ReconstructError::NotFound {
                stream_id: "unknown-id".into()
            }
        );
        assert!(asm.progress("unknown-id").is_none());
    }

    #[test]
    fn test_mismatch_leaves_stream_untouched() {
        let mut asm = StreamAssembler::new();
        asm.process_chunk(&wire("m", 0, 3, "QUFB")).unwrap();
        let before = asm.progress("m").unwrap();

        let err = asm.process_chunk(&wire("m", 1, 4, "QkJC")).unwrap_err();
        assert_eq!(
            err,
            ChunkError::Mismatch {
                stream_id: "m".into(),
                expected: 3,
                got: 4
            }
        );
        assert_eq!(asm.progress("m").unwrap(), before);
    }

    #[test]
    fn test_incomplete_reconstruct() {
        let mut asm = StreamAssembler::new();
        asm.process_chunk(&wire("i", 1, 2, "QUFB")).unwrap();
        match asm.reconstruct("i").unwrap_err() {
            ReconstructError::Incomplete { progress } => {
                assert_eq!(progress.received, 1);
                assert_eq!(progress.missing, vec![0]);
                assert_eq!(progress.percentage, 50);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_reconstruct_is_repeatable() {
        let mut asm = StreamAssembler::new();
        for c in hello_chunks() {
            asm.process_chunk(&c).unwrap();
        }
        let a = asm.reconstruct("hello").unwrap();
        let b = asm.reconstruct("hello").unwrap();
        assert_eq!(a.data, b.data);
        assert_eq!(a.chunks, b.chunks);
        assert!(asm.is_complete("hello"));
    }

    #[test]
    fn test_decode_error() {
        let mut asm = StreamAssembler::new();
        asm.process_chunk(&wire("bad", 0, 1, "@@@@")).unwrap();
        assert!(matches!(
            asm.reconstruct("bad"),
            Err(ReconstructError::Decode(_))
        ));
        // Still tracked after the failure.
        assert!(asm.is_complete("bad"));
    }

    #[test]
    fn test_sequence_past_total_rejected() {
        let mut asm = StreamAssembler::new();
        assert_eq!(
            asm.process_chunk(&wire("p", 5, 1, "QQ==")).unwrap_err(),
            ChunkError::SequenceOutOfRange {
                stream_id: "p".into(),
                sequence: 5,
                total: 1
            }
        );
        assert!(asm.is_empty());

        asm.process_chunk(&wire("p", 0, 2, "QQ==")).unwrap();
        assert!(asm.process_chunk(&wire("p", 2, 2, "QQ==")).is_err());
        assert_eq!(asm.progress("p").unwrap().received, 1);
    }

    #[test]
    fn test_interleaved_streams() {
        let mut asm = StreamAssembler::new();
        asm.process_chunk(&wire("a", 0, 2, &encode(b"ab"))).unwrap();
        asm.process_chunk(&wire("b", 0, 1, &encode(b"zz"))).unwrap();
        asm.process_chunk(&wire("a", 1, 2, &encode(b"cd"))).unwrap();

        assert_eq!(asm.stream_ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(asm.reconstruct("a").unwrap().data, b"abcd");
        assert_eq!(asm.reconstruct("b").unwrap().data, b"zz");
    }

    #[test]
    fn test_clear_operations() {
        let mut asm = StreamAssembler::new();
        asm.process_chunk(&wire("a", 0, 2, "QQ==")).unwrap();
        asm.process_chunk(&wire("b", 0, 2, "QQ==")).unwrap();

        asm.clear_stream("a");
        asm.clear_stream("never-seen");
        assert!(asm.progress("a").is_none());
        assert_eq!(asm.len(), 1);

        asm.clear_all();
        assert!(asm.is_empty());

        // A cleared id can start over with a different total.
        asm.process_chunk(&wire("b", 0, 5, "QQ==")).unwrap();
        assert_eq!(asm.progress("b").unwrap().total, 5);
    }

    #[test]
    fn test_sha3_verifier_rejects_without_creating_stream() {
        let mut asm = StreamAssembler::with_verifier(Box::new(Sha3Verifier));
        let bad = r#"{"id":"c","seq":0,"total":1,"data":"QQ==","checksum":"00"}"#;
        assert_eq!(
            asm.process_chunk(bad).unwrap_err(),
            ChunkError::ChecksumMismatch {
                stream_id: "c".into(),
                sequence: 0
            }
        );
        assert!(asm.is_empty());

        let good = format!(
            r#"{{"id":"c","seq":0,"total":1,"data":"QQ==","checksum":"{}"}}"#,
            fragment_checksum("QQ==")
        );
        assert!(asm.process_chunk(&good).unwrap().is_complete);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(0, 3), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(1, 200), 1);
        assert_eq!(percentage(199, 200), 100);
        assert_eq!(percentage(3, 3), 100);
    }

    #[test]
    fn test_shared_assembler_across_threads() {
        let shared = SharedAssembler::default();
        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    let raw = format!(r#"{{"id":"t","seq":{i},"total":4,"data":"QUFB"}}"#);
                    shared.process_chunk(&raw).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(shared.progress("t").unwrap().received, 4);
        assert_eq!(shared.reconstruct("t").unwrap().data, b"AAAAAAAAAAAA");
    }
}
