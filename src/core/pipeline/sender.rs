//! Producer side: payload → ordered wire chunks, one per symbol.
//!
//! The payload is base64-encoded once and the encoded string is cut into
//! fragments of at most `max_fragment` characters. Fragment boundaries
//! therefore fall anywhere inside the encoding; the receiver concatenates
//! before decoding.

use tracing::debug;
use uuid::Uuid;

use crate::core::pipeline::transport;
use crate::core::protocol::checksum::fragment_checksum;
use crate::core::protocol::{EncodeError, WireChunk};

/// Options for [`split_payload_with`].
#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Maximum encoded characters per fragment.
    pub max_fragment: usize,
    /// Attach a SHA3-256 checksum of each fragment.
    pub checksums: bool,
    /// Stream id to use; a fresh UUID v4 when `None`.
    pub stream_id: Option<String>,
}

impl SplitOptions {
    pub fn new(max_fragment: usize) -> Self {
        Self {
            max_fragment,
            checksums: false,
            stream_id: None,
        }
    }
}

/// Split a payload into wire chunks under a fresh random stream id.
pub fn split_payload(payload: &[u8], max_fragment: usize) -> Result<Vec<WireChunk>, EncodeError> {
    split_payload_with(payload, &SplitOptions::new(max_fragment))
}

/// Split a payload into wire chunks.
///
/// # Errors
///
/// `ZeroFragmentSize` when `max_fragment == 0`, `EmptyPayload` for an empty
/// payload, `TooManyChunks` if the fragment count does not fit a `u32`.
pub fn split_payload_with(
    payload: &[u8],
    options: &SplitOptions,
) -> Result<Vec<WireChunk>, EncodeError> {
    if options.max_fragment == 0 {
        return Err(EncodeError::ZeroFragmentSize);
    }
    if payload.is_empty() {
        return Err(EncodeError::EmptyPayload);
    }

    let encoded = transport::encode(payload);
    let count = encoded.len().div_ceil(options.max_fragment);
    let total = u32::try_from(count).map_err(|_| EncodeError::TooManyChunks { chunks: count })?;

    let stream_id = options
        .stream_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // Base64 output is ASCII, so byte chunks are valid str slices.
    let chunks: Vec<WireChunk> = encoded
        .as_bytes()
        .chunks(options.max_fragment)
        .zip(0u32..)
        .map(|(piece, seq)| {
            let data = String::from_utf8_lossy(piece).into_owned();
            let checksum = options.checksums.then(|| fragment_checksum(&data));
            WireChunk {
                id: stream_id.clone(),
                seq,
                total,
                data,
                checksum,
            }
        })
        .collect();

    debug!(
        event = "payload_split",
        stream_id = %stream_id,
        payload_bytes = payload.len(),
        encoded_len = encoded.len(),
        total = total,
        "Payload split into chunks"
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::assembler::StreamAssembler;
    use crate::core::protocol::checksum::Sha3Verifier;

    #[test]
    fn splits_into_bounded_fragments() {
        let chunks = split_payload(b"Hello, World!", 5).unwrap();
        // "SGVsbG8sIFdvcmxkIQ==" is 20 characters.
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.data.len() <= 5));
        assert!(chunks.iter().all(|c| c.total == 4));
        assert_eq!(
            chunks.iter().map(|c| c.seq).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        let id = &chunks[0].id;
        assert!(chunks.iter().all(|c| &c.id == id));
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn fresh_stream_id_per_call() {
        let a = split_payload(b"abc", 2).unwrap();
        let b = split_payload(b"abc", 2).unwrap();
        assert_ne!(a[0].id, b[0].id);
    }

    #[test]
    fn rejects_degenerate_input() {
        assert_eq!(split_payload(b"", 10), Err(EncodeError::EmptyPayload));
        assert_eq!(split_payload(b"abc", 0), Err(EncodeError::ZeroFragmentSize));
    }

    #[test]
    fn single_fragment_when_size_is_large() {
        let chunks = split_payload(b"abc", 1024).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].data, "YWJj");
        assert_eq!(chunks[0].checksum, None);
    }

    #[test]
    fn round_trips_through_assembler() {
        let payload = "multi-byte ✓ payload with ünïcode and\nnewlines".as_bytes();
        let chunks = split_payload(payload, 7).unwrap();

        let mut asm = StreamAssembler::new();
        for c in chunks.iter().rev() {
            asm.process_chunk(&c.to_json()).unwrap();
        }
        let out = asm.reconstruct(&chunks[0].id).unwrap();
        assert_eq!(out.data, payload);
        assert_eq!(out.chunks as usize, chunks.len());
    }

    #[test]
    fn checksums_verify_under_sha3_policy() {
        let mut options = SplitOptions::new(4);
        options.checksums = true;
        options.stream_id = Some("fixed".into());
        let chunks = split_payload_with(b"checksummed payload", &options).unwrap();
        assert!(chunks.iter().all(|c| c.checksum.is_some()));
        assert!(chunks.iter().all(|c| c.id == "fixed"));

        let mut asm = StreamAssembler::with_verifier(Box::new(Sha3Verifier));
        for c in &chunks {
            asm.process_chunk(&c.to_json()).unwrap();
        }
        assert_eq!(asm.reconstruct("fixed").unwrap().data, b"checksummed payload");
    }
}
