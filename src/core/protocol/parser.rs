//! Chunk Parser: raw symbol text → validated [`Chunk`].
//!
//! Several generations of chunk producers named their fields differently.
//! Each logical field has an ordered list of accepted keys; the first key
//! present with a non-null value wins.
//!
//! Parsing is a pure function. It never touches assembler state.

use serde_json::{Map, Value};

use super::chunk::Chunk;
use super::error::{InvalidField, ParseError};

pub const STREAM_ID_KEYS: &[&str] = &["id", "streamId", "stream_id", "streamID"];
pub const SEQUENCE_KEYS: &[&str] = &["seq", "sequence", "index", "chunkIndex", "chunk"];
pub const TOTAL_KEYS: &[&str] = &["total", "totalChunks", "total_chunks", "chunkCount"];
pub const DATA_KEYS: &[&str] = &["data", "payload", "body", "content"];
pub const CHECKSUM_KEYS: &[&str] = &["checksum", "crc"];

/// Parse one raw symbol payload.
///
/// # Errors
///
/// `ParseError::Malformed` if `raw` is not a JSON object,
/// `ParseError::InvalidFormat` if any field fails validation, including a
/// numeric literal too large for `f64`.
pub fn parse(raw: &str) -> Result<Chunk, ParseError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        // A literal such as `1e400` overflows f64 inside the JSON reader.
        if e.to_string().starts_with("number out of range") {
            ParseError::InvalidFormat(InvalidField::NonFiniteNumber)
        } else {
            ParseError::Malformed {
                reason: e.to_string(),
            }
        }
    })?;
    let Value::Object(record) = value else {
        return Err(ParseError::Malformed {
            reason: "expected a JSON object".into(),
        });
    };
    from_record(&record)
}

/// Validate an already-decoded record.
pub fn from_record(record: &Map<String, Value>) -> Result<Chunk, ParseError> {
    let stream_id = lookup(record, STREAM_ID_KEYS)
        .and_then(text_of)
        .map(|s| s.trim().to_owned())
        .unwrap_or_default();
    let sequence = lookup(record, SEQUENCE_KEYS).and_then(number_of);
    let total = lookup(record, TOTAL_KEYS).and_then(number_of);
    let data = match lookup(record, DATA_KEYS) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };
    let checksum = lookup(record, CHECKSUM_KEYS).and_then(text_of);

    if stream_id.is_empty() {
        return Err(InvalidField::EmptyStreamId.into());
    }
    let (Some(sequence), Some(total)) = (sequence, total) else {
        return Err(InvalidField::NonFiniteNumber.into());
    };
    let Some(data) = data else {
        return Err(InvalidField::EmptyData.into());
    };
    let sequence = as_index(sequence).ok_or(InvalidField::InvalidSequence)?;
    let total = as_index(total)
        .filter(|t| *t > 0)
        .ok_or(InvalidField::InvalidTotal)?;

    Ok(Chunk {
        stream_id,
        sequence,
        total,
        data,
        checksum,
    })
}

/// First alias holding a non-null value.
fn lookup<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| record.get(*k))
        .find(|v| !v.is_null())
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers and numeric strings coerce to a finite `f64`.
fn number_of(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Non-negative integer that fits a sequence index.
fn as_index(n: f64) -> Option<u32> {
    if n < 0.0 || n.fract() != 0.0 || n > f64::from(u32::MAX) {
        return None;
    }
    Some(n as u32)
}
