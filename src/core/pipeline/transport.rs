//! Transport encoding: standard-alphabet base64.
//!
//! Decoding is lenient in the same ways a browser `atob` is: ASCII
//! whitespace is ignored and trailing padding is optional. A string with
//! interior padding (a sender that encoded each fragment on its own) is
//! decoded run by run; for a single well-formed encoding this is the same
//! as decoding once.

use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{DecodeError, Engine};

const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Base64-encode raw payload bytes (padded).
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode a concatenated base64 string back to raw bytes.
pub fn decode(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let mut out = Vec::with_capacity(compact.len() / 4 * 3);
    for run in padded_runs(&compact) {
        LENIENT.decode_vec(run, &mut out)?;
    }
    Ok(out)
}

/// Split after every run of `=` so each piece is one padded encoding.
fn padded_runs(s: &str) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 0..bytes.len() {
        let ends_run = bytes[i] == b'=' && bytes.get(i + 1).is_some_and(|b| *b != b'=');
        if ends_run {
            runs.push(&s[start..=i]);
            start = i + 1;
        }
    }
    if start < s.len() {
        runs.push(&s[start..]);
    }
    runs
}
