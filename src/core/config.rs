//! Centralized configuration constants for streaming-qr.
//!
//! Wire-format constants (field aliases) stay in the parser.

// ── Chunking ─────────────────────────────────────────────────────────────────

/// Default maximum encoded characters per fragment.
///
/// A version 25 QR code at error-correction level M holds roughly 1,000
/// alphanumeric-mode bytes; 512 characters of base64 plus the JSON envelope
/// (~90 bytes with a UUID stream id) leaves room for a checksum and keeps
/// symbols small enough to decode reliably from a phone camera.
pub const DEFAULT_FRAGMENT_SIZE: usize = 512;

// ── Export ───────────────────────────────────────────────────────────────────

/// File name prefix for decoded payloads saved without an explicit name.
pub const DECODED_FILE_PREFIX: &str = "decoded_stream_";

/// Extension for decoded payloads saved without an explicit name.
pub const DECODED_FILE_EXTENSION: &str = "txt";

// ── Configuration files ──────────────────────────────────────────────────────

/// Directory under the home directory holding the config file.
pub const CONFIG_DIR_NAME: &str = ".streaming-qr";

/// Config file name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.toml";
