//! Saving and inspecting reconstructed payloads.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::core::config::{DECODED_FILE_EXTENSION, DECODED_FILE_PREFIX};
use crate::core::protocol::checksum::fragment_checksum;
use crate::utils::atomic_write::atomic_write;

/// Write decoded data to `dir/<name>`.
///
/// Without a name the file is called `decoded_stream_<unix-seconds>.txt`.
/// Returns the path written.
pub fn save_decoded(data: &[u8], name: Option<&str>, dir: &Path) -> Result<PathBuf> {
    let file_name = match name {
        Some(n) => sanitize_file_name(n)
            .with_context(|| format!("invalid output file name: {n:?}"))?,
        None => default_file_name(),
    };
    let path = dir.join(file_name);

    atomic_write(&path, data)
        .with_context(|| format!("failed to save decoded data to {}", path.display()))?;

    info!(
        event = "decoded_saved",
        path = %path.display(),
        bytes = data.len(),
        "Decoded data saved"
    );
    Ok(path)
}

fn default_file_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{DECODED_FILE_PREFIX}{secs}.{DECODED_FILE_EXTENSION}")
}

/// File name for a reconstructed stream: `decoded_stream_<id>.txt`.
///
/// Characters outside `[A-Za-z0-9._-]` become `_`. When any were replaced,
/// the first 8 hex digits of the id's SHA3-256 are appended so distinct ids
/// never share a file.
pub fn decoded_file_name(stream_id: &str) -> String {
    let escaped: String = stream_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if escaped == stream_id {
        format!("{DECODED_FILE_PREFIX}{escaped}.{DECODED_FILE_EXTENSION}")
    } else {
        let digest = fragment_checksum(stream_id);
        format!(
            "{DECODED_FILE_PREFIX}{escaped}-{}.{DECODED_FILE_EXTENSION}",
            &digest[..8]
        )
    }
}

/// Keep only the final path component; reject names that escape `dir`.
fn sanitize_file_name(name: &str) -> Option<String> {
    let file = Path::new(name).file_name()?.to_str()?;
    if file.is_empty() || file == "." || file == ".." {
        return None;
    }
    Some(file.to_owned())
}

/// Summary of a decoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataReport {
    pub size: usize,
    pub is_utf8: bool,
    pub line_count: usize,
    pub word_count: usize,
    pub is_empty: bool,
}

impl DataReport {
    /// Line and word counts are taken over the lossy UTF-8 view.
    pub fn analyze(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        Self {
            size: data.len(),
            is_utf8: std::str::from_utf8(data).is_ok(),
            line_count: text.lines().count(),
            word_count: text.split_whitespace().count(),
            is_empty: data.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("streaming_qr_test")
            .join("export")
            .join(name);
        let _ = std::fs::create_dir_all(&dir);
        dir
    }

    fn cleanup(path: &Path) {
        let _ = std::fs::remove_dir_all(path);
    }

    #[test]
    fn test_save_with_name() {
        let dir = test_dir("named");
        let path = save_decoded(b"payload", Some("out.bin"), &dir).unwrap();
        assert_eq!(path, dir.join("out.bin"));
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
        cleanup(&dir);
    }

    #[test]
    fn test_save_default_name() {
        let dir = test_dir("default");
        let path = save_decoded(b"x", None, &dir).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_owned();
        assert!(name.starts_with("decoded_stream_"));
        assert!(name.ends_with(".txt"));
        cleanup(&dir);
    }

    #[test]
    fn test_save_strips_directories() {
        let dir = test_dir("traversal");
        let path = save_decoded(b"x", Some("../../etc/evil.txt"), &dir).unwrap();
        assert_eq!(path, dir.join("evil.txt"));
        assert!(save_decoded(b"x", Some(".."), &dir).is_err());
        cleanup(&dir);
    }

    #[test]
    fn test_decoded_file_name_keeps_plain_ids() {
        assert_eq!(decoded_file_name("rt-1.a_b"), "decoded_stream_rt-1.a_b.txt");
    }

    #[test]
    fn test_decoded_file_name_separates_escaped_ids() {
        let a = decoded_file_name("a/x");
        let b = decoded_file_name("b/x");
        assert!(a.starts_with("decoded_stream_a_x-"));
        assert!(b.starts_with("decoded_stream_b_x-"));
        assert!(!a.contains('/') && !b.contains('/'));

        // Escaping alone would map both of these to `a_x`.
        assert_ne!(decoded_file_name("a/x"), decoded_file_name("a_x"));
        assert_ne!(decoded_file_name("a/x"), decoded_file_name("a:x"));
    }

    #[test]
    fn test_report_text() {
        let report = DataReport::analyze(b"hello world\nsecond line here\n");
        assert_eq!(report.size, 29);
        assert!(report.is_utf8);
        assert_eq!(report.line_count, 2);
        assert_eq!(report.word_count, 5);
        assert!(!report.is_empty);
    }

    #[test]
    fn test_report_binary_and_empty() {
        let report = DataReport::analyze(&[0xff, 0x00, 0x41]);
        assert!(!report.is_utf8);
        assert_eq!(report.size, 3);

        let report = DataReport::analyze(b"");
        assert!(report.is_empty);
        assert_eq!(report.line_count, 0);
        assert_eq!(report.word_count, 0);
    }
}
