//! Write-to-temp-then-rename for output files.
//!
//! A reconstructed payload is either fully on disk under its final name or
//! not there at all. The temp file sits next to the target
//! (`<name>.streaming-qr-tmp`) so the rename never crosses a mount.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

const TEMP_SUFFIX: &str = ".streaming-qr-tmp";

/// Atomically replace `path` with `content`, creating parent directories.
///
/// # Errors
/// Directory creation, temp write, fsync or rename failure. The temp file
/// is removed when the rename fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create directory {}", parent.display()))?;
    }

    let tmp = temp_path_for(path);
    write_synced(&tmp, content).with_context(|| format!("cannot write {}", tmp.display()))?;

    if let Err(e) = fs::rename(&tmp, path) {
        error!(
            event = "atomic_rename_failure",
            from = %tmp.display(),
            to = %path.display(),
            error = %e,
            "Rename over target failed"
        );
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("cannot replace {}", path.display()));
    }

    debug!(event = "atomic_write", path = %path.display(), bytes = content.len());
    Ok(())
}

fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content)?;
    file.sync_all()
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("streaming_qr_test")
            .join("atomic")
            .join(name);
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_creates_missing_parents() {
        let dir = scratch("parents");
        let path = dir.join("a").join("b").join("payload.txt");

        atomic_write(&path, b"hello").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_replaces_and_leaves_no_temp() {
        let dir = scratch("replace");
        let path = dir.join("payload.bin");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second, longer").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second, longer");
        assert!(!temp_path_for(&path).exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_parent_is_a_file() {
        let dir = scratch("blocked");
        fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();

        assert!(atomic_write(&blocker.join("out.txt"), b"data").is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_temp_name_keeps_extension() {
        assert_eq!(
            temp_path_for(Path::new("/out/decoded_stream_x.txt")),
            PathBuf::from("/out/decoded_stream_x.txt.streaming-qr-tmp")
        );
    }
}
