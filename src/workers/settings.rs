//! Effective settings: TOML config file merged with CLI arguments.
//!
//! Precedence: CLI flag > config file > built-in default.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use streaming_qr::core::config::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_FRAGMENT_SIZE};

use super::args::{Args, Command};

/// Keys accepted in `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub fragment_size: Option<usize>,
    pub out_dir: Option<PathBuf>,
    pub checksums: Option<bool>,
    pub verify_checksums: Option<bool>,
    pub verbose: Option<u8>,
}

impl FileConfig {
    /// Load the config file.
    ///
    /// An explicit path must exist and parse. The default location
    /// (`~/.streaming-qr/config.toml`) is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }
}

/// Resolved settings used by the command runners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub fragment_size: usize,
    pub out_dir: PathBuf,
    pub checksums: bool,
    pub verify_checksums: bool,
    pub verbose: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            out_dir: PathBuf::from("."),
            checksums: false,
            verify_checksums: false,
            verbose: 0,
        }
    }
}

impl Settings {
    /// Merge file config with CLI args (CLI takes precedence).
    pub fn resolve(args: &Args, file: FileConfig) -> Self {
        let defaults = Self::default();
        let mut settings = Self {
            fragment_size: file.fragment_size.unwrap_or(defaults.fragment_size),
            out_dir: file.out_dir.unwrap_or(defaults.out_dir),
            checksums: file.checksums.unwrap_or(defaults.checksums),
            verify_checksums: file.verify_checksums.unwrap_or(defaults.verify_checksums),
            verbose: file.verbose.unwrap_or(defaults.verbose),
        };

        if args.verbose > 0 {
            settings.verbose = args.verbose;
        }

        match &args.command {
            Command::Encode {
                fragment_size,
                checksums,
                ..
            } => {
                if let Some(size) = fragment_size {
                    settings.fragment_size = *size;
                }
                if *checksums {
                    settings.checksums = true;
                }
            }
            Command::Decode {
                out_dir,
                verify_checksums,
                ..
            } => {
                if let Some(dir) = out_dir {
                    settings.out_dir = dir.clone();
                }
                if *verify_checksums {
                    settings.verify_checksums = true;
                }
            }
            Command::Validate { .. } => {}
        }

        settings
    }
}
