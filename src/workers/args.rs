//! Command-line argument parsing.
//!
//! Supports:
//! - Subcommands for producing, reassembling and inspecting streams
//! - A TOML configuration file (see [`super::settings`])
//! - Verbosity and file logging flags shared by every subcommand

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// streaming-qr - move data through a sequence of scanned 2D barcodes.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about)]
#[command(propagate_version = true)]
pub struct Args {
    /// Verbosity level (-v, -vv, -vvv).
    #[clap(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a TOML config file. Defaults to ~/.streaming-qr/config.toml.
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also append logs to this file.
    #[clap(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Split a file into chunk payloads, one JSON object per line.
    Encode {
        /// Input file, or `-` for stdin.
        input: PathBuf,

        /// Maximum encoded characters per chunk.
        #[clap(short = 's', long)]
        fragment_size: Option<usize>,

        /// Attach a SHA3-256 checksum to every chunk.
        #[clap(long)]
        checksums: bool,

        /// Use this stream id instead of a random UUID.
        #[clap(long)]
        stream_id: Option<String>,

        /// Write chunk lines here instead of stdout.
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Reassemble streams from decoded symbol text, one symbol per line.
    Decode {
        /// Input file of symbol lines; stdin when omitted or `-`.
        input: Option<PathBuf>,

        /// Directory for reconstructed payloads.
        #[clap(short, long)]
        out_dir: Option<PathBuf>,

        /// Reject chunks whose checksum does not match their data.
        #[clap(long)]
        verify_checksums: bool,

        /// Print reconstructed payloads to stdout instead of saving them.
        #[clap(long)]
        stdout: bool,
    },

    /// Report size, UTF-8 validity, line and word counts of a file.
    Validate {
        /// File to inspect.
        input: PathBuf,
    },
}

/// `-` means stdin.
pub fn is_stdin(path: Option<&PathBuf>) -> bool {
    path.map_or(true, |p| p.as_os_str() == "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_encode() {
        let args = Args::parse_from(["streaming-qr", "encode", "f.txt", "-s", "100", "--checksums"]);
        match args.command {
            Command::Encode {
                input,
                fragment_size,
                checksums,
                ..
            } => {
                assert_eq!(input, PathBuf::from("f.txt"));
                assert_eq!(fragment_size, Some(100));
                assert!(checksums);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["streaming-qr", "decode", "-vv", "--log-file", "x.log"]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.log_file, Some(PathBuf::from("x.log")));
        assert!(matches!(args.command, Command::Decode { input: None, .. }));
    }

    #[test]
    fn test_is_stdin() {
        assert!(is_stdin(None));
        assert!(is_stdin(Some(&PathBuf::from("-"))));
        assert!(!is_stdin(Some(&PathBuf::from("in.txt"))));
    }
}
