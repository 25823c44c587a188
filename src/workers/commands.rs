//! Subcommand runners.
//!
//! `decode` is the scanning loop: each input line is one decoded frame,
//! handed to the frame decoder as raw bytes. It runs until the input ends or
//! the stop signal fires, saving every stream as soon as it completes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use streaming_qr::core::export::{decoded_file_name, save_decoded, DataReport};
use streaming_qr::core::pipeline::{split_payload_with, Progress, SplitOptions, StreamAssembler};
use streaming_qr::core::protocol::checksum::Sha3Verifier;
use streaming_qr::core::scanner::{ScanEvent, ScanSession, TextFrameDecoder};
use streaming_qr::utils::formatters::{
    format_duration, format_file_size, format_missing, progress_bar, short_stream_id,
};
use streaming_qr::utils::sos::SignalOfStop;

use super::args::{is_stdin, Args, Command};
use super::settings::Settings;

pub async fn run(args: Args, settings: Settings, sos: SignalOfStop) -> Result<()> {
    match args.command {
        Command::Encode {
            input,
            stream_id,
            output,
            ..
        } => {
            let payload = read_input(&input).await?;
            let lines = encode(&payload, &settings, stream_id)?;
            match output {
                Some(path) => {
                    streaming_qr::utils::atomic_write::atomic_write(&path, lines.as_bytes())
                        .with_context(|| format!("failed to write {}", path.display()))?;
                }
                None => write_stdout(lines.as_bytes()).await?,
            }
            Ok(())
        }
        Command::Decode {
            input, stdout, ..
        } => {
            let reader: Box<dyn AsyncBufRead + Unpin + Send> = if is_stdin(input.as_ref()) {
                Box::new(BufReader::new(tokio::io::stdin()))
            } else {
                let path = input.as_deref().unwrap_or(Path::new("-"));
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("failed to open {}", path.display()))?;
                Box::new(BufReader::new(file))
            };
            let summary = decode(reader, &settings, stdout, &sos).await?;
            summary.finish()
        }
        Command::Validate { input } => {
            let data = read_input(&input).await?;
            let report = DataReport::analyze(&data);
            let mut json = serde_json::to_string_pretty(&report)?;
            json.push('\n');
            write_stdout(json.as_bytes()).await
        }
    }
}

async fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        tokio::io::stdin().read_to_end(&mut buf).await?;
        return Ok(buf);
    }
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

async fn write_stdout(bytes: &[u8]) -> Result<()> {
    let mut out = tokio::io::stdout();
    out.write_all(bytes).await?;
    out.flush().await?;
    Ok(())
}

/// One JSON chunk per line.
fn encode(payload: &[u8], settings: &Settings, stream_id: Option<String>) -> Result<String> {
    let options = SplitOptions {
        max_fragment: settings.fragment_size,
        checksums: settings.checksums,
        stream_id,
    };
    let chunks = split_payload_with(payload, &options)?;

    info!(
        event = "encode_done",
        stream_id = %chunks[0].id,
        chunks = chunks.len(),
        payload = %format_file_size(payload.len() as u64),
        "Payload encoded"
    );

    let mut lines = String::new();
    for chunk in &chunks {
        lines.push_str(&chunk.to_json());
        lines.push('\n');
    }
    Ok(lines)
}

/// Outcome of a decode run.
#[derive(Debug, Default)]
struct DecodeSummary {
    completed: Vec<String>,
    incomplete: Vec<(String, Progress)>,
    /// Completed streams whose output name was already used this session.
    unsaved: Vec<String>,
    interrupted: bool,
}

impl DecodeSummary {
    fn finish(self) -> Result<()> {
        for (id, progress) in &self.incomplete {
            eprintln!(
                "incomplete stream {}: {}/{} chunks, missing {}",
                id,
                progress.received,
                progress.total,
                format_missing(&progress.missing, MISSING_SHOWN)
            );
        }
        if self.interrupted {
            eprintln!("interrupted; partial streams discarded");
        }
        if !self.unsaved.is_empty() {
            bail!("{} stream(s) not saved: output file already written", self.unsaved.len());
        }
        if !self.incomplete.is_empty() {
            bail!("{} stream(s) incomplete", self.incomplete.len());
        }
        if self.completed.is_empty() && !self.interrupted {
            bail!("no stream was completed");
        }
        Ok(())
    }
}

/// Missing indices listed per incomplete stream.
const MISSING_SHOWN: usize = 32;

async fn decode<R>(
    mut reader: R,
    settings: &Settings,
    to_stdout: bool,
    sos: &SignalOfStop,
) -> Result<DecodeSummary>
where
    R: AsyncBufRead + Unpin,
{
    let assembler = if settings.verify_checksums {
        StreamAssembler::with_verifier(Box::new(Sha3Verifier))
    } else {
        StreamAssembler::new()
    };
    let mut session = ScanSession::new(TextFrameDecoder, assembler);
    let mut summary = DecodeSummary::default();
    let mut written: HashSet<PathBuf> = HashSet::new();
    let mut frame = Vec::new();

    loop {
        frame.clear();
        let read = tokio::select! {
            read = reader.read_until(b'\n', &mut frame) => read.context("failed to read input")?,
            _ = sos.wait() => {
                summary.interrupted = true;
                break;
            }
        };
        if read == 0 {
            break;
        }
        while matches!(frame.last(), Some(b'\n' | b'\r')) {
            frame.pop();
        }

        match session.handle_frame(frame.as_slice()) {
            ScanEvent::NoSymbol => {}
            ScanEvent::Chunk(result) => {
                let p = &result.progress;
                let tag = if result.is_duplicate() { " (duplicate)" } else { "" };
                eprintln!(
                    "[{}] {} {:>3}% {}/{}{}",
                    short_stream_id(&result.stream_id),
                    progress_bar(p.percentage, 20),
                    p.percentage,
                    p.received,
                    p.total,
                    tag
                );
            }
            ScanEvent::Completed {
                result,
                reconstruction,
            } => {
                eprintln!(
                    "[{}] complete: {} in {} chunks, {}",
                    short_stream_id(&result.stream_id),
                    format_file_size(reconstruction.size as u64),
                    reconstruction.chunks,
                    format_duration(reconstruction.duration)
                );
                if to_stdout {
                    write_stdout(&reconstruction.data).await?;
                } else {
                    let name = decoded_file_name(&result.stream_id);
                    if !written.insert(settings.out_dir.join(&name)) {
                        warn!(
                            event = "output_name_taken",
                            stream_id = %result.stream_id,
                            file = %name,
                            "Refusing to overwrite output written this session"
                        );
                        eprintln!("[{}] not saved: {name} already written", short_stream_id(&result.stream_id));
                        summary.unsaved.push(result.stream_id);
                        continue;
                    }
                    let path = save_decoded(&reconstruction.data, Some(name.as_str()), &settings.out_dir)?;
                    eprintln!("saved {}", path.display());
                }
                summary.completed.push(result.stream_id);
            }
            ScanEvent::Rejected(e) => eprintln!("rejected symbol: {e}"),
            ScanEvent::ReconstructFailed { stream_id, error } => {
                warn!(
                    event = "reconstruct_failed",
                    stream_id = %stream_id,
                    error = %error,
                    "Stream complete but not decodable"
                );
                eprintln!("[{}] cannot reconstruct: {error}", short_stream_id(&stream_id));
            }
            ScanEvent::Transport { reason } => eprintln!("decoder error: {reason}"),
        }
    }

    let stats = session.stats();
    let assembler = session.assembler();
    for id in assembler.stream_ids() {
        if !assembler.is_complete(&id) {
            if let Some(progress) = assembler.progress(&id) {
                summary.incomplete.push((id, progress));
            }
        }
    }
    if summary.interrupted {
        session.reset();
        summary.incomplete.clear();
    }

    info!(
        event = "decode_done",
        frames = stats.frames,
        rejected = stats.rejected,
        duplicates = stats.duplicates,
        completed = summary.completed.len(),
        incomplete = summary.incomplete.len(),
        interrupted = summary.interrupted,
        "Decode finished"
    );
    Ok(summary)
}
