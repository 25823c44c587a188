mod workers;

use clap::Parser;
use streaming_qr::utils::file_log::FileLogLayer;
use streaming_qr::utils::sos::SignalOfStop;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use workers::args::Args;
use workers::settings::{FileConfig, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let file_config = FileConfig::load(args.config.as_deref())?;
    let settings = Settings::resolve(&args, file_config);

    let filter = match settings.verbose {
        0 => "warn,streaming_qr=info",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries chunk lines and payloads, so logs go to stderr.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let file_layer = args.log_file.as_deref().map(FileLogLayer::new).transpose()?;

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(fmt_layer)
        .with(file_layer)
        .init();

    let sos = SignalOfStop::new();

    // Ctrl+C handler
    let sos_clone = sos.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        sos_clone.cancel();
    });

    workers::commands::run(args, settings, sos).await
}
