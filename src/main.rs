//! packetscope - Main Entry Point
//!
//! Captures on one device for a fixed time (or packet count) and prints one
//! line per decoded packet as it is stored.

use anyhow::{bail, Context, Result};
use clap::Parser;
use packetscope::{
    capture::{CaptureSource, FramePattern, MockCaptureSource},
    config::AppConfig,
    logging, PipelineController,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Frames replayed by the mock source
const MOCK_FRAME_COUNT: usize = 500;

/// How often new packets are printed
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Capture packets and print their decoded summaries.
#[derive(Parser, Debug)]
#[command(name = "packetscope")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// List capture devices and exit
    #[arg(long = "list-devices")]
    list_devices: bool,

    /// Device to capture on (defaults to the configured or first device)
    #[arg(short = 'd', long = "device", value_name = "NAME")]
    device: Option<String>,

    /// Capture duration in seconds
    #[arg(short = 't', long = "duration", value_name = "SECS", default_value = "10")]
    duration: u64,

    /// Use the built-in mock source instead of a real interface
    #[arg(long = "mock")]
    mock: bool,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of decode workers (overrides the config file)
    #[arg(short = 'w', long = "workers", value_name = "N")]
    workers: Option<usize>,

    /// Stop after this many packets have been processed
    #[arg(short = 'n', long = "limit", value_name = "N")]
    limit: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::default_path()
            .filter(|path| path.exists())
            .map(AppConfig::load_or_default)
            .unwrap_or_default(),
    };

    let _log_guard = logging::init_logging(&config.logging);
    tracing::info!("Starting packetscope");

    let source = build_source(&args, &config);

    if args.list_devices {
        for device in source.list_devices() {
            println!("{}", device);
        }
        return Ok(());
    }

    let device = match args
        .device
        .clone()
        .or_else(|| config.capture.default_device.clone())
    {
        Some(device) => device,
        None => match source.list_devices().into_iter().next() {
            Some(device) => device.name,
            None => bail!("No capture device available. Use --list-devices or --mock."),
        },
    };

    let workers = args.workers.unwrap_or(config.pipeline.worker_count);
    let controller =
        PipelineController::new(source, workers).context("Failed to create pipeline")?;

    if !controller.start(&device) {
        bail!("Failed to start capture on {}", device);
    }

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut last_seen = 0;
    let mut printed = 0usize;
    while Instant::now() < deadline {
        std::thread::sleep(POLL_INTERVAL);
        printed += print_new_packets(&controller, &mut last_seen, remaining(args.limit, printed));
        if args.limit.is_some_and(|limit| controller.processed_count() >= limit) {
            break;
        }
    }

    controller.stop();
    printed += print_new_packets(&controller, &mut last_seen, remaining(args.limit, printed));

    println!(
        "{} frames captured, {} packets decoded, {} printed",
        controller.captured_count(),
        controller.processed_count(),
        printed
    );
    Ok(())
}

fn build_source(args: &Args, config: &AppConfig) -> Arc<dyn CaptureSource> {
    if args.mock {
        return mock_source();
    }
    live_source(config)
}

#[cfg(feature = "live-capture")]
fn live_source(config: &AppConfig) -> Arc<dyn CaptureSource> {
    Arc::new(packetscope::capture::PcapCaptureSource::new(
        config.capture.clone(),
    ))
}

#[cfg(not(feature = "live-capture"))]
fn live_source(_config: &AppConfig) -> Arc<dyn CaptureSource> {
    tracing::warn!("Built without live capture support; using the mock source");
    mock_source()
}

fn mock_source() -> Arc<dyn CaptureSource> {
    Arc::new(
        MockCaptureSource::new()
            .with_generated(FramePattern::Mixed, MOCK_FRAME_COUNT)
            .with_frame_interval(Duration::from_millis(2)),
    )
}

fn remaining(limit: Option<usize>, printed: usize) -> usize {
    limit.map_or(usize::MAX, |limit| limit.saturating_sub(printed))
}

/// Print packets stored since `last_seen`, at most `max` of them
fn print_new_packets(controller: &PipelineController, last_seen: &mut u64, max: usize) -> usize {
    let packets = controller.store().get_since(*last_seen);
    let mut count = 0;
    for packet in packets.iter().take(max) {
        println!(
            "{:>6} {} {:>39} -> {:<39} {:<8} {}",
            packet.id,
            packet.timestamp.format("%H:%M:%S%.6f"),
            packet.src_addr,
            packet.dst_addr,
            packet.protocol,
            packet.info
        );
        count += 1;
    }
    if let Some(last) = packets.last() {
        *last_seen = last.id;
    }
    count
}
