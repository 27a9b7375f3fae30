use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use log::{error, info};
use smartsession_client::config::{ClientConfig, SourceKind, WireEncoding};
use smartsession_client::{FitMode, Session, StatusBoard, health};

/// Stream camera snapshots to a SmartSession analysis service and follow the
/// status it reports back.
#[derive(Parser, Debug)]
#[command(name = "smartsession")]
#[command(about = "📷 Relay camera snapshots to a focus analysis service")]
#[command(long_about = "Samples a live source on a fixed timer, sends each frame as a 320x240 JPEG
over a WebSocket, and logs the status timeline the service reports back.")]
struct Args {
    /// JSON configuration file; flags given on the command line override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Analysis service WebSocket URL
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Sampling period
    #[arg(short, long, help = "Sampling period: 500ms, 1s, 2m")]
    interval: Option<String>,

    /// Frame source
    #[arg(short, long, value_enum)]
    source: Option<SourceKind>,

    /// Image file for the still source
    #[arg(long)]
    image: Option<PathBuf>,

    /// Camera device, e.g. /dev/video0
    #[arg(long)]
    device: Option<String>,

    /// JPEG quality, 1-100
    #[arg(short, long)]
    quality: Option<u8>,

    /// Outbound frame representation
    #[arg(long, value_enum)]
    wire: Option<WireEncoding>,

    /// How the source is placed on the canvas
    #[arg(long, value_enum)]
    fit: Option<FitMode>,

    /// Exit once the connection closes or errors
    #[arg(long)]
    exit_on_disconnect: bool,

    /// Only check that the service answers over HTTP, then exit
    #[arg(long)]
    probe: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = build_config(&args)?;

    if args.probe {
        let banner = health::probe_backend(&config.endpoint).await?;
        println!("{}", banner.message);
        return Ok(());
    }

    let mut session = Session::builder().with_config(config).build()?;
    let handle = session.handle();
    let board = session.board();

    tokio::spawn(follow_board(board));
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received, stopping"),
            Err(e) => error!("cannot listen for ctrl-c: {}", e),
        }
        handle.stop();
    });

    let report = session.run().await;
    info!(
        "session ended: status={} connection={} frames_sent={} skipped={} failed={} decode_failures={} timeline_entries={}",
        report.final_status,
        report.connection,
        report.frames_sent,
        report.ticks_skipped,
        report.tick_failures,
        report.decode_failures,
        report.timeline_len
    );
    Ok(())
}

fn build_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_json_file(path)?,
        None => ClientConfig::default(),
    };

    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(interval) = &args.interval {
        config.sample_interval_ms = parse_interval(interval)?;
    }
    if let Some(source) = args.source {
        config.source = source;
    }
    if let Some(image) = &args.image {
        config.image_path = Some(image.clone());
        if args.source.is_none() {
            config.source = SourceKind::Still;
        }
    }
    if let Some(device) = &args.device {
        config.device = Some(device.clone());
    }
    if let Some(quality) = args.quality {
        config.jpeg_quality = quality;
    }
    if let Some(wire) = args.wire {
        config.wire_encoding = wire;
    }
    if let Some(fit) = args.fit {
        config.fit = fit;
    }
    config.exit_on_disconnect |= args.exit_on_disconnect;

    config.validate()?;
    Ok(config)
}

/// Log every status change and every new timeline entry.
async fn follow_board(mut board: StatusBoard) {
    let mut last_status = board.current_status();
    let mut seen_entries = board.timeline().len();
    info!("status: {}", last_status);

    while board.changed().await {
        let snapshot = board.snapshot();
        if snapshot.current != last_status {
            info!("status: {}", snapshot.current);
            last_status = snapshot.current.clone();
        }
        // Newest first, so new entries are at the front.
        let fresh = snapshot.timeline.len().saturating_sub(seen_entries);
        for entry in snapshot.timeline[..fresh].iter().rev() {
            match &entry.reason {
                Some(reason) => info!("timeline: {} {} ({})", entry.timestamp, entry.status, reason),
                None => info!("timeline: {} {}", entry.timestamp, entry.status),
            }
        }
        seen_entries = snapshot.timeline.len();
    }
}

/// Parse interval strings like "500ms", "1s", "2m". A bare number is milliseconds.
fn parse_interval(interval: &str) -> Result<u64> {
    if let Ok(ms) = interval.parse::<u64>() {
        return Ok(ms);
    }

    let (num_str, factor) = if let Some(num) = interval.strip_suffix("ms") {
        (num, 1)
    } else if let Some(num) = interval.strip_suffix('s') {
        (num, 1_000)
    } else if let Some(num) = interval.strip_suffix('m') {
        (num, 60_000)
    } else {
        return Err(anyhow!(
            "Invalid interval format: {}. Use 'ms', 's' or 'm', e.g. 500ms",
            interval
        ));
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid number in interval: {}", num_str))?;
    num.checked_mul(factor)
        .ok_or_else(|| anyhow!("Interval too large: {}", interval))
}
