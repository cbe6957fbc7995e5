use clap::Parser;
use dwellwatch::annotate::{self, load_font};
use dwellwatch::source::{FrameSource, ReplaySource};
use dwellwatch::{Config, Monitor};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dwellwatch",
    about = "Track people in a detection stream and alert on dwell time and occupancy",
    version = "0.1.0"
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Override the source from the configuration
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Directory for rendered frames
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TrueType font for labels on rendered frames
    #[arg(long)]
    font: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dwellwatch=info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::from_file(&args.config)?;
    info!(config = %args.config.display(), "configuration loaded");

    let source_path = args.source.unwrap_or_else(|| PathBuf::from(&config.vid_source));
    let mut source = ReplaySource::open(
        &source_path,
        config.confidence_threshold,
        (config.frame_width, config.frame_height),
    )?;

    let font = args.font.as_ref().map(load_font).transpose()?;
    if let Some(dir) = &args.output {
        fs::create_dir_all(dir)?;
    }

    let mut monitor = Monitor::from_config(&config)?;
    let mut processed = 0u64;
    let mut skipped = 0u64;

    let outcome = loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        };

        let report = match monitor.process_frame(&frame.detections, Some(&frame.image), frame.timestamp) {
            Ok(report) => report,
            Err(e) if !e.is_fatal() => {
                warn!(frame = frame.index, error = %e, "skipping frame");
                skipped += 1;
                continue;
            }
            Err(e) => break Err(e),
        };
        processed += 1;

        if let Some(dir) = &args.output {
            let mut canvas = frame.image;
            annotate::render(&mut canvas, &report.annotations, report.occupancy, font.as_ref());
            let path = dir.join(format!("frame_{:06}.jpg", frame.index));
            if let Err(e) = canvas.save(&path) {
                warn!(path = %path.display(), error = %e, "failed to write rendered frame");
            }
        }
    };

    monitor.shutdown();
    let stats = monitor.dispatch_stats();
    info!(
        processed = processed,
        skipped = skipped,
        alerts_delivered = stats.delivered(),
        alerts_failed = stats.failed(),
        alerts_dropped = stats.dropped(),
        "stream finished"
    );

    if let Err(e) = outcome {
        error!(error = %e, "frame loop aborted");
        return Err(e.into());
    }
    Ok(())
}
