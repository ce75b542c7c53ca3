//! Vantage Agent - Main Entry Point
//!
//! Captures frames, detects objects and sends the offset of the selected
//! target from screen centre to a UDP peer.
//!
//! Usage:
//!     vantage-agent --config agent.json
//!     vantage-agent --model model.onnx --peer 192.168.0.182:7483 --mode decoupled

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use vantage_agent::{
    shutdown_signal, AgentConfig, DriverSettings, OverlayMonitor, PipelineDriver, PipelineMode,
    Shutdown, UdpSink,
};
use vantage_core::tracing::prefix;
use vantage_core::{FrameBuffer, FrameSource, TargetSelector};
use vantage_vidstream::{ImageSequenceSource, Limited, SyntheticSource, VideoEngine};

#[derive(Parser, Debug)]
#[command(name = "vantage-agent")]
#[command(about = "Real-time capture, detection and target delivery")]
#[command(version)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Peer address receiving target vectors (overrides config)
    #[arg(long)]
    peer: Option<String>,

    /// ONNX model path (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// Frame source: "synthetic", an image file or a directory of images
    #[arg(long)]
    source: Option<String>,

    /// Selection confidence threshold (overrides config)
    #[arg(long)]
    threshold: Option<f32>,

    /// Capture/detection scheduling
    #[arg(long, value_enum)]
    mode: Option<PipelineMode>,

    /// Stop after this many captured frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Run the headless overlay monitor
    #[arg(long)]
    overlay: bool,

    /// Log level (debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, config: &mut AgentConfig) {
        if let Some(peer) = &self.peer {
            config.sink.peer = peer.clone();
        }
        if let Some(model) = &self.model {
            config.detector.model_path = model.clone();
        }
        if let Some(source) = &self.source {
            config.capture.source = source.clone();
        }
        if let Some(threshold) = self.threshold {
            config.targeting.threshold = threshold;
        }
        if let Some(mode) = self.mode {
            config.pipeline.mode = mode;
        }
        if self.max_frames.is_some() {
            config.capture.max_frames = self.max_frames;
        }
        if self.overlay {
            config.overlay.enabled = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    vantage_core::tracing::init_with_filter(&args.log_level);

    info!("{} Starting Vantage Agent", prefix::OPEN);
    info!("  Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let source = build_source(&config)?;
    let detector = VideoEngine::new(config.detector.clone())?;
    let sink = UdpSink::connect(&config.sink.bind, &config.sink.peer)?;
    let selector = TargetSelector::new(config.selector_config())?;

    let shutdown = Shutdown::new();
    let buffer = Arc::new(FrameBuffer::with_result_ttl(config.overlay.ttl_refreshes));

    let overlay = if config.overlay.enabled {
        let monitor = OverlayMonitor::new(
            Arc::clone(&buffer),
            config.overlay.refresh_interval(),
            shutdown.clone(),
        );
        Some(monitor.spawn()?)
    } else {
        None
    };

    let settings = DriverSettings {
        reference: config.reference_point(),
        mode: config.pipeline.mode,
        frame_wait: config.pipeline.frame_wait(),
    };
    let mut driver = PipelineDriver::new(source, detector, sink, selector, settings)
        .with_buffer(buffer)
        .with_shutdown(shutdown.clone());

    let mut pipeline = tokio::task::spawn_blocking(move || driver.run());

    let finished = tokio::select! {
        result = &mut pipeline => Some(result),
        _ = shutdown_signal() => None,
    };
    let result = match finished {
        Some(result) => result,
        None => {
            shutdown.trigger();
            pipeline.await
        }
    };

    // stop the overlay whichever way the pipeline ended
    shutdown.trigger();
    if let Some(handle) = overlay {
        if let Ok(stats) = handle.join() {
            info!(
                "Overlay: {} refreshes, {} with detections",
                stats.refreshes, stats.refreshes_with_detections
            );
        }
    }

    result??;
    info!("{} Agent shutdown complete", prefix::CLOSE);
    Ok(())
}

fn build_source(config: &AgentConfig) -> vantage_core::Result<Box<dyn FrameSource>> {
    let (width, height) = (config.capture.width, config.capture.height);

    let source: Box<dyn FrameSource> = if config.is_synthetic_source() {
        Box::new(SyntheticSource::new(width, height))
    } else {
        Box::new(ImageSequenceSource::open(&config.capture.source, width, height)?)
    };

    Ok(match config.capture.max_frames {
        Some(max_frames) => Box::new(Limited::new(source, max_frames)),
        None => source,
    })
}
