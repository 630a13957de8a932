use std::time::Duration;

use anyhow::{anyhow, bail, Context as AnyhowContext, Result};
use clap::Parser;
use opencv::core::Mat;

use indicatif::ProgressStyle;
use tracing::{info, info_span, warn};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter::LevelFilter, prelude::*};

use roi_tracker::app::OverlayApp;
use roi_tracker::camera::{CameraCapture, HighGuiDisplay};
use roi_tracker::config::*;
use roi_tracker::loopback::*;
use roi_tracker::passthrough::Passthrough;
use roi_tracker::tracker::OpencvTrackerFactory;
use roi_tracker::track_log::TrackLog;
#[cfg(feature = "rerun")]
use roi_tracker::visualization::RerunRecorder;

#[derive(Parser)]
#[clap(name = "roi-tracker", about = "Track a marked region in a live camera stream")]
pub struct Args {
    #[clap(flatten)]
    pub config: Config,
}

fn main() -> Result<()> {
    // parse the config
    let args = Args::parse();
    let _ = CONFIG.set(args.config);
    let config = config();

    // setup logging
    let level: LevelFilter = config
        .log_level
        .parse()
        .map_err(|_| anyhow!("invalid log level '{}'", config.log_level))?;
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stdout_writer()))
        .with(indicatif_layer)
        .with(level)
        .init();
    info!("config {}", serde_json::to_string(config)?);

    if config.passthrough {
        return run_passthrough(config);
    }

    let factory = OpencvTrackerFactory;
    factory.probe()?;

    let loopback = if config.no_loopback {
        info!("loopback output disabled by flag");
        LoopbackSink::disabled()
    } else {
        if !config.output_matches_capture() {
            warn!(
                "capture width {} differs from output width {}, published frames are stretched to {}x{}",
                config.width, config.output_width, config.output_width, config.output_height
            );
        }
        let compositing = compositing_available()?;
        let target = if compositing {
            find_loopback_device(&V4l2Probe, config.loopback_scan_range)
        } else {
            None
        };
        LoopbackSink::open(compositing, target, |target| {
            GstreamerWriter::open(
                target,
                config.output_width,
                config.output_height,
                config.output_fps,
            )
        })
    };

    let mut app: OverlayApp<Mat> = OverlayApp::new(Box::new(factory), config);
    if loopback.is_enabled() {
        app = app.with_sink(Box::new(loopback));
    }
    if let Some(path) = &config.track_log {
        app = app.with_track_log(TrackLog::create(path)?);
    }
    #[cfg(feature = "rerun")]
    if let Some(path) = &config.record {
        app = app.with_sink(Box::new(RerunRecorder::save(path)?));
    }
    #[cfg(not(feature = "rerun"))]
    if config.record.is_some() {
        warn!("built without the rerun feature, --record is ignored");
    }

    let mut capture = CameraCapture::open(config.camera, config.width)?;
    let mut display = HighGuiDisplay::open(&config.window_name)?;

    let frames_span = info_span!("frames");
    frames_span.pb_set_style(&ProgressStyle::default_spinner());
    let frames_span_enter = frames_span.enter();

    let frames = app
        .run(&mut capture, &mut display)
        .context("tracking loop failed")?;

    std::mem::drop(frames_span_enter);
    std::mem::drop(frames_span);

    info!("done after {} frames", frames);
    Ok(())
}

fn run_passthrough(config: &Config) -> Result<()> {
    if !compositing_available()? {
        bail!("OpenCV GStreamer support not found, cannot feed the loopback device");
    }
    let target = find_loopback_device(&V4l2Probe, config.loopback_scan_range).ok_or_else(|| {
        anyhow!(
            "no loopback device found in range {}",
            config.loopback_scan_range
        )
    })?;
    let mut writer = GstreamerWriter::open(
        &target,
        config.output_width,
        config.output_height,
        config.output_fps,
    )?;

    let mut capture = CameraCapture::open(config.camera, config.output_width)?;
    capture.request_mode(config.output_width, config.output_height, config.output_fps)?;

    let frames_span = info_span!("passthrough");
    frames_span.pb_set_style(&ProgressStyle::default_spinner());
    let _frames_span_enter = frames_span.enter();

    Passthrough::new(Duration::from_millis(config.retry_delay_ms))
        .run::<Mat>(&mut capture, &mut writer)
        .context("passthrough stopped")
}
