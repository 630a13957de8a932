use std::path::PathBuf;
use std::sync::OnceLock;

use clap::Parser;
use serde::Serialize;

use crate::loopback::DEFAULT_SCAN_RANGE;
use crate::tracker::TrackerVariant;

pub static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Clone, Serialize)]
#[derive(clap::Parser)]
pub struct Config {
    /// Index of the capture device
    #[clap(long, default_value = "0")]
    pub camera: i32,

    /// Captured frames are resized to this width, keeping the aspect ratio
    #[clap(long, default_value = "640")]
    pub width: i32,

    #[clap(long, default_value = "640")]
    pub output_width: i32,

    #[clap(long, default_value = "480")]
    pub output_height: i32,

    #[clap(long, default_value = "30")]
    pub output_fps: f64,

    /// Number of samples in the tracker timing average
    #[clap(long, default_value = "30")]
    pub timer_window: usize,

    /// Number of /dev/video slots probed for a v4l2loopback device
    #[clap(long, default_value_t = DEFAULT_SCAN_RANGE)]
    pub loopback_scan_range: u32,

    /// Skip loopback discovery and never re-publish frames
    #[clap(long)]
    pub no_loopback: bool,

    /// Mirror the camera straight into the loopback device, without tracking
    #[clap(long, conflicts_with = "no-loopback")]
    pub passthrough: bool,

    /// Delay before retrying a failed camera read in passthrough mode
    #[clap(long, default_value = "1000")]
    pub retry_delay_ms: u64,

    /// Tracker used when a region is marked before any algorithm was chosen
    #[clap(long, default_value = "kcf")]
    pub default_tracker: TrackerVariant,

    #[clap(long, default_value = "1")]
    pub key_timeout_ms: i32,

    #[clap(long, default_value = "Frame")]
    pub window_name: String,

    /// Write one JSON line per frame with the tracking result
    #[clap(long)]
    pub track_log: Option<PathBuf>,

    /// Save the annotated stream to a rerun recording
    #[clap(long)]
    pub record: Option<PathBuf>,

    #[clap(long, default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config::parse_from(["roi-tracker"])
    }
}

impl Config {
    /// Whether captured frames reach the loopback writer at their own width.
    ///
    /// When this is false every published frame is stretched to the output geometry.
    pub fn output_matches_capture(&self) -> bool {
        self.width == self.output_width
    }
}

/// The process config, or the defaults when nothing was set (tests, library use)
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}
