use std::path::PathBuf;

use anyhow::Result;
use log::{debug, info, warn};

/// Substring of the V4L2 bus info reported by v4l2loopback devices
pub const LOOPBACK_MARKER: &str = "v4l2loopback";

/// Default number of /dev/video slots scanned
pub const DEFAULT_SCAN_RANGE: u32 = 6;

/// Reads the bus/driver descriptor of a video device slot
pub trait DeviceProbe {
    fn bus_info(&self, index: u32) -> Result<String>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopbackTarget {
    pub index: u32,
    pub path: PathBuf,
}

impl LoopbackTarget {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            path: PathBuf::from(format!("/dev/video{}", index)),
        }
    }
}

/// First slot in `0..scan_range` whose bus info carries the loopback marker.
///
/// Slots that are missing or fail to open are skipped.
pub fn find_loopback_device(probe: &dyn DeviceProbe, scan_range: u32) -> Option<LoopbackTarget> {
    for index in 0..scan_range {
        match probe.bus_info(index) {
            Ok(bus) if bus.contains(LOOPBACK_MARKER) => {
                let target = LoopbackTarget::new(index);
                info!("found loopback device at {}", target.path.display());
                return Some(target);
            }
            Ok(bus) => debug!("video{}: bus '{}' is not a loopback", index, bus),
            Err(err) => debug!("video{}: skipped, {:#}", index, err),
        }
    }
    None
}

/// Whether OpenCV build information reports GStreamer support
pub fn has_gstreamer(build_info: &str) -> bool {
    build_info.lines().any(|line| {
        let mut tokens = line.split_whitespace();
        tokens.next() == Some("GStreamer:") && tokens.next() == Some("YES")
    })
}

/// Destination for annotated frames
pub trait FrameSink<F> {
    fn write(&mut self, frame: &F) -> Result<()>;
}

/// Re-publishes frames to a loopback device when one is usable.
///
/// The enable decision is taken once at construction and never retried.
pub struct LoopbackSink<W> {
    writer: Option<W>,
}

impl<W> LoopbackSink<W> {
    pub fn disabled() -> Self {
        Self { writer: None }
    }

    pub fn open(
        compositing: bool,
        target: Option<LoopbackTarget>,
        open_writer: impl FnOnce(&LoopbackTarget) -> Result<W>,
    ) -> Self {
        if !compositing {
            warn!("OpenCV GStreamer support not found, loopback output disabled");
            return Self::disabled();
        }
        let Some(target) = target else {
            warn!("loopback device not found, loopback output disabled");
            return Self::disabled();
        };
        match open_writer(&target) {
            Ok(writer) => {
                info!("doing loopback to {}", target.path.display());
                Self {
                    writer: Some(writer),
                }
            }
            Err(err) => {
                warn!(
                    "cannot open loopback writer for {}: {:#}",
                    target.path.display(),
                    err
                );
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }
}

impl<F, W: FrameSink<F>> FrameSink<F> for LoopbackSink<W> {
    fn write(&mut self, frame: &F) -> Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(frame),
            None => Ok(()),
        }
    }
}

#[cfg(target_os = "linux")]
pub use self::v4l2::V4l2Probe;

#[cfg(target_os = "linux")]
mod v4l2 {
    use anyhow::{Context as AnyhowContext, Result};
    use v4l::Device;

    use super::DeviceProbe;

    /// Asks /dev/videoN for its capabilities
    #[derive(Debug, Default)]
    pub struct V4l2Probe;

    impl DeviceProbe for V4l2Probe {
        fn bus_info(&self, index: u32) -> Result<String> {
            let device = Device::new(index as usize)
                .with_context(|| format!("cannot open /dev/video{}", index))?;
            let caps = device
                .query_caps()
                .with_context(|| format!("cannot query capabilities of /dev/video{}", index))?;
            Ok(caps.bus)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_missing_slot_is_an_error() {
            assert!(V4l2Probe.bus_info(4096).is_err());
        }
    }
}

#[cfg(feature = "opencv")]
pub use self::gst::GstreamerWriter;

#[cfg(feature = "opencv")]
mod gst {
    use anyhow::{bail, Context as AnyhowContext, Result};
    use opencv::core::{Mat, Size};
    use opencv::prelude::*;
    use opencv::{imgproc, videoio};

    use super::{FrameSink, LoopbackTarget};

    /// GStreamer pipeline pushing BGR frames into a v4l2sink
    pub struct GstreamerWriter {
        writer: videoio::VideoWriter,
        size: Size,
        resized: Mat,
    }

    impl GstreamerWriter {
        pub fn open(target: &LoopbackTarget, width: i32, height: i32, fps: f64) -> Result<Self> {
            let pipeline = format!(
                "appsrc ! videoconvert ! v4l2sink device={}",
                target.path.display()
            );
            let size = Size::new(width, height);
            let writer =
                videoio::VideoWriter::new_with_backend(&pipeline, videoio::CAP_GSTREAMER, 0, fps, size, true)
                    .with_context(|| format!("failed to create pipeline '{}'", pipeline))?;
            if !writer.is_opened()? {
                bail!("pipeline '{}' did not open", pipeline);
            }
            Ok(Self {
                writer,
                size,
                resized: Mat::default(),
            })
        }
    }

    impl FrameSink<Mat> for GstreamerWriter {
        fn write(&mut self, frame: &Mat) -> Result<()> {
            if frame.size()? == self.size {
                self.writer.write(frame)?;
            } else {
                imgproc::resize(frame, &mut self.resized, self.size, 0., 0., imgproc::INTER_AREA)?;
                self.writer.write(&self.resized)?;
            }
            Ok(())
        }
    }

    /// Whether this OpenCV build can drive GStreamer pipelines
    pub fn compositing_available() -> Result<bool> {
        Ok(super::has_gstreamer(&opencv::core::get_build_information()?))
    }
}

#[cfg(feature = "opencv")]
pub use self::gst::compositing_available;
