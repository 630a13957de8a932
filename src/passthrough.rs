use std::time::Duration;

use anyhow::{Context as AnyhowContext, Result};
use tracing::{debug, info, warn, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::camera::Capture;
use crate::loopback::FrameSink;

/// Frames that can be flipped around the vertical axis
pub trait Mirror: Sized {
    fn mirrored(&self) -> Result<Self>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Forwarded {
    Frame,
    CameraError,
}

/// Camera → mirror → loopback, without a window or tracker.
///
/// Camera read failures never end the loop; they are logged and retried.
pub struct Passthrough {
    retry_delay: Duration,
    frame_number: u64,
    camera_errors: u64,
}

impl Passthrough {
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            retry_delay,
            frame_number: 0,
            camera_errors: 0,
        }
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn camera_errors(&self) -> u64 {
        self.camera_errors
    }

    /// Forward one frame. An empty or failed read is reported, not returned as an error.
    pub fn forward<F: Mirror>(
        &mut self,
        capture: &mut dyn Capture<F>,
        sink: &mut dyn FrameSink<F>,
    ) -> Result<Forwarded> {
        let frame = match capture.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.camera_errors += 1;
                warn!("camera error: no frame");
                return Ok(Forwarded::CameraError);
            }
            Err(err) => {
                self.camera_errors += 1;
                warn!("camera error: {:#}", err);
                return Ok(Forwarded::CameraError);
            }
        };
        self.frame_number += 1;
        Span::current().pb_inc(1);
        sink.write(&frame.mirrored()?)
            .with_context(|| format!("loopback write failed at frame {}", self.frame_number))?;
        Ok(Forwarded::Frame)
    }

    /// Runs until a loopback write fails
    pub fn run<F: Mirror>(&mut self, capture: &mut dyn Capture<F>, sink: &mut dyn FrameSink<F>) -> Result<()> {
        info!("mirroring camera into the loopback device");
        loop {
            if self.forward(capture, sink)? == Forwarded::CameraError {
                debug!("retrying in {:?}", self.retry_delay);
                std::thread::sleep(self.retry_delay);
            }
        }
    }
}

#[cfg(feature = "opencv")]
mod cv {
    use anyhow::Result;
    use opencv::core::{self, Mat};

    use super::Mirror;

    impl Mirror for Mat {
        fn mirrored(&self) -> Result<Self> {
            let mut flipped = Mat::default();
            core::flip(self, &mut flipped, 1)?;
            Ok(flipped)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use anyhow::{anyhow, bail};

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Row(Vec<u8>);

    impl Mirror for Row {
        fn mirrored(&self) -> Result<Self> {
            Ok(Row(self.0.iter().rev().copied().collect()))
        }
    }

    /// Replays scripted reads, then reports the end of the stream
    struct ScriptedCapture(VecDeque<Result<Option<Row>>>);

    impl Capture<Row> for ScriptedCapture {
        fn read(&mut self) -> Result<Option<Row>> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<Row>,
        fail: bool,
    }

    impl FrameSink<Row> for RecordingSink {
        fn write(&mut self, frame: &Row) -> Result<()> {
            if self.fail {
                bail!("v4l2sink went away");
            }
            self.frames.push(frame.clone());
            Ok(())
        }
    }

    #[test]
    fn test_frames_are_mirrored() {
        let mut capture = ScriptedCapture(
            [Ok(Some(Row(vec![1, 2, 3]))), Ok(Some(Row(vec![4, 5])))]
                .into_iter()
                .collect(),
        );
        let mut sink = RecordingSink::default();
        let mut passthrough = Passthrough::new(Duration::ZERO);

        assert_eq!(passthrough.forward::<Row>(&mut capture, &mut sink).unwrap(), Forwarded::Frame);
        assert_eq!(passthrough.forward::<Row>(&mut capture, &mut sink).unwrap(), Forwarded::Frame);
        assert_eq!(sink.frames, vec![Row(vec![3, 2, 1]), Row(vec![5, 4])]);
        assert_eq!(passthrough.frame_number(), 2);
    }

    #[test]
    fn test_camera_errors_are_retried() {
        let mut capture = ScriptedCapture(
            [
                Err(anyhow!("select() timeout")),
                Ok(None),
                Ok(Some(Row(vec![7, 8]))),
            ]
            .into_iter()
            .collect(),
        );
        let mut sink = RecordingSink::default();
        let mut passthrough = Passthrough::new(Duration::ZERO);

        assert_eq!(passthrough.forward::<Row>(&mut capture, &mut sink).unwrap(), Forwarded::CameraError);
        assert_eq!(passthrough.forward::<Row>(&mut capture, &mut sink).unwrap(), Forwarded::CameraError);
        assert_eq!(passthrough.forward::<Row>(&mut capture, &mut sink).unwrap(), Forwarded::Frame);
        assert_eq!(passthrough.camera_errors(), 2);
        assert_eq!(passthrough.frame_number(), 1);
        assert_eq!(sink.frames, vec![Row(vec![8, 7])]);
    }

    #[test]
    fn test_run_stops_on_write_failure() {
        let mut capture = ScriptedCapture(
            [Ok(None), Ok(Some(Row(vec![1]))), Ok(Some(Row(vec![2])))]
                .into_iter()
                .collect(),
        );
        let mut sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let mut passthrough = Passthrough::new(Duration::ZERO);

        assert!(passthrough.run::<Row>(&mut capture, &mut sink).is_err());
        assert_eq!(passthrough.camera_errors(), 1);
        assert_eq!(passthrough.frame_number(), 1);
    }
}
