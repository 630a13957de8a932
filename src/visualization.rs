#[cfg(feature = "rerun")]
pub use self::recording::*;

#[cfg(feature = "opencv")]
mod cv {
    use cv2::prelude::*;
    use opencv as cv2;

    use anyhow::Result;

    use crate::my_types::BoundingBox;
    use crate::overlay::{Canvas, Color, TextStyle};

    fn to_scalar(color: Color) -> cv2::core::Scalar {
        cv2::core::Scalar::new(color.b as f64, color.g as f64, color.r as f64, 0.0)
    }

    impl Canvas for cv2::core::Mat {
        fn height(&self) -> i32 {
            self.rows()
        }

        fn put_text(&mut self, text: &str, origin: (i32, i32), style: TextStyle) -> Result<()> {
            cv2::imgproc::put_text(
                self,
                text,
                cv2::core::Point::new(origin.0, origin.1),
                cv2::imgproc::FONT_HERSHEY_SIMPLEX,
                style.scale,
                to_scalar(style.color),
                style.thickness,
                cv2::imgproc::LINE_AA,
                false,
            )?;
            Ok(())
        }

        fn rectangle(&mut self, bbox: &BoundingBox, color: Color, thickness: i32) -> Result<()> {
            let (x0, y0, x1, y1) = bbox.corners();
            cv2::imgproc::rectangle(
                self,
                cv2::core::Rect::new(x0, y0, x1 - x0, y1 - y0),
                to_scalar(color),
                thickness,
                cv2::imgproc::LINE_8,
                0,
            )?;
            Ok(())
        }
    }

    #[cfg(feature = "rerun")]
    impl super::AsArray for cv2::core::Mat {
        /// BGR frame to an RGB height × width × 3 array
        fn try_as_array(&self) -> Result<ndarray::Array3<u8>> {
            let mut rgb = cv2::core::Mat::default();
            cv2::imgproc::cvt_color(self, &mut rgb, cv2::imgproc::COLOR_BGR2RGB, 0)?;
            let bytes = rgb.data_bytes()?;
            let size = rgb.size()?;
            let a = ndarray::ArrayView3::from_shape(
                (size.height as usize, size.width as usize, 3),
                bytes,
            )?;
            Ok(a.to_owned())
        }
    }
}

#[cfg(feature = "rerun")]
mod recording {
    use std::path::Path;

    use anyhow::Result;
    use ndarray as nd;
    use rerun::{RecordingStream, RecordingStreamBuilder};

    use crate::loopback::FrameSink;

    pub trait AsArray {
        fn try_as_array(&self) -> Result<nd::Array3<u8>>;
    }

    /// Saves every annotated frame to a rerun `.rrd` file
    pub struct RerunRecorder {
        recorder: RecordingStream,
        frame_number: i64,
    }

    impl RerunRecorder {
        pub fn save(path: &Path) -> Result<Self> {
            let recorder = RecordingStreamBuilder::new("roi-tracker").save(path)?;
            Ok(Self {
                recorder,
                frame_number: 0,
            })
        }
    }

    impl<F: AsArray> FrameSink<F> for RerunRecorder {
        fn write(&mut self, frame: &F) -> Result<()> {
            self.recorder.set_time_sequence("frame", self.frame_number);
            self.frame_number += 1;
            self.recorder
                .log("camera/annotated", &rerun::Image::try_from(frame.try_as_array()?)?)?;
            Ok(())
        }
    }
}
