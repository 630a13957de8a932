use anyhow::Result;

use crate::my_types::*;

/// Source of frames. `Ok(None)` marks the end of the stream.
pub trait Capture<F> {
    fn read(&mut self) -> Result<Option<F>>;
}

/// Window the operator watches and types into
pub trait Display<F> {
    fn show(&mut self, frame: &F) -> Result<()>;

    /// Blocks until the operator confirms a rectangle on `frame`
    fn select_region(&mut self, frame: &F) -> Result<BoundingBox>;

    fn poll_key(&mut self, timeout_ms: i32) -> Result<Option<Key>>;

    fn close(&mut self) -> Result<()>;
}

/// Height of a `width` wide frame with the same aspect ratio as `cols × rows`
pub fn scaled_height(cols: i32, rows: i32, width: i32) -> i32 {
    if cols <= 0 {
        return 0;
    }
    ((rows as f64) * (width as f64) / (cols as f64)) as i32
}

/// Decode a raw key code, `None` when no key was pressed
pub fn key_from_code(code: i32) -> Option<Key> {
    if code < 0 {
        None
    } else {
        Some((code & 0xFF) as u8 as char)
    }
}

#[cfg(feature = "opencv")]
pub use self::cv::{CameraCapture, HighGuiDisplay};

#[cfg(feature = "opencv")]
mod cv {
    use anyhow::{bail, Context as AnyhowContext, Result};
    use opencv::core::{Mat, Size};
    use opencv::prelude::*;
    use opencv::{highgui, imgproc, videoio};

    use super::*;

    pub struct CameraCapture {
        capture: videoio::VideoCapture,
        width: i32,
        raw: Mat,
    }

    impl CameraCapture {
        pub fn open(index: i32, width: i32) -> Result<Self> {
            let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)
                .with_context(|| format!("Failed to open camera {}", index))?;
            if !capture.is_opened()? {
                bail!("Failed to open camera {}", index);
            }
            Ok(Self {
                capture,
                width,
                raw: Mat::default(),
            })
        }

        /// Ask the driver for a capture mode. Drivers may pick the nearest one they support.
        pub fn request_mode(&mut self, width: i32, height: i32, fps: f64) -> Result<()> {
            let props = [
                (videoio::CAP_PROP_FRAME_WIDTH, width as f64),
                (videoio::CAP_PROP_FRAME_HEIGHT, height as f64),
                (videoio::CAP_PROP_FPS, fps),
            ];
            for (prop, value) in props {
                if !self.capture.set(prop, value)? {
                    tracing::warn!("camera ignored capture property {} = {}", prop, value);
                }
            }
            Ok(())
        }
    }

    impl Capture<Mat> for CameraCapture {
        fn read(&mut self) -> Result<Option<Mat>> {
            if !self.capture.read(&mut self.raw).context("camera read failed")? || self.raw.empty() {
                return Ok(None);
            }
            let height = scaled_height(self.raw.cols(), self.raw.rows(), self.width);
            let mut frame = Mat::default();
            imgproc::resize(
                &self.raw,
                &mut frame,
                Size::new(self.width, height),
                0.,
                0.,
                imgproc::INTER_AREA,
            )?;
            Ok(Some(frame))
        }
    }

    impl Drop for CameraCapture {
        fn drop(&mut self) {
            let _ = self.capture.release();
        }
    }

    pub struct HighGuiDisplay {
        window_name: String,
    }

    impl HighGuiDisplay {
        pub fn open(window_name: &str) -> Result<Self> {
            highgui::named_window(window_name, highgui::WINDOW_AUTOSIZE)
                .context("Failed to open display window")?;
            Ok(Self {
                window_name: window_name.to_string(),
            })
        }
    }

    impl Display<Mat> for HighGuiDisplay {
        fn show(&mut self, frame: &Mat) -> Result<()> {
            highgui::imshow(&self.window_name, frame)?;
            Ok(())
        }

        fn select_region(&mut self, frame: &Mat) -> Result<BoundingBox> {
            tracing::info!("select a region and press Enter to continue");
            let rect = highgui::select_roi(&self.window_name, frame, true, false, true)?;
            Ok(BoundingBox::new(
                rect.x as f64,
                rect.y as f64,
                rect.width as f64,
                rect.height as f64,
            ))
        }

        fn poll_key(&mut self, timeout_ms: i32) -> Result<Option<Key>> {
            Ok(key_from_code(highgui::wait_key(timeout_ms)?))
        }

        fn close(&mut self) -> Result<()> {
            highgui::destroy_all_windows()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_height() {
        assert_eq!(scaled_height(1280, 720, 640), 360);
        assert_eq!(scaled_height(640, 480, 640), 480);
        assert_eq!(scaled_height(1920, 1080, 500), 281);
        assert_eq!(scaled_height(0, 480, 640), 0);
    }

    #[test]
    fn test_key_from_code() {
        assert_eq!(key_from_code(-1), None);
        assert_eq!(key_from_code('q' as i32), Some('q'));
        // some backends set modifier bits above the low byte
        assert_eq!(key_from_code(0x10_0000 | 's' as i32), Some('s'));
    }
}
