use serde::Serialize;

/// A key read from the display, already masked to one byte
pub type Key = char;

/// One HUD line as (label, value)
pub type StatusLine = (String, String);

/// Axis aligned box in pixel units, origin at the top-left corner
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A box that cannot seed a tracker
    pub fn is_empty(&self) -> bool {
        !(self.width > 0. && self.height > 0.)
    }

    /// Integer corners (x0, y0, x1, y1), truncated the way the drawing calls expect
    pub fn corners(&self) -> (i32, i32, i32, i32) {
        let x = self.x as i32;
        let y = self.y as i32;
        (x, y, x + self.width as i32, y + self.height as i32)
    }
}
