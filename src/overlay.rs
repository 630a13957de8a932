use anyhow::Result;

use crate::my_types::*;
use crate::session::{SessionState, TrackerSession, MARK_REGION_KEY, QUIT_KEY};
use crate::timer::RollingTimer;
use crate::tracker::TrackerVariant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };
    pub const GREEN: Color = Color { r: 0, g: 255, b: 0 };
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    pub color: Color,
    pub scale: f64,
    pub thickness: i32,
}

/// Drawing surface the overlay is rendered onto
pub trait Canvas {
    fn height(&self) -> i32;

    /// `origin` is the bottom-left corner of the text
    fn put_text(&mut self, text: &str, origin: (i32, i32), style: TextStyle) -> Result<()>;

    fn rectangle(&mut self, bbox: &BoundingBox, color: Color, thickness: i32) -> Result<()>;
}

pub const TEXT_MARGIN: i32 = 10;
pub const LINE_HEIGHT: i32 = 20;
const FONT_SCALE: f64 = 0.5;
const OUTLINE: TextStyle = TextStyle {
    color: Color::BLACK,
    scale: FONT_SCALE,
    thickness: 4,
};
const FILL: TextStyle = TextStyle {
    color: Color::WHITE,
    scale: FONT_SCALE,
    thickness: 1,
};
const BOX_THICKNESS: i32 = 2;

/// Stack the status lines from the bottom edge up, last line lowest.
///
/// Every line is drawn twice at the same spot, a thick dark pass then a thin
/// light one, so it stays readable on any background.
pub fn render<C: Canvas + ?Sized>(
    canvas: &mut C,
    status: &[StatusLine],
    bbox: Option<&BoundingBox>,
) -> Result<()> {
    if let Some(bbox) = bbox {
        canvas.rectangle(bbox, Color::GREEN, BOX_THICKNESS)?;
    }

    let height = canvas.height();
    for (i, (label, value)) in status.iter().rev().enumerate() {
        let text = format!("{}: {}", label, value);
        let origin = (TEXT_MARGIN, height - (i as i32 * LINE_HEIGHT + LINE_HEIGHT));
        canvas.put_text(&text, origin, OUTLINE)?;
        canvas.put_text(&text, origin, FILL)?;
    }
    Ok(())
}

/// HUD content for the current session
pub fn status_lines<F>(session: &TrackerSession<F>, timer: &RollingTimer) -> Vec<StatusLine> {
    let choices = TrackerVariant::choices();
    let Some(variant) = session.variant().filter(|_| session.state() != SessionState::Idle) else {
        return vec![
            ("Mark bbox".to_string(), MARK_REGION_KEY.to_string()),
            ("Quit".to_string(), QUIT_KEY.to_string()),
            ("Choose tracker".to_string(), choices),
        ];
    };

    let success = match session.last_success() {
        Some(true) => "Yes",
        Some(false) => "No",
        None => "-",
    };
    let fps = timer
        .rate()
        .map(|rate| format!("{:.2}", rate))
        .unwrap_or_else(|| "-".to_string());
    let ms = timer
        .average()
        .map(|average| format!("{:.4}", average.as_secs_f64() * 1e3))
        .unwrap_or_else(|| "-".to_string());
    vec![
        ("Success".to_string(), success.to_string()),
        ("Tracker fps".to_string(), fps),
        ("Tracker ms".to_string(), ms),
        ("Tracker".to_string(), variant.name().to_string()),
        ("Choose".to_string(), choices),
    ]
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::tests::FakeFactory;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Draw {
        Text(String, (i32, i32), TextStyle),
        Rect(BoundingBox, Color, i32),
    }

    /// Records draw calls instead of touching pixels
    #[derive(Debug, Default, Clone)]
    pub struct FakeFrame {
        pub height: i32,
        pub draws: Vec<Draw>,
    }

    impl FakeFrame {
        pub fn new(height: i32) -> Self {
            Self {
                height,
                draws: vec![],
            }
        }

        pub fn texts(&self) -> Vec<&str> {
            self.draws
                .iter()
                .filter_map(|draw| match draw {
                    Draw::Text(text, _, style) if style.color == Color::WHITE => {
                        Some(text.as_str())
                    }
                    _ => None,
                })
                .collect()
        }
    }

    impl Canvas for FakeFrame {
        fn height(&self) -> i32 {
            self.height
        }

        fn put_text(&mut self, text: &str, origin: (i32, i32), style: TextStyle) -> Result<()> {
            self.draws.push(Draw::Text(text.to_string(), origin, style));
            Ok(())
        }

        fn rectangle(&mut self, bbox: &BoundingBox, color: Color, thickness: i32) -> Result<()> {
            self.draws.push(Draw::Rect(*bbox, color, thickness));
            Ok(())
        }
    }

    fn line(label: &str, value: &str) -> StatusLine {
        (label.to_string(), value.to_string())
    }

    fn origin_of(frame: &FakeFrame, wanted: &str) -> (i32, i32) {
        frame
            .draws
            .iter()
            .find_map(|draw| match draw {
                Draw::Text(text, origin, _) if text == wanted => Some(*origin),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_last_line_nearest_bottom() {
        let mut frame = FakeFrame::new(480);
        render(&mut frame, &[line("A", "1"), line("B", "2")], None).unwrap();

        let a = origin_of(&frame, "A: 1");
        let b = origin_of(&frame, "B: 2");
        assert_eq!(b, (10, 460));
        assert_eq!(a, (10, 440));
        assert!(b.1 > a.1);
    }

    #[test]
    fn test_outline_then_fill() {
        let mut frame = FakeFrame::new(100);
        render(&mut frame, &[line("Quit", "q")], None).unwrap();
        assert_eq!(
            frame.draws,
            vec![
                Draw::Text("Quit: q".to_string(), (10, 80), OUTLINE),
                Draw::Text("Quit: q".to_string(), (10, 80), FILL),
            ]
        );
        assert!(OUTLINE.thickness > FILL.thickness);
    }

    #[test]
    fn test_box_drawn_when_given() {
        let mut frame = FakeFrame::new(100);
        let bbox = BoundingBox::new(1., 2., 3., 4.);
        render(&mut frame, &[], Some(&bbox)).unwrap();
        assert_eq!(frame.draws, vec![Draw::Rect(bbox, Color::GREEN, 2)]);
    }

    #[test]
    fn test_idle_status() {
        let session = TrackerSession::<FakeFrame>::new(TrackerVariant::Kcf);
        let lines = status_lines(&session, &RollingTimer::new(30));
        assert_eq!(
            lines,
            vec![
                line("Mark bbox", "s"),
                line("Quit", "q"),
                line("Choose tracker", "Csrt/Kcf/Boosting/Mil/Tld/medianFlow/mOsse"),
            ]
        );
    }

    #[test]
    fn test_tracking_status() {
        let factory = FakeFactory::default();
        let frame = FakeFrame::new(480);
        let mut session = TrackerSession::new(TrackerVariant::Kcf);
        session.mark_region(&factory, BoundingBox::new(50., 50., 100., 100.), &frame);

        let mut timer = RollingTimer::new(30);
        let lines = status_lines(&session, &timer);
        assert_eq!(lines[0], line("Success", "-"));
        assert_eq!(lines[1], line("Tracker fps", "-"));

        session.step(&frame);
        timer.record(Duration::from_millis(20));
        let lines = status_lines(&session, &timer);
        assert_eq!(lines[0], line("Success", "Yes"));
        assert_eq!(lines[1], line("Tracker fps", "50.00"));
        assert_eq!(lines[2], line("Tracker ms", "20.0000"));
        assert_eq!(lines[3], line("Tracker", "Kcf"));
        assert_eq!(lines[4].0, "Choose");
    }
}
