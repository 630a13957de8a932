use anyhow::Result;
use log::{debug, info, warn};

use crate::my_types::*;
use crate::tracker::*;

/// What a polled key asks the loop to do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    SelectTracker(TrackerVariant),
    MarkRegion,
    Quit,
    None,
}

pub const MARK_REGION_KEY: Key = 's';
pub const QUIT_KEY: Key = 'q';

impl Command {
    pub fn from_key(key: Option<Key>) -> Command {
        let Some(key) = key else {
            return Command::None;
        };
        if let Some(variant) = TrackerVariant::from_key(key) {
            Command::SelectTracker(variant)
        } else if key == MARK_REGION_KEY {
            Command::MarkRegion
        } else if key == QUIT_KEY {
            Command::Quit
        } else {
            Command::None
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// A tracker exists but has no region to follow yet
    Armed,
    Tracking,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Armed => "armed",
            SessionState::Tracking => "tracking",
        }
    }
}

/// Result of one per-frame update
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepOutcome {
    pub success: bool,
    pub bbox: Option<BoundingBox>,
}

/// Owns the active tracker and the last known box.
///
/// A failed update keeps the session alive with the previous box; only an
/// operator command replaces the tracker.
pub struct TrackerSession<F> {
    tracker: Option<Box<dyn TrackerBackend<F>>>,
    variant: Option<TrackerVariant>,
    default_variant: TrackerVariant,
    initialized: bool,
    bbox: Option<BoundingBox>,
    last_success: Option<bool>,
}

impl<F> TrackerSession<F> {
    pub fn new(default_variant: TrackerVariant) -> Self {
        Self {
            tracker: None,
            variant: None,
            default_variant,
            initialized: false,
            bbox: None,
            last_success: None,
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.tracker, self.initialized) {
            (None, _) => SessionState::Idle,
            (Some(_), false) => SessionState::Armed,
            (Some(_), true) => SessionState::Tracking,
        }
    }

    pub fn variant(&self) -> Option<TrackerVariant> {
        self.variant
    }

    /// Last box produced by a successful update or a manual selection
    pub fn bbox(&self) -> Option<BoundingBox> {
        self.bbox
    }

    /// `None` until the current session ran its first update
    pub fn last_success(&self) -> Option<bool> {
        self.last_success
    }

    /// Box to draw on the current frame, only while the track holds
    pub fn visible_bbox(&self) -> Option<BoundingBox> {
        if self.state() == SessionState::Tracking && self.last_success == Some(true) {
            self.bbox
        } else {
            None
        }
    }

    /// Advance the tracker by one frame. Does nothing unless tracking.
    pub fn step(&mut self, frame: &F) -> Option<StepOutcome> {
        if !self.initialized {
            return None;
        }
        let tracker = self.tracker.as_mut()?;
        let success = match tracker.update(frame) {
            Ok(Some(bbox)) => {
                self.bbox = Some(bbox);
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!("tracker update failed: {:#}", err);
                false
            }
        };
        self.last_success = Some(success);
        Some(StepOutcome {
            success,
            bbox: self.bbox,
        })
    }

    /// Switch algorithm. Reuses the last box when there is one.
    pub fn select_variant(
        &mut self,
        factory: &dyn TrackerFactory<F>,
        variant: TrackerVariant,
        frame: &F,
    ) {
        info!("switching tracker to {}", variant);
        self.variant = Some(variant);
        match self.bbox {
            Some(bbox) => self.start(factory, variant, bbox, frame),
            None => {
                self.reset();
                match factory.create(variant) {
                    Ok(tracker) => self.tracker = Some(tracker),
                    Err(err) => warn!("cannot create {} tracker: {:#}", variant, err),
                }
            }
        }
    }

    /// Start tracking a region picked by the operator.
    ///
    /// Empty regions are rejected and leave the session untouched.
    pub fn mark_region(&mut self, factory: &dyn TrackerFactory<F>, bbox: BoundingBox, frame: &F) {
        if bbox.is_empty() {
            warn!("ignoring empty selection {:?}", bbox);
            return;
        }
        let variant = *self.variant.get_or_insert(self.default_variant);
        info!("tracking {:?} with {}", bbox, variant);
        self.bbox = Some(bbox);
        self.start(factory, variant, bbox, frame);
    }

    fn start(
        &mut self,
        factory: &dyn TrackerFactory<F>,
        variant: TrackerVariant,
        bbox: BoundingBox,
        frame: &F,
    ) {
        self.reset();
        let mut tracker = match factory.create(variant) {
            Ok(tracker) => tracker,
            Err(err) => {
                warn!("cannot create {} tracker: {:#}", variant, err);
                return;
            }
        };
        match tracker.init(frame, bbox) {
            Ok(()) => self.initialized = true,
            Err(err) => warn!("cannot initialise {} tracker: {:#}", variant, err),
        }
        self.tracker = Some(tracker);
    }

    fn reset(&mut self) {
        self.tracker = None;
        self.initialized = false;
        self.last_success = None;
    }

    /// Apply a command that does not need the display.
    ///
    /// Returns `false` for `Quit`.
    pub fn apply(
        &mut self,
        factory: &dyn TrackerFactory<F>,
        command: Command,
        region: impl FnOnce() -> Result<BoundingBox>,
        frame: &F,
    ) -> Result<bool> {
        match command {
            Command::SelectTracker(variant) => self.select_variant(factory, variant, frame),
            Command::MarkRegion => {
                let bbox = region()?;
                self.mark_region(factory, bbox, frame);
            }
            Command::Quit => {
                debug!("quit requested");
                return Ok(false);
            }
            Command::None => {}
        }
        Ok(true)
    }
}
