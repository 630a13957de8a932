use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::my_types::*;

/// The tracking algorithms the operator can switch between at runtime
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerVariant {
    Csrt,
    Kcf,
    Boosting,
    Mil,
    Tld,
    MedianFlow,
    Mosse,
}

impl TrackerVariant {
    /// Display order of the HUD and of the key table
    pub const ALL: [TrackerVariant; 7] = [
        TrackerVariant::Csrt,
        TrackerVariant::Kcf,
        TrackerVariant::Boosting,
        TrackerVariant::Mil,
        TrackerVariant::Tld,
        TrackerVariant::MedianFlow,
        TrackerVariant::Mosse,
    ];

    pub fn key(self) -> Key {
        match self {
            TrackerVariant::Csrt => 'c',
            TrackerVariant::Kcf => 'k',
            TrackerVariant::Boosting => 'b',
            TrackerVariant::Mil => 'm',
            TrackerVariant::Tld => 't',
            TrackerVariant::MedianFlow => 'f',
            TrackerVariant::Mosse => 'o',
        }
    }

    /// Name shown on the HUD; the capital marks the selection key
    pub fn name(self) -> &'static str {
        match self {
            TrackerVariant::Csrt => "Csrt",
            TrackerVariant::Kcf => "Kcf",
            TrackerVariant::Boosting => "Boosting",
            TrackerVariant::Mil => "Mil",
            TrackerVariant::Tld => "Tld",
            TrackerVariant::MedianFlow => "medianFlow",
            TrackerVariant::Mosse => "mOsse",
        }
    }

    pub fn from_key(key: Key) -> Option<TrackerVariant> {
        Self::ALL.into_iter().find(|variant| variant.key() == key)
    }

    /// "Csrt/Kcf/Boosting/..." for the HUD
    pub fn choices() -> String {
        Self::ALL.map(|variant| variant.name()).join("/")
    }
}

impl fmt::Display for TrackerVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrackerVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|variant| variant.name().to_ascii_lowercase() == s)
            .ok_or_else(|| anyhow!("unknown tracker '{}', expected one of {}", s, Self::choices()))
    }
}

/// A single-object tracker working on frames of type `F`
pub trait TrackerBackend<F> {
    fn init(&mut self, frame: &F, bbox: BoundingBox) -> Result<()>;

    /// `Ok(None)` when the target was lost on this frame
    fn update(&mut self, frame: &F) -> Result<Option<BoundingBox>>;
}

/// Builds a fresh, uninitialised tracker for a variant
pub trait TrackerFactory<F> {
    fn create(&self, variant: TrackerVariant) -> Result<Box<dyn TrackerBackend<F>>>;
}

#[cfg(feature = "opencv")]
pub use self::cv::OpencvTrackerFactory;

#[cfg(feature = "opencv")]
mod cv {
    use anyhow::{Context as AnyhowContext, Result};
    use opencv::core::{Mat, Ptr, Rect};
    use opencv::prelude::*;
    use opencv::tracking::{
        legacy_Tracker, legacy_TrackerBoosting, legacy_TrackerMOSSE, legacy_TrackerMedianFlow,
        legacy_TrackerTLD, TrackerCSRT, TrackerKCF,
    };
    use opencv::video::{Tracker, TrackerMIL};

    use super::*;

    pub struct OpencvTracker {
        inner: Ptr<Tracker>,
    }

    impl TrackerBackend<Mat> for OpencvTracker {
        fn init(&mut self, frame: &Mat, bbox: BoundingBox) -> Result<()> {
            self.inner.init(frame, to_rect(bbox))?;
            Ok(())
        }

        fn update(&mut self, frame: &Mat) -> Result<Option<BoundingBox>> {
            let mut rect = Rect::default();
            if self.inner.update(frame, &mut rect)? {
                Ok(Some(BoundingBox::new(
                    rect.x.max(0) as f64,
                    rect.y.max(0) as f64,
                    rect.width.max(0) as f64,
                    rect.height.max(0) as f64,
                )))
            } else {
                Ok(None)
            }
        }
    }

    fn to_rect(bbox: BoundingBox) -> Rect {
        let (x0, y0, x1, y1) = bbox.corners();
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Legacy trackers are wrapped so they share the Tracker interface
    fn upgrade(legacy: Ptr<legacy_Tracker>) -> Result<Ptr<Tracker>> {
        Ok(opencv::tracking::upgrade_tracking_api(&legacy)?)
    }

    #[derive(Debug, Default)]
    pub struct OpencvTrackerFactory;

    impl TrackerFactory<Mat> for OpencvTrackerFactory {
        fn create(&self, variant: TrackerVariant) -> Result<Box<dyn TrackerBackend<Mat>>> {
            let inner: Ptr<Tracker> = match variant {
                TrackerVariant::Csrt => TrackerCSRT::create_def()?.into(),
                TrackerVariant::Kcf => TrackerKCF::create_def()?.into(),
                TrackerVariant::Mil => TrackerMIL::create_def()?.into(),
                TrackerVariant::Boosting => upgrade(legacy_TrackerBoosting::create_def()?.into())?,
                TrackerVariant::Tld => upgrade(legacy_TrackerTLD::create_def()?.into())?,
                TrackerVariant::MedianFlow => {
                    upgrade(legacy_TrackerMedianFlow::create_def()?.into())?
                }
                TrackerVariant::Mosse => upgrade(legacy_TrackerMOSSE::create()?.into())?,
            };
            Ok(Box::new(OpencvTracker { inner }))
        }
    }

    impl OpencvTrackerFactory {
        /// Fails early when the OpenCV build lacks the contrib tracking module
        pub fn probe(&self) -> Result<()> {
            self.create(TrackerVariant::Kcf)
                .map(|_| ())
                .context("OpenCV tracking module unavailable")
        }
    }
}
