use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context as AnyhowContext, Result};
use serde::Serialize;

use crate::my_types::*;
use crate::session::SessionState;
use crate::tracker::TrackerVariant;

/// One line of the track log
#[derive(Debug, Serialize)]
pub struct TrackRecord {
    pub frame: u64,
    pub state: &'static str,
    pub tracker: Option<TrackerVariant>,
    pub success: Option<bool>,
    pub bbox: Option<BoundingBox>,
    pub tracker_ms: Option<f64>,
}

/// JSON lines writer, one record per processed frame
pub struct TrackLog {
    writer: Box<dyn Write>,
}

impl TrackLog {
    pub fn create(path: &Path) -> Result<Self> {
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }

    pub fn write(&mut self, record: &TrackRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
