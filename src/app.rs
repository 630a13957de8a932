use anyhow::Result;
use tracing::{debug, info, warn, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::camera::{Capture, Display};
use crate::config::Config;
use crate::loopback::FrameSink;
use crate::overlay::{render, status_lines, Canvas};
use crate::session::*;
use crate::timer::RollingTimer;
use crate::track_log::{TrackLog, TrackRecord};
use crate::tracker::TrackerFactory;

/// The frame loop: capture, track, annotate, publish, read one key.
pub struct OverlayApp<F> {
    session: TrackerSession<F>,
    timer: RollingTimer,
    factory: Box<dyn TrackerFactory<F>>,
    sinks: Vec<Box<dyn FrameSink<F>>>,
    track_log: Option<TrackLog>,
    key_timeout_ms: i32,
    // Incremented just before processing a new frame. 0 before the first frame.
    frame_number: u64,
}

impl<F: Canvas> OverlayApp<F> {
    pub fn new(factory: Box<dyn TrackerFactory<F>>, config: &Config) -> Self {
        Self {
            session: TrackerSession::new(config.default_tracker),
            timer: RollingTimer::new(config.timer_window),
            factory,
            sinks: vec![],
            track_log: None,
            key_timeout_ms: config.key_timeout_ms,
            frame_number: 0,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn FrameSink<F>>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_track_log(mut self, track_log: TrackLog) -> Self {
        self.track_log = Some(track_log);
        self
    }

    pub fn session(&self) -> &TrackerSession<F> {
        &self.session
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Run until the stream ends or the operator quits. Returns the frame count.
    ///
    /// The display is closed on every exit path.
    pub fn run(&mut self, capture: &mut dyn Capture<F>, display: &mut dyn Display<F>) -> Result<u64> {
        info!("press s to mark a region, q to quit");
        let result = self.run_frames(capture, display);
        let closed = display.close();
        let flushed = match self.track_log.as_mut() {
            Some(track_log) => track_log.flush(),
            None => Ok(()),
        };
        result?;
        closed?;
        flushed?;
        info!("processed {} frames", self.frame_number);
        Ok(self.frame_number)
    }

    fn run_frames(&mut self, capture: &mut dyn Capture<F>, display: &mut dyn Display<F>) -> Result<()> {
        while let Some(frame) = capture.read()? {
            if !self.process_frame(frame, display)? {
                break;
            }
        }
        debug!("frame loop finished after {} frames", self.frame_number);
        Ok(())
    }

    /// One loop iteration. Returns `false` once the operator asked to quit.
    pub fn process_frame(&mut self, mut frame: F, display: &mut dyn Display<F>) -> Result<bool> {
        self.frame_number += 1;
        Span::current().pb_inc(1);

        let outcome = if self.session.state() == SessionState::Tracking {
            self.timer.tic();
            let outcome = self.session.step(&frame);
            self.timer.tac()?;
            outcome
        } else {
            None
        };

        let status = status_lines(&self.session, &self.timer);
        render(&mut frame, &status, self.session.visible_bbox().as_ref())?;

        display.show(&frame)?;
        for sink in self.sinks.iter_mut() {
            if let Err(err) = sink.write(&frame) {
                warn!("frame {}: sink write failed: {:#}", self.frame_number, err);
            }
        }

        if let Some(track_log) = self.track_log.as_mut() {
            track_log.write(&TrackRecord {
                frame: self.frame_number,
                state: self.session.state().as_str(),
                tracker: self.session.variant(),
                success: outcome.map(|outcome| outcome.success),
                bbox: outcome.and_then(|outcome| outcome.bbox),
                tracker_ms: outcome
                    .and(self.timer.average())
                    .map(|average| average.as_secs_f64() * 1e3),
            })?;
        }

        let command = Command::from_key(display.poll_key(self.key_timeout_ms)?);
        self.session.apply(
            &*self.factory,
            command,
            || display.select_region(&frame),
            &frame,
        )
    }
}
